use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use super::position::GeoPosition;
use super::shift::DriverId;
use crate::channel::{ConnectionId, OutboundEvent};

/// A frame published by the connection gateway.
///
/// The gateway owns the live sockets. It reports their lifecycle and the
/// positions drivers push through them; this service answers on the
/// outbound topic.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GatewayEvent {
    /// A driver's client opened a connection.
    #[serde(rename_all = "camelCase")]
    Connected {
        driver_id: DriverId,
        connection_id: ConnectionId,
    },
    /// A driver's connection closed (or the gateway timed it out).
    #[serde(rename_all = "camelCase")]
    Disconnected {
        driver_id: DriverId,
        connection_id: ConnectionId,
    },
    /// A driver reported its position.
    #[serde(rename_all = "camelCase")]
    Position {
        driver_id: DriverId,
        #[serde(deserialize_with = "parse_f64")]
        lat: f64,
        #[serde(deserialize_with = "parse_f64")]
        lng: f64,
        #[serde(default)]
        reported_at: Option<DateTime<Utc>>,
    },
    /// A dispatcher connection started watching a driver.
    #[serde(rename_all = "camelCase")]
    Subscribed {
        driver_id: DriverId,
        connection_id: ConnectionId,
    },
    #[serde(rename_all = "camelCase")]
    Unsubscribed {
        driver_id: DriverId,
        connection_id: ConnectionId,
    },
}

impl GatewayEvent {
    /// The driver whose state this frame touches. Frames are ordered per driver.
    pub fn driver_id(&self) -> DriverId {
        match self {
            GatewayEvent::Connected { driver_id, .. }
            | GatewayEvent::Disconnected { driver_id, .. }
            | GatewayEvent::Position { driver_id, .. }
            | GatewayEvent::Subscribed { driver_id, .. }
            | GatewayEvent::Unsubscribed { driver_id, .. } => *driver_id,
        }
    }

    pub fn position(&self) -> Option<GeoPosition> {
        match self {
            GatewayEvent::Position { lat, lng, .. } => Some(GeoPosition::new(*lat, *lng)),
            _ => None,
        }
    }
}

/// What goes back to the gateway for delivery on one connection.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboundEnvelope<'a> {
    pub connection_id: ConnectionId,
    pub driver_id: DriverId,
    #[serde(flatten)]
    pub event: &'a OutboundEvent,
}

// Device firmware sends coordinates as strings ("+20.652494") as often as numbers.
fn parse_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrFloat {
        String(String),
        Float(f64),
    }

    match StringOrFloat::deserialize(deserializer)? {
        StringOrFloat::Float(f) => Ok(f),
        StringOrFloat::String(s) => s.trim().parse::<f64>().map_err(serde::de::Error::custom),
    }
}
