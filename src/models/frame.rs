//! Protobuf encoding of gateway frames, for gateways configured with
//! `KAFKA_PAYLOAD_FORMAT=protobuf`.

use chrono::{DateTime, Utc};
use thiserror::Error;

use super::gateway::GatewayEvent;
use crate::channel::ConnectionId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum FrameKind {
    Unspecified = 0,
    Connected = 1,
    Disconnected = 2,
    Position = 3,
    Subscribed = 4,
    Unsubscribed = 5,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct GatewayFrame {
    #[prost(enumeration = "FrameKind", tag = "1")]
    pub kind: i32,
    #[prost(int32, tag = "2")]
    pub driver_id: i32,
    #[prost(string, tag = "3")]
    pub connection_id: String,
    #[prost(double, optional, tag = "4")]
    pub lat: Option<f64>,
    #[prost(double, optional, tag = "5")]
    pub lng: Option<f64>,
    #[prost(int64, optional, tag = "6")]
    pub reported_at_ms: Option<i64>,
}

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("unknown frame kind {0}")]
    UnknownKind(i32),

    #[error("frame is missing {0}")]
    MissingField(&'static str),

    #[error("invalid connection id: {0}")]
    ConnectionId(#[from] uuid::Error),
}

impl TryFrom<GatewayFrame> for GatewayEvent {
    type Error = FrameError;

    fn try_from(frame: GatewayFrame) -> Result<Self, Self::Error> {
        let kind = FrameKind::try_from(frame.kind).map_err(|_| FrameError::UnknownKind(frame.kind))?;
        let driver_id = frame.driver_id;

        let event = match kind {
            FrameKind::Unspecified => return Err(FrameError::UnknownKind(frame.kind)),
            FrameKind::Position => GatewayEvent::Position {
                driver_id,
                lat: frame.lat.ok_or(FrameError::MissingField("lat"))?,
                lng: frame.lng.ok_or(FrameError::MissingField("lng"))?,
                reported_at: frame
                    .reported_at_ms
                    .and_then(DateTime::<Utc>::from_timestamp_millis),
            },
            FrameKind::Connected => GatewayEvent::Connected {
                driver_id,
                connection_id: frame.connection_id.parse::<ConnectionId>()?,
            },
            FrameKind::Disconnected => GatewayEvent::Disconnected {
                driver_id,
                connection_id: frame.connection_id.parse::<ConnectionId>()?,
            },
            FrameKind::Subscribed => GatewayEvent::Subscribed {
                driver_id,
                connection_id: frame.connection_id.parse::<ConnectionId>()?,
            },
            FrameKind::Unsubscribed => GatewayEvent::Unsubscribed {
                driver_id,
                connection_id: frame.connection_id.parse::<ConnectionId>()?,
            },
        };

        Ok(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::position::GeoPosition;

    #[test]
    fn test_position_frame_converts() {
        let frame = GatewayFrame {
            kind: FrameKind::Position as i32,
            driver_id: 7,
            connection_id: String::new(),
            lat: Some(1.0),
            lng: Some(2.0),
            reported_at_ms: Some(1_764_396_915_000),
        };

        let event = GatewayEvent::try_from(frame).unwrap();
        assert_eq!(event.driver_id(), 7);
        assert_eq!(event.position(), Some(GeoPosition::new(1.0, 2.0)));
    }

    #[test]
    fn test_position_frame_without_coordinates_is_rejected() {
        let frame = GatewayFrame {
            kind: FrameKind::Position as i32,
            driver_id: 7,
            lat: Some(1.0),
            ..Default::default()
        };

        assert!(matches!(
            GatewayEvent::try_from(frame),
            Err(FrameError::MissingField("lng"))
        ));
    }

    #[test]
    fn test_connection_frames_require_valid_id() {
        let frame = GatewayFrame {
            kind: FrameKind::Disconnected as i32,
            driver_id: 3,
            connection_id: "not-a-uuid".to_string(),
            ..Default::default()
        };

        assert!(matches!(
            GatewayEvent::try_from(frame),
            Err(FrameError::ConnectionId(_))
        ));
    }

    #[test]
    fn test_unknown_kind_is_rejected() {
        let frame = GatewayFrame {
            kind: 42,
            ..Default::default()
        };

        assert!(matches!(
            GatewayEvent::try_from(frame),
            Err(FrameError::UnknownKind(42))
        ));
    }
}
