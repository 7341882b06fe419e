//! Handles to live client connections.
//!
//! The core never touches sockets. Each connection gets a queue; the core
//! pushes [`OutboundEvent`]s into it and the transport layer drains it.
//! Connections are identified by an opaque [`ConnectionId`] assigned when
//! the connection opens, and two handles are equal iff their ids are equal.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::error::DeliveryError;
use crate::models::shift::DriverId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for ConnectionId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl FromStr for ConnectionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Events delivered to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClientEvent {
    /// Current shift state: `null` when the driver has no active shift.
    #[serde(rename = "shift-sync")]
    ShiftSync,
    /// A driver position, `{ lat, lng }`.
    #[serde(rename = "position-update")]
    PositionUpdate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundEvent {
    pub event: ClientEvent,
    pub payload: serde_json::Value,
}

pub type OutboundReceiver = mpsc::UnboundedReceiver<OutboundEvent>;

/// Non-owning handle to a live connection.
///
/// Sending never blocks. Once the transport drops the receiving side every
/// send fails with [`DeliveryError::Closed`].
#[derive(Debug, Clone)]
pub struct ChannelHandle {
    id: ConnectionId,
    tx: mpsc::UnboundedSender<OutboundEvent>,
}

impl ChannelHandle {
    /// Opens a queue for connection `id`. The receiver belongs to the transport.
    pub fn open(id: ConnectionId) -> (Self, OutboundReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { id, tx }, rx)
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    pub fn send(&self, message: OutboundEvent) -> Result<(), DeliveryError> {
        self.tx
            .send(message)
            .map_err(|_| DeliveryError::Closed(self.id))
    }

    pub fn emit<T: Serialize + ?Sized>(
        &self,
        event: ClientEvent,
        payload: &T,
    ) -> Result<(), DeliveryError> {
        let payload =
            serde_json::to_value(payload).map_err(|e| DeliveryError::Encode(e.to_string()))?;
        self.send(OutboundEvent { event, payload })
    }
}

impl PartialEq for ChannelHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ChannelHandle {}

/// Opens channel handles on behalf of the transport layer.
pub trait ChannelFactory: Send + Sync {
    fn open(&self, connection_id: ConnectionId, driver_id: DriverId) -> ChannelHandle;
}
