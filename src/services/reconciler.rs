//! Resynchronizes a driver's client when its connection (re)opens.
//!
//! Per driver the connection state moves between three states:
//!
//! ```text
//!   NoSession ──start──▶ SessionNoChannel ◀──detach(current)── SessionWithChannel
//!                               │                                      ▲
//!                               └──────────────attach──────────────────┘
//! ```
//!
//! A connect event never creates a session. It attaches the new channel to
//! an existing session (superseding any previous one) and replays the
//! current truck to that channel only.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::channel::{ChannelHandle, ClientEvent, ConnectionId};
use crate::collaborators::TruckCollaborator;
use crate::error::ReconcileError;
use crate::models::position::GeoPosition;
use crate::models::shift::{DriverId, TruckId};
use crate::models::truck::TruckDescriptor;
use crate::store::{GeolocationCache, ShiftSessionStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    NoSession,
    SessionNoChannel,
    SessionWithChannel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The driver has no active shift; `null` was sent.
    NoActiveShift,
    /// The channel is attached and the truck was sent.
    Synced { truck_id: TruckId },
}

/// Body of a `shift-sync` message for a driver on shift.
///
/// Which shape is sent is fixed at construction of the reconciler.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ShiftSyncPayload {
    /// `{ "truck": .. }`
    Truck { truck: TruckDescriptor },
    /// `{ "truck": .., "position": { "lat", "lng" } | null }`
    TruckWithPosition {
        truck: TruckDescriptor,
        position: Option<GeoPosition>,
    },
}

pub struct ReconnectionReconciler {
    sessions: Arc<ShiftSessionStore>,
    geolocation: Arc<GeolocationCache>,
    trucks: Arc<dyn TruckCollaborator>,
    sync_includes_position: bool,
}

impl ReconnectionReconciler {
    pub fn new(
        sessions: Arc<ShiftSessionStore>,
        geolocation: Arc<GeolocationCache>,
        trucks: Arc<dyn TruckCollaborator>,
    ) -> Self {
        Self {
            sessions,
            geolocation,
            trucks,
            sync_includes_position: false,
        }
    }

    /// Bundle the last known position into the sync payload.
    pub fn with_position_in_sync(mut self, enabled: bool) -> Self {
        self.sync_includes_position = enabled;
        self
    }

    /// Handles a connect event for `driver_id` on `channel`.
    ///
    /// A truck lookup failure is returned to the caller and leaves the
    /// session (with the new channel attached) untouched, so the next
    /// reconnect can retry.
    pub async fn on_connect(
        &self,
        driver_id: DriverId,
        channel: ChannelHandle,
    ) -> Result<SyncOutcome, ReconcileError> {
        let connection_id = channel.id();

        let record = match self.sessions.attach_channel(driver_id, channel.clone()) {
            Ok(record) => record,
            Err(e) => {
                debug!(driver_id, %connection_id, reason = %e, "connect without active shift");
                deliver(driver_id, &channel, &Option::<ShiftSyncPayload>::None);
                return Ok(SyncOutcome::NoActiveShift);
            }
        };

        let truck_id = record.truck_id();
        let truck = self
            .trucks
            .resolve_truck(truck_id)
            .await
            .map_err(|source| {
                warn!(driver_id, truck_id, error = %source, "truck lookup failed during sync");
                ReconcileError::TruckResolution {
                    driver_id,
                    truck_id,
                    source,
                }
            })?;

        let payload = if self.sync_includes_position {
            ShiftSyncPayload::TruckWithPosition {
                truck,
                position: self.geolocation.get(driver_id),
            }
        } else {
            ShiftSyncPayload::Truck { truck }
        };
        deliver(driver_id, &channel, &Some(payload));

        info!(driver_id, truck_id, %connection_id, "shift synced on connect");
        Ok(SyncOutcome::Synced { truck_id })
    }

    /// Handles a disconnect event. Only detaches if `connection_id` is still
    /// the driver's current connection.
    pub fn on_disconnect(&self, driver_id: DriverId, connection_id: ConnectionId) -> bool {
        self.sessions.detach_channel(driver_id, connection_id)
    }

    pub fn state(&self, driver_id: DriverId) -> ConnectionState {
        match self.sessions.get(driver_id) {
            None => ConnectionState::NoSession,
            Some(record) if record.is_connected() => ConnectionState::SessionWithChannel,
            Some(_) => ConnectionState::SessionNoChannel,
        }
    }
}

// A closed channel just drops the message.
fn deliver(driver_id: DriverId, channel: &ChannelHandle, payload: &Option<ShiftSyncPayload>) {
    if let Err(e) = channel.emit(ClientEvent::ShiftSync, payload) {
        warn!(
            driver_id,
            connection_id = %channel.id(),
            error = %e,
            "shift sync not delivered"
        );
    }
}
