use std::sync::Arc;

use serde::Serialize;

use crate::collaborators::{DriverDirectory, TruckCollaborator};
use crate::error::{QueryError, ShiftError};
use crate::models::position::{GeoPosition, GeolocationEntry};
use crate::models::shift::{DriverId, ShiftRecord, TruckId};
use crate::models::truck::TruckDescriptor;
use crate::services::{
    LiveUpdateBroadcaster, ReconnectionReconciler, ShiftLifecycleService,
};
use crate::store::DEFAULT_SHARDS;
use crate::store::{GeolocationCache, ShiftSessionStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiveOptions {
    pub shards: usize,
    pub sync_includes_position: bool,
}

impl Default for LiveOptions {
    fn default() -> Self {
        Self {
            shards: DEFAULT_SHARDS,
            sync_includes_position: false,
        }
    }
}

/// Snapshot of a driver's live state for dispatcher views.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverLiveStatus {
    pub driver_user_id: DriverId,
    pub on_shift: bool,
    pub connected: bool,
    pub truck_id: Option<TruckId>,
    pub last_known: Option<GeolocationEntry>,
}

/// Shared handles to the live registries and the services over them.
///
/// The request-handling layer calls the methods below and gets a result or
/// a typed error back.
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<ShiftSessionStore>,
    pub geolocation: Arc<GeolocationCache>,
    pub shifts: Arc<ShiftLifecycleService>,
    pub reconciler: Arc<ReconnectionReconciler>,
    pub broadcaster: Arc<LiveUpdateBroadcaster>,
    drivers: Arc<dyn DriverDirectory>,
}

impl AppState {
    pub fn new(
        options: LiveOptions,
        trucks: Arc<dyn TruckCollaborator>,
        drivers: Arc<dyn DriverDirectory>,
    ) -> Self {
        let sessions = Arc::new(ShiftSessionStore::new(options.shards));
        let geolocation = Arc::new(GeolocationCache::new(options.shards));

        let shifts = Arc::new(ShiftLifecycleService::new(sessions.clone(), trucks.clone()));
        let reconciler = Arc::new(
            ReconnectionReconciler::new(sessions.clone(), geolocation.clone(), trucks)
                .with_position_in_sync(options.sync_includes_position),
        );
        let broadcaster = Arc::new(LiveUpdateBroadcaster::new(
            sessions.clone(),
            geolocation.clone(),
        ));

        Self {
            sessions,
            geolocation,
            shifts,
            reconciler,
            broadcaster,
            drivers,
        }
    }

    pub async fn start_shift(
        &self,
        driver_id: DriverId,
        truck_id: TruckId,
    ) -> Result<ShiftRecord, ShiftError> {
        self.shifts.start_shift(driver_id, truck_id).await
    }

    pub fn end_shift(&self, driver_id: DriverId) -> bool {
        self.shifts.end_shift(driver_id)
    }

    pub async fn get_active_truck_for_driver(
        &self,
        driver_id: DriverId,
    ) -> Result<Option<TruckDescriptor>, ShiftError> {
        self.shifts.get_active_truck(driver_id).await
    }

    /// Where the driver is now. Unknown drivers and drivers that never
    /// reported a position fail differently.
    pub async fn get_current_position(&self, driver_id: DriverId) -> Result<GeoPosition, QueryError> {
        if !self.drivers.driver_exists(driver_id).await? {
            return Err(QueryError::DriverNotFound(driver_id));
        }
        Ok(self.broadcaster.query_position(driver_id)?)
    }

    pub fn live_status(&self, driver_id: DriverId) -> DriverLiveStatus {
        let record = self.sessions.get(driver_id);
        DriverLiveStatus {
            driver_user_id: driver_id,
            on_shift: record.is_some(),
            connected: record.as_ref().is_some_and(ShiftRecord::is_connected),
            truck_id: record.map(|r| r.truck_id()),
            last_known: self.geolocation.last_known(driver_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{ChannelHandle, ClientEvent, ConnectionId};
    use crate::error::PositionUnavailable;
    use crate::services::SyncOutcome;
    use crate::testing::{drain, truck, FakeFleet};

    fn state(fleet: FakeFleet) -> AppState {
        let fleet = Arc::new(fleet);
        AppState::new(LiveOptions::default(), fleet.clone(), fleet)
    }

    #[tokio::test]
    async fn test_position_query_distinguishes_unknown_driver() {
        let state = state(FakeFleet::new().driver(7));

        assert_eq!(
            state.get_current_position(99).await,
            Err(QueryError::DriverNotFound(99))
        );
        assert_eq!(
            state.get_current_position(7).await,
            Err(QueryError::Unavailable(PositionUnavailable(7)))
        );

        state.broadcaster.publish_position(7, GeoPosition::new(1.0, 2.0));
        assert_eq!(
            state.get_current_position(7).await,
            Ok(GeoPosition::new(1.0, 2.0))
        );
    }

    #[tokio::test]
    async fn test_position_survives_shift_end() {
        let state = state(FakeFleet::new().assign(3, 7));
        state.start_shift(7, 3).await.unwrap();
        state.broadcaster.publish_position(7, GeoPosition::new(1.0, 2.0));

        assert!(state.end_shift(7));
        assert_eq!(state.geolocation.get(7), Some(GeoPosition::new(1.0, 2.0)));
        assert_eq!(state.get_current_position(7).await, Ok(GeoPosition::new(1.0, 2.0)));
        assert_eq!(state.get_active_truck_for_driver(7).await, Ok(None));
    }

    #[tokio::test]
    async fn test_driver_seven_full_scenario() {
        let state = state(FakeFleet::new().assign(3, 7).assign(5, 7));

        let (a, mut rx_a) = ChannelHandle::open(ConnectionId::new());
        assert_eq!(
            state.reconciler.on_connect(7, a).await,
            Ok(SyncOutcome::NoActiveShift)
        );
        assert!(drain(&mut rx_a)[0].payload.is_null());
        assert!(!state.live_status(7).on_shift);

        assert_eq!(state.start_shift(7, 3).await.unwrap().truck_id(), 3);
        assert_eq!(
            state.start_shift(7, 5).await.unwrap_err(),
            ShiftError::AlreadyOnShift(7)
        );

        let (b, mut rx_b) = ChannelHandle::open(ConnectionId::new());
        state.reconciler.on_connect(7, b.clone()).await.unwrap();
        let sync = drain(&mut rx_b);
        assert_eq!(sync[0].payload["truck"]["id"], 3);

        state.broadcaster.publish_position(7, GeoPosition::new(1.0, 2.0));
        let updates = drain(&mut rx_b);
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].event, ClientEvent::PositionUpdate);
        assert_eq!(updates[0].payload, serde_json::json!({ "lat": 1.0, "lng": 2.0 }));
        assert!(drain(&mut rx_a).is_empty());

        let status = state.live_status(7);
        assert!(status.on_shift);
        assert!(status.connected);
        assert_eq!(status.truck_id, Some(3));
        assert_eq!(status.last_known.map(|e| e.position), Some(GeoPosition::new(1.0, 2.0)));
        assert_eq!(
            state.get_active_truck_for_driver(7).await,
            Ok(Some(truck(3)))
        );
    }

    #[tokio::test]
    async fn test_live_status_follows_one_record() {
        let state = state(FakeFleet::new().assign(3, 7));
        state.start_shift(7, 3).await.unwrap();
        let (channel, _rx) = ChannelHandle::open(ConnectionId::new());
        state.sessions.attach_channel(7, channel.clone()).unwrap();
        assert!(state.live_status(7).connected);

        assert!(state.sessions.detach_channel(7, channel.id()));
        let status = state.live_status(7);
        assert!(status.on_shift);
        assert!(!status.connected);

        state.sessions.attach_channel(7, channel).unwrap();
        assert!(state.end_shift(7));
        let status = state.live_status(7);
        assert!(!status.on_shift);
        assert!(!status.connected);
        assert_eq!(status.truck_id, None);
    }
}
