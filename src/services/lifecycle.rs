use std::sync::Arc;

use tracing::{info, warn};

use crate::channel::ClientEvent;
use crate::collaborators::TruckCollaborator;
use crate::error::{ShiftError, UnavailableReason};
use crate::models::shift::{DriverId, ShiftData, ShiftRecord, TruckId};
use crate::models::truck::TruckDescriptor;
use crate::store::ShiftSessionStore;

/// Starts and ends shifts.
///
/// Truck checks go to the collaborator before the store is touched, so no
/// lock is held across a lookup. The store re-checks both the driver and the
/// truck atomically on insert.
pub struct ShiftLifecycleService {
    sessions: Arc<ShiftSessionStore>,
    trucks: Arc<dyn TruckCollaborator>,
}

impl ShiftLifecycleService {
    pub fn new(sessions: Arc<ShiftSessionStore>, trucks: Arc<dyn TruckCollaborator>) -> Self {
        Self { sessions, trucks }
    }

    pub async fn start_shift(
        &self,
        driver_id: DriverId,
        truck_id: TruckId,
    ) -> Result<ShiftRecord, ShiftError> {
        if self.sessions.contains(driver_id) {
            return Err(ShiftError::AlreadyOnShift(driver_id));
        }

        if !self
            .trucks
            .is_truck_assigned_to_driver(truck_id, driver_id)
            .await?
        {
            return Err(ShiftError::TruckUnavailable {
                truck_id,
                reason: UnavailableReason::NotAssigned,
            });
        }

        let record = self
            .sessions
            .create(driver_id, ShiftData::starting_now(truck_id))?;
        info!(driver_id, truck_id, "shift started");
        Ok(record)
    }

    /// Ends the driver's shift. The last known position is left in the
    /// geolocation cache.
    pub fn end_shift(&self, driver_id: DriverId) -> bool {
        match self.sessions.take(driver_id) {
            Some(record) => {
                info!(driver_id, truck_id = record.truck_id(), "shift ended");
                notify_ended(&record);
                true
            }
            None => false,
        }
    }

    /// Ends whichever shift is running on `truck_id`, for truck reassignment
    /// or removal. Returns the driver whose shift was ended.
    pub fn force_end_for_truck(&self, truck_id: TruckId) -> Option<DriverId> {
        let record = self.sessions.take_by_truck(truck_id)?;
        info!(
            driver_id = record.driver_user_id,
            truck_id, "shift terminated by truck change"
        );
        notify_ended(&record);
        Some(record.driver_user_id)
    }

    /// Current descriptor of the truck on the driver's active shift.
    pub async fn get_active_truck(
        &self,
        driver_id: DriverId,
    ) -> Result<Option<TruckDescriptor>, ShiftError> {
        let Some(record) = self.sessions.get(driver_id) else {
            return Ok(None);
        };
        let truck = self.trucks.resolve_truck(record.truck_id()).await?;
        Ok(Some(truck))
    }
}

// The client is told the shift is gone; the connection itself stays open.
fn notify_ended(record: &ShiftRecord) {
    if let Some(channel) = &record.channel {
        if let Err(e) = channel.emit(ClientEvent::ShiftSync, &serde_json::Value::Null) {
            warn!(
                driver_id = record.driver_user_id,
                error = %e,
                "shift end not delivered"
            );
        }
    }
}
