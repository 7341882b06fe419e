//! In-memory collaborators for unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::channel::{ChannelFactory, ChannelHandle, ConnectionId, OutboundEvent, OutboundReceiver};
use crate::collaborators::{DriverDirectory, TruckCollaborator};
use crate::error::LookupError;
use crate::models::shift::{DriverId, TruckId};
use crate::models::truck::TruckDescriptor;

pub fn truck(id: TruckId) -> TruckDescriptor {
    TruckDescriptor {
        id,
        license_plate_number: format!("TRK-{:04}", id),
        manufacturer: "Volvo".to_string(),
        capacity: 3500,
        price_per_km: 1.5,
        year: 2021,
        tow_type: "flatbed".to_string(),
        business_id: 1,
    }
}

#[derive(Default)]
pub struct FakeFleet {
    trucks: HashMap<TruckId, TruckDescriptor>,
    assignments: HashSet<(TruckId, DriverId)>,
    drivers: HashSet<DriverId>,
    failing: AtomicBool,
}

impl FakeFleet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `driver_id` and a truck assigned to them.
    pub fn assign(mut self, truck_id: TruckId, driver_id: DriverId) -> Self {
        self.trucks.insert(truck_id, truck(truck_id));
        self.assignments.insert((truck_id, driver_id));
        self.drivers.insert(driver_id);
        self
    }

    pub fn driver(mut self, driver_id: DriverId) -> Self {
        self.drivers.insert(driver_id);
        self
    }

    /// Makes every subsequent lookup fail with a backend error.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), LookupError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(LookupError::Backend("connection refused".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl TruckCollaborator for FakeFleet {
    async fn resolve_truck(&self, truck_id: TruckId) -> Result<TruckDescriptor, LookupError> {
        self.check()?;
        self.trucks.get(&truck_id).cloned().ok_or(LookupError::NotFound {
            entity: "truck",
            id: truck_id,
        })
    }

    async fn is_truck_assigned_to_driver(
        &self,
        truck_id: TruckId,
        driver_id: DriverId,
    ) -> Result<bool, LookupError> {
        self.check()?;
        Ok(self.assignments.contains(&(truck_id, driver_id)))
    }
}

#[async_trait]
impl DriverDirectory for FakeFleet {
    async fn driver_exists(&self, driver_id: DriverId) -> Result<bool, LookupError> {
        self.check()?;
        Ok(self.drivers.contains(&driver_id))
    }
}

/// Keeps the transport side of every channel it opens.
#[derive(Default)]
pub struct RecordingFactory {
    receivers: Mutex<HashMap<ConnectionId, Vec<OutboundReceiver>>>,
}

impl RecordingFactory {
    /// Everything delivered so far on `connection_id`, across all handles opened for it.
    pub fn delivered(&self, connection_id: ConnectionId) -> Vec<OutboundEvent> {
        let mut receivers = self.receivers.lock().unwrap();
        receivers
            .get_mut(&connection_id)
            .map(|list| list.iter_mut().flat_map(drain).collect())
            .unwrap_or_default()
    }
}

impl ChannelFactory for RecordingFactory {
    fn open(&self, connection_id: ConnectionId, _driver_id: DriverId) -> ChannelHandle {
        let (handle, rx) = ChannelHandle::open(connection_id);
        self.receivers
            .lock()
            .unwrap()
            .entry(connection_id)
            .or_default()
            .push(rx);
        handle
    }
}

/// Takes every queued event without waiting.
pub fn drain(rx: &mut OutboundReceiver) -> Vec<OutboundEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
