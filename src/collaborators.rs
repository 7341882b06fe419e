//! Interfaces to the systems that own persistent fleet records.

use async_trait::async_trait;

use crate::error::LookupError;
use crate::models::shift::{DriverId, TruckId};
use crate::models::truck::TruckDescriptor;

#[async_trait]
pub trait TruckCollaborator: Send + Sync {
    /// Fails with [`LookupError::NotFound`] when the truck does not exist.
    async fn resolve_truck(&self, truck_id: TruckId) -> Result<TruckDescriptor, LookupError>;

    async fn is_truck_assigned_to_driver(
        &self,
        truck_id: TruckId,
        driver_id: DriverId,
    ) -> Result<bool, LookupError>;
}

#[async_trait]
pub trait DriverDirectory: Send + Sync {
    async fn driver_exists(&self, driver_id: DriverId) -> Result<bool, LookupError>;
}
