use async_trait::async_trait;
use tracing::debug;

use super::{queries, DbPool};
use crate::collaborators::{DriverDirectory, TruckCollaborator};
use crate::error::LookupError;
use crate::models::shift::{DriverId, TruckId};
use crate::models::truck::TruckDescriptor;

/// Truck and driver lookups backed by the fleet database.
#[derive(Clone)]
pub struct PgFleetRepository {
    pool: DbPool,
}

impl PgFleetRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TruckCollaborator for PgFleetRepository {
    async fn resolve_truck(&self, truck_id: TruckId) -> Result<TruckDescriptor, LookupError> {
        let truck = sqlx::query_as::<_, TruckDescriptor>(queries::SELECT_TRUCK_BY_ID)
            .bind(truck_id)
            .fetch_optional(&self.pool)
            .await?;

        debug!(truck_id, found = truck.is_some(), "truck lookup");
        truck.ok_or(LookupError::NotFound {
            entity: "truck",
            id: truck_id,
        })
    }

    async fn is_truck_assigned_to_driver(
        &self,
        truck_id: TruckId,
        driver_id: DriverId,
    ) -> Result<bool, LookupError> {
        let assigned = sqlx::query_scalar::<_, bool>(queries::SELECT_TRUCK_ASSIGNED_TO_USER)
            .bind(truck_id)
            .bind(driver_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(assigned)
    }
}

#[async_trait]
impl DriverDirectory for PgFleetRepository {
    async fn driver_exists(&self, driver_id: DriverId) -> Result<bool, LookupError> {
        let present = sqlx::query_scalar::<_, bool>(queries::SELECT_DRIVER_EXISTS)
            .bind(driver_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(present)
    }
}
