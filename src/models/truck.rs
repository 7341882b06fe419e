use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::shift::TruckId;

/// Current descriptor of a truck, as sent to clients in shift sync messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct TruckDescriptor {
    pub id: TruckId,
    pub license_plate_number: String,
    pub manufacturer: String,
    pub capacity: i32,
    pub price_per_km: f64, // numeric in DB, cast in the query
    pub year: i32,
    pub tow_type: String,
    pub business_id: i32,
}
