use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::shift::DriverId;

/// A latitude/longitude pair. Serialized as `{ "lat": .., "lng": .. }`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPosition {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPosition {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

/// Last known position of a driver.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeolocationEntry {
    pub driver_user_id: DriverId,
    pub position: GeoPosition,
    pub reported_at: DateTime<Utc>,
}
