use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tracing::trace;

use super::shard_amount;
use crate::models::position::{GeoPosition, GeolocationEntry};
use crate::models::shift::DriverId;

/// Last known position per driver. No history: every write replaces the
/// previous entry, and entries outlive the driver's shift.
#[derive(Default)]
pub struct GeolocationCache {
    entries: DashMap<DriverId, GeolocationEntry>,
}

impl GeolocationCache {
    pub fn new(shards: usize) -> Self {
        Self {
            entries: DashMap::with_shard_amount(shard_amount(shards)),
        }
    }

    pub fn set(&self, driver_id: DriverId, position: GeoPosition) {
        self.set_at(driver_id, position, Utc::now());
    }

    /// Stores a position reported at `reported_at` (device clock).
    pub fn set_at(&self, driver_id: DriverId, position: GeoPosition, reported_at: DateTime<Utc>) {
        let entry = GeolocationEntry {
            driver_user_id: driver_id,
            position,
            reported_at,
        };
        self.entries.insert(driver_id, entry);
        trace!(driver_id, lat = position.lat, lng = position.lng, "position cached");
    }

    pub fn get(&self, driver_id: DriverId) -> Option<GeoPosition> {
        self.last_known(driver_id).map(|entry| entry.position)
    }

    pub fn last_known(&self, driver_id: DriverId) -> Option<GeolocationEntry> {
        self.entries.get(&driver_id).map(|entry| *entry.value())
    }

    /// Returns whether an entry was removed.
    pub fn clear(&self, driver_id: DriverId) -> bool {
        self.entries.remove(&driver_id).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_get_before_any_report_is_absent() {
        let cache = GeolocationCache::default();
        assert_eq!(cache.get(7), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_last_write_wins() {
        let cache = GeolocationCache::default();
        cache.set(7, GeoPosition::new(1.0, 2.0));
        cache.set(7, GeoPosition::new(3.0, 4.0));

        assert_eq!(cache.get(7), Some(GeoPosition::new(3.0, 4.0)));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_set_at_keeps_device_timestamp() {
        let cache = GeolocationCache::new(2);
        let reported_at = Utc.with_ymd_and_hms(2025, 11, 29, 6, 15, 15).unwrap();
        cache.set_at(9, GeoPosition::new(20.65, -100.39), reported_at);

        let entry = cache.last_known(9).unwrap();
        assert_eq!(entry.driver_user_id, 9);
        assert_eq!(entry.reported_at, reported_at);
    }

    #[test]
    fn test_clear_missing_key_is_noop() {
        let cache = GeolocationCache::default();
        assert!(!cache.clear(1));

        cache.set(1, GeoPosition::new(0.0, 0.0));
        assert!(cache.clear(1));
        assert_eq!(cache.get(1), None);
    }

    #[test]
    fn test_drivers_are_independent() {
        let cache = GeolocationCache::default();
        cache.set(1, GeoPosition::new(1.0, 1.0));
        cache.set(2, GeoPosition::new(2.0, 2.0));

        assert_eq!(cache.get(1), Some(GeoPosition::new(1.0, 1.0)));
        assert_eq!(cache.get(2), Some(GeoPosition::new(2.0, 2.0)));
    }
}
