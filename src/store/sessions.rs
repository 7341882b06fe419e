use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::debug;

use super::shard_amount;
use crate::channel::{ChannelHandle, ConnectionId};
use crate::error::SessionError;
use crate::models::shift::{DriverId, ShiftData, ShiftRecord, TruckId};

/// Registry of active shifts, one record per driver.
///
/// Every mutation runs under the driver's shard guard, so operations on one
/// driver are atomic while other drivers proceed in parallel. The truck
/// index lets a truck back at most one active shift; its guard is always
/// taken while holding the driver's, never the other way round.
#[derive(Default)]
pub struct ShiftSessionStore {
    records: DashMap<DriverId, ShiftRecord>,
    trucks: DashMap<TruckId, DriverId>,
}

impl ShiftSessionStore {
    pub fn new(shards: usize) -> Self {
        Self {
            records: DashMap::with_shard_amount(shard_amount(shards)),
            trucks: DashMap::with_shard_amount(shard_amount(shards)),
        }
    }

    /// Inserts a new record with no channel attached.
    pub fn create(&self, driver_id: DriverId, data: ShiftData) -> Result<ShiftRecord, SessionError> {
        let truck_id = data.truck_id;
        let Entry::Vacant(slot) = self.records.entry(driver_id) else {
            return Err(SessionError::Conflict(driver_id));
        };

        match self.trucks.entry(truck_id) {
            Entry::Occupied(holder) => {
                return Err(SessionError::TruckInUse {
                    truck_id,
                    driver_id: *holder.get(),
                });
            }
            Entry::Vacant(index) => {
                index.insert(driver_id);
            }
        }

        let record = ShiftRecord::new(driver_id, data);
        slot.insert(record.clone());

        debug!(driver_id, truck_id, "shift session created");
        Ok(record)
    }

    pub fn get(&self, driver_id: DriverId) -> Option<ShiftRecord> {
        self.records.get(&driver_id).map(|record| record.value().clone())
    }

    pub fn contains(&self, driver_id: DriverId) -> bool {
        self.records.contains_key(&driver_id)
    }

    /// The connection currently attached to the driver's shift, if any.
    pub fn channel(&self, driver_id: DriverId) -> Option<ChannelHandle> {
        self.records
            .get(&driver_id)
            .and_then(|record| record.channel.clone())
    }

    /// Makes `channel` the driver's current connection and returns the
    /// updated record.
    ///
    /// A previously attached connection is superseded but not closed; the
    /// transport owns its lifetime.
    pub fn attach_channel(
        &self,
        driver_id: DriverId,
        channel: ChannelHandle,
    ) -> Result<ShiftRecord, SessionError> {
        let connection_id = channel.id();
        let (record, superseded) = {
            let mut record = self
                .records
                .get_mut(&driver_id)
                .ok_or(SessionError::NotFound(driver_id))?;
            let superseded = record
                .channel
                .replace(channel)
                .map(|previous| previous.id())
                .filter(|previous| *previous != connection_id);
            (record.value().clone(), superseded)
        };

        match superseded {
            Some(previous) => debug!(
                driver_id,
                %connection_id,
                superseded = %previous,
                "channel attached, previous connection superseded"
            ),
            None => debug!(driver_id, %connection_id, "channel attached"),
        }
        Ok(record)
    }

    /// Clears the driver's channel only if `connection_id` is still the
    /// current one. Returns whether anything was detached.
    ///
    /// A late disconnect for a superseded connection must leave the newer
    /// connection in place, so a mismatch is silently ignored.
    pub fn detach_channel(&self, driver_id: DriverId, connection_id: ConnectionId) -> bool {
        let detached = match self.records.get_mut(&driver_id) {
            Some(mut record)
                if record.channel.as_ref().map(ChannelHandle::id) == Some(connection_id) =>
            {
                record.channel = None;
                true
            }
            _ => false,
        };

        if detached {
            debug!(driver_id, %connection_id, "channel detached");
        } else {
            debug!(driver_id, %connection_id, "ignoring detach of non-current channel");
        }
        detached
    }

    /// Removes the driver's record and returns it.
    pub fn take(&self, driver_id: DriverId) -> Option<ShiftRecord> {
        let Entry::Occupied(slot) = self.records.entry(driver_id) else {
            return None;
        };
        let truck_id = slot.get().truck_id();
        self.trucks.remove_if(&truck_id, |_, holder| *holder == driver_id);
        let record = slot.remove();

        debug!(driver_id, truck_id, "shift session removed");
        Some(record)
    }

    /// Returns whether a record existed.
    pub fn remove(&self, driver_id: DriverId) -> bool {
        self.take(driver_id).is_some()
    }

    /// Removes whichever shift currently holds `truck_id`.
    pub fn take_by_truck(&self, truck_id: TruckId) -> Option<ShiftRecord> {
        let driver_id = self.driver_for_truck(truck_id)?;
        let Entry::Occupied(slot) = self.records.entry(driver_id) else {
            return None;
        };
        // The driver may have moved to another truck since the index read.
        if slot.get().truck_id() != truck_id {
            return None;
        }
        self.trucks.remove_if(&truck_id, |_, holder| *holder == driver_id);
        let record = slot.remove();

        debug!(driver_id, truck_id, "shift session removed by truck");
        Some(record)
    }

    /// The driver whose active shift holds `truck_id`.
    pub fn driver_for_truck(&self, truck_id: TruckId) -> Option<DriverId> {
        self.trucks.get(&truck_id).map(|holder| *holder.value())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn open() -> ChannelHandle {
        ChannelHandle::open(ConnectionId::new()).0
    }

    #[test]
    fn test_create_twice_conflicts() {
        let store = ShiftSessionStore::default();
        let record = store.create(7, ShiftData::starting_now(3)).unwrap();
        assert_eq!(record.truck_id(), 3);
        assert!(!record.is_connected());

        assert_eq!(
            store.create(7, ShiftData::starting_now(5)).unwrap_err(),
            SessionError::Conflict(7)
        );
        assert_eq!(store.get(7).unwrap().truck_id(), 3);
    }

    #[test]
    fn test_create_after_remove_succeeds() {
        let store = ShiftSessionStore::default();
        store.create(7, ShiftData::starting_now(3)).unwrap();
        assert!(store.remove(7));
        assert!(!store.remove(7));
        assert!(store.create(7, ShiftData::starting_now(3)).is_ok());
    }

    #[test]
    fn test_truck_backs_one_shift_at_a_time() {
        let store = ShiftSessionStore::default();
        store.create(1, ShiftData::starting_now(3)).unwrap();

        assert_eq!(
            store.create(2, ShiftData::starting_now(3)).unwrap_err(),
            SessionError::TruckInUse {
                truck_id: 3,
                driver_id: 1
            }
        );
        assert!(!store.contains(2));
        assert_eq!(store.driver_for_truck(3), Some(1));

        store.remove(1);
        assert_eq!(store.driver_for_truck(3), None);
        assert!(store.create(2, ShiftData::starting_now(3)).is_ok());
    }

    #[test]
    fn test_attach_without_session_fails_and_creates_nothing() {
        let store = ShiftSessionStore::default();
        assert_eq!(
            store.attach_channel(7, open()).unwrap_err(),
            SessionError::NotFound(7)
        );
        assert!(store.get(7).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_stale_detach_keeps_newer_channel() {
        let store = ShiftSessionStore::default();
        store.create(7, ShiftData::starting_now(3)).unwrap();
        let c1 = open();
        let c2 = open();

        store.attach_channel(7, c1.clone()).unwrap();
        store.attach_channel(7, c2.clone()).unwrap();
        assert!(!store.detach_channel(7, c1.id()));
        assert_eq!(store.channel(7), Some(c2.clone()));

        assert!(store.detach_channel(7, c2.id()));
        assert_eq!(store.channel(7), None);
        assert!(store.contains(7));
    }

    #[test]
    fn test_detach_then_attach_leaves_new_channel() {
        let store = ShiftSessionStore::default();
        store.create(7, ShiftData::starting_now(3)).unwrap();
        let c1 = open();
        let c2 = open();
        store.attach_channel(7, c1.clone()).unwrap();

        assert!(store.detach_channel(7, c1.id()));
        store.attach_channel(7, c2.clone()).unwrap();
        assert_eq!(store.channel(7).map(|c| c.id()), Some(c2.id()));
    }

    #[test]
    fn test_detach_unknown_driver_is_noop() {
        let store = ShiftSessionStore::default();
        assert!(!store.detach_channel(42, ConnectionId::new()));
    }

    #[test]
    fn test_take_returns_attached_channel() {
        let store = ShiftSessionStore::default();
        store.create(7, ShiftData::starting_now(3)).unwrap();
        let channel = open();
        store.attach_channel(7, channel.clone()).unwrap();

        let record = store.take(7).unwrap();
        assert_eq!(record.channel, Some(channel));
        assert!(store.take(7).is_none());
    }

    #[test]
    fn test_take_by_truck() {
        let store = ShiftSessionStore::default();
        store.create(7, ShiftData::starting_now(3)).unwrap();
        store.create(8, ShiftData::starting_now(4)).unwrap();

        assert_eq!(store.take_by_truck(3).map(|r| r.driver_user_id), Some(7));
        assert!(store.take_by_truck(3).is_none());
        assert!(store.contains(8));
    }

    #[test]
    fn test_concurrent_attach_and_remove_leave_no_dangling_channel() {
        for _ in 0..50 {
            let store = Arc::new(ShiftSessionStore::new(4));
            store.create(7, ShiftData::starting_now(3)).unwrap();

            let attacher = {
                let store = store.clone();
                thread::spawn(move || {
                    for _ in 0..100 {
                        let _ = store.attach_channel(7, open());
                    }
                })
            };
            let remover = {
                let store = store.clone();
                thread::spawn(move || store.remove(7))
            };

            attacher.join().unwrap();
            assert!(remover.join().unwrap());
            assert!(store.get(7).is_none());
            assert!(store.channel(7).is_none());
            assert_eq!(store.driver_for_truck(3), None);
        }
    }

    #[test]
    fn test_concurrent_starts_on_one_truck_admit_one_driver() {
        for _ in 0..50 {
            let store = Arc::new(ShiftSessionStore::new(4));
            let handles: Vec<_> = (1..=8)
                .map(|driver_id| {
                    let store = store.clone();
                    thread::spawn(move || store.create(driver_id, ShiftData::starting_now(3)).is_ok())
                })
                .collect();
            let admitted = handles
                .into_iter()
                .map(|handle| handle.join().unwrap())
                .filter(|ok| *ok)
                .count();

            assert_eq!(admitted, 1);
            assert_eq!(store.len(), 1);
            let holder = store.driver_for_truck(3).unwrap();
            assert_eq!(store.get(holder).map(|r| r.truck_id()), Some(3));
        }
    }

    #[test]
    fn test_shard_count_is_rounded_for_the_map() {
        let store = ShiftSessionStore::new(0);
        store.create(1, ShiftData::starting_now(1)).unwrap();
        store.create(2, ShiftData::starting_now(2)).unwrap();
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_unrelated_drivers_in_parallel() {
        let store = Arc::new(ShiftSessionStore::new(8));
        let handles: Vec<_> = (0..16)
            .map(|driver_id| {
                let store = store.clone();
                thread::spawn(move || {
                    store
                        .create(driver_id, ShiftData::starting_now(100 + driver_id))
                        .unwrap();
                    store.attach_channel(driver_id, open()).unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.len(), 16);
        assert!((0..16).all(|d| store.get(d).is_some_and(|r| r.is_connected())));
    }
}
