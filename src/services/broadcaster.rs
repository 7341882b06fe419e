use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tracing::{debug, warn};

use crate::channel::{ChannelHandle, ClientEvent, ConnectionId};
use crate::error::{DeliveryError, PositionUnavailable};
use crate::models::position::GeoPosition;
use crate::models::shift::DriverId;
use crate::store::{GeolocationCache, ShiftSessionStore};

/// Where a published position ended up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishReport {
    /// The driver's own attached connection accepted the update.
    pub driver_delivered: bool,
    /// Number of dispatcher connections that accepted the update.
    pub dispatchers_delivered: usize,
}

/// Pushes position changes to the driver's current connection and to any
/// dispatcher connections watching that driver.
///
/// Delivery is best-effort. A failed push is logged and dropped; the next
/// report from the driver supersedes it anyway.
pub struct LiveUpdateBroadcaster {
    sessions: Arc<ShiftSessionStore>,
    geolocation: Arc<GeolocationCache>,
    subscribers: DashMap<DriverId, Vec<ChannelHandle>>,
    /// Drivers each dispatcher connection watches, so a disconnect can drop
    /// all of its subscriptions at once.
    watching: DashMap<ConnectionId, HashSet<DriverId>>,
}

impl LiveUpdateBroadcaster {
    pub fn new(sessions: Arc<ShiftSessionStore>, geolocation: Arc<GeolocationCache>) -> Self {
        Self {
            sessions,
            geolocation,
            subscribers: DashMap::new(),
            watching: DashMap::new(),
        }
    }

    pub fn publish_position(&self, driver_id: DriverId, position: GeoPosition) -> PublishReport {
        self.publish_position_at(driver_id, position, None)
    }

    /// Caches the position, then pushes it. `reported_at` is the device
    /// timestamp when the report carried one.
    pub fn publish_position_at(
        &self,
        driver_id: DriverId,
        position: GeoPosition,
        reported_at: Option<DateTime<Utc>>,
    ) -> PublishReport {
        match reported_at {
            Some(at) => self.geolocation.set_at(driver_id, position, at),
            None => self.geolocation.set(driver_id, position),
        }

        let mut report = PublishReport::default();

        if let Some(channel) = self.sessions.channel(driver_id) {
            match channel.emit(ClientEvent::PositionUpdate, &position) {
                Ok(()) => report.driver_delivered = true,
                Err(e) => warn!(
                    driver_id,
                    connection_id = %channel.id(),
                    error = %e,
                    "position update not delivered to driver"
                ),
            }
        }

        let watchers = self
            .subscribers
            .get(&driver_id)
            .map(|watchers| watchers.value().clone())
            .unwrap_or_default();
        let mut closed = Vec::new();
        for watcher in &watchers {
            match watcher.emit(ClientEvent::PositionUpdate, &position) {
                Ok(()) => report.dispatchers_delivered += 1,
                Err(DeliveryError::Closed(id)) => closed.push(id),
                Err(e) => warn!(driver_id, error = %e, "position update not delivered to dispatcher"),
            }
        }
        if !closed.is_empty() {
            self.prune(driver_id, &closed);
        }

        report
    }

    /// The last known position, or [`PositionUnavailable`] if the driver has
    /// never reported one. Never returns a placeholder position.
    pub fn query_position(&self, driver_id: DriverId) -> Result<GeoPosition, PositionUnavailable> {
        self.geolocation
            .get(driver_id)
            .ok_or(PositionUnavailable(driver_id))
    }

    /// Starts forwarding `driver_id`'s positions to a dispatcher connection.
    /// Re-subscribing the same connection replaces its handle.
    pub fn subscribe(&self, driver_id: DriverId, channel: ChannelHandle) {
        let connection_id = channel.id();
        {
            let mut watchers = self.subscribers.entry(driver_id).or_default();
            watchers.retain(|w| w.id() != connection_id);
            watchers.push(channel);
        }
        self.watching.entry(connection_id).or_default().insert(driver_id);
        debug!(driver_id, %connection_id, "dispatcher subscribed");
    }

    pub fn unsubscribe(&self, driver_id: DriverId, connection_id: ConnectionId) -> bool {
        let removed = self.remove_watchers(driver_id, |w| w.id() == connection_id);
        self.forget(connection_id, driver_id);
        if removed > 0 {
            debug!(driver_id, %connection_id, "dispatcher unsubscribed");
        }
        removed > 0
    }

    /// Drops every subscription held by a closed connection and returns how
    /// many were removed.
    pub fn drop_connection(&self, connection_id: ConnectionId) -> usize {
        let Some((_, drivers)) = self.watching.remove(&connection_id) else {
            return 0;
        };
        let removed: usize = drivers
            .into_iter()
            .map(|driver_id| self.remove_watchers(driver_id, |w| w.id() == connection_id))
            .sum();
        debug!(%connection_id, removed, "dispatcher connection dropped");
        removed
    }

    pub fn subscriber_count(&self, driver_id: DriverId) -> usize {
        self.subscribers.get(&driver_id).map_or(0, |watchers| watchers.len())
    }

    /// Number of connections holding at least one subscription.
    pub fn watching_connections(&self) -> usize {
        self.watching.len()
    }

    fn prune(&self, driver_id: DriverId, closed: &[ConnectionId]) {
        let removed = self.remove_watchers(driver_id, |w| closed.contains(&w.id()));
        for connection_id in closed {
            self.forget(*connection_id, driver_id);
        }
        debug!(driver_id, removed, "pruned closed dispatcher connections");
    }

    fn remove_watchers(&self, driver_id: DriverId, doomed: impl Fn(&ChannelHandle) -> bool) -> usize {
        let removed = {
            let Some(mut watchers) = self.subscribers.get_mut(&driver_id) else {
                return 0;
            };
            let before = watchers.len();
            watchers.retain(|w| !doomed(w));
            before - watchers.len()
        };
        self.subscribers
            .remove_if(&driver_id, |_, watchers| watchers.is_empty());
        removed
    }

    fn forget(&self, connection_id: ConnectionId, driver_id: DriverId) {
        if let Some(mut drivers) = self.watching.get_mut(&connection_id) {
            drivers.remove(&driver_id);
        }
        self.watching
            .remove_if(&connection_id, |_, drivers| drivers.is_empty());
    }
}
