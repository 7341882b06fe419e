//! Process-wide in-memory registries for live driver state.
//!
//! Both stores are constructed explicitly and shared by `Arc`; nothing here
//! is a global. They are the single source of truth for live state and are
//! never mirrored to the database.

pub mod geolocation;
pub mod sessions;

pub use geolocation::GeolocationCache;
pub use sessions::ShiftSessionStore;

/// Lock shards per registry when none is configured.
pub const DEFAULT_SHARDS: usize = 16;

/// DashMap wants a power of two above one.
pub(crate) fn shard_amount(shards: usize) -> usize {
    shards.max(2).next_power_of_two()
}
