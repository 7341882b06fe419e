pub mod broadcaster;
pub mod lifecycle;
pub mod reconciler;

pub use broadcaster::{LiveUpdateBroadcaster, PublishReport};
pub use lifecycle::ShiftLifecycleService;
pub use reconciler::{ConnectionState, ReconnectionReconciler, ShiftSyncPayload, SyncOutcome};
