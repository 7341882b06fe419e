//! Error types for the shift session core.
//!
//! Every failure the core can produce is a typed value. The process edge
//! (`main`, the Kafka loop) folds them into `anyhow` for logging.

use thiserror::Error;

use crate::channel::ConnectionId;
use crate::models::shift::{DriverId, TruckId};

/// Errors raised by the in-memory shift session store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// The driver already has an active shift.
    #[error("driver {0} already has an active shift")]
    Conflict(DriverId),

    /// The truck is held by another driver's active shift.
    #[error("truck {truck_id} is already in use by driver {driver_id}")]
    TruckInUse { truck_id: TruckId, driver_id: DriverId },

    /// No shift record exists for the driver.
    #[error("driver {0} is not on shift")]
    NotFound(DriverId),
}

/// Errors raised by external collaborators (truck and driver lookups).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i32 },

    #[error("backend error: {0}")]
    Backend(String),
}

impl From<sqlx::Error> for LookupError {
    fn from(e: sqlx::Error) -> Self {
        LookupError::Backend(e.to_string())
    }
}

/// Why a truck cannot be used to start a shift.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnavailableReason {
    NotAssigned,
    InUse { driver_id: DriverId },
}

impl std::fmt::Display for UnavailableReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnavailableReason::NotAssigned => write!(f, "not assigned to this driver"),
            UnavailableReason::InUse { driver_id } => {
                write!(f, "in use by driver {}", driver_id)
            }
        }
    }
}

/// Errors surfaced by shift start/end operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShiftError {
    #[error("driver {0} is already on shift")]
    AlreadyOnShift(DriverId),

    #[error("truck {truck_id} is unavailable: {reason}")]
    TruckUnavailable {
        truck_id: TruckId,
        reason: UnavailableReason,
    },

    #[error(transparent)]
    Lookup(#[from] LookupError),
}

impl From<SessionError> for ShiftError {
    fn from(e: SessionError) -> Self {
        match e {
            SessionError::Conflict(driver_id) => ShiftError::AlreadyOnShift(driver_id),
            SessionError::TruckInUse {
                truck_id,
                driver_id,
            } => ShiftError::TruckUnavailable {
                truck_id,
                reason: UnavailableReason::InUse { driver_id },
            },
            SessionError::NotFound(driver_id) => ShiftError::Lookup(LookupError::NotFound {
                entity: "shift",
                id: driver_id,
            }),
        }
    }
}

/// A message could not be handed to a live connection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    #[error("connection {0} is closed")]
    Closed(ConnectionId),

    #[error("failed to encode payload: {0}")]
    Encode(String),
}

/// Errors from the reconnect synchronization sequence.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReconcileError {
    /// The session's truck could not be resolved. The session is left intact.
    #[error("failed to resolve truck {truck_id} for driver {driver_id}: {source}")]
    TruckResolution {
        driver_id: DriverId,
        truck_id: TruckId,
        #[source]
        source: LookupError,
    },
}

/// No position has ever been reported for the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("location of driver {0} is unknown")]
pub struct PositionUnavailable(pub DriverId);

/// Errors returned by the caller-facing position query.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("driver {0} does not exist")]
    DriverNotFound(DriverId),

    #[error(transparent)]
    Unavailable(#[from] PositionUnavailable),

    #[error(transparent)]
    Lookup(#[from] LookupError),
}
