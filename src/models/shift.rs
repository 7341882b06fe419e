use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::channel::ChannelHandle;

/// User id of a driver. Shift records are keyed by it.
pub type DriverId = i32;
pub type TruckId = i32;

/// Immutable payload captured when a shift starts.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShiftData {
    pub truck_id: TruckId,
    pub started_at: DateTime<Utc>,
}

impl ShiftData {
    pub fn starting_now(truck_id: TruckId) -> Self {
        Self {
            truck_id,
            started_at: Utc::now(),
        }
    }
}

/// The active shift of one driver plus the connection currently attached to it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShiftRecord {
    pub driver_user_id: DriverId,
    pub data: ShiftData,
    #[serde(skip)]
    pub channel: Option<ChannelHandle>,
}

impl ShiftRecord {
    pub fn new(driver_user_id: DriverId, data: ShiftData) -> Self {
        Self {
            driver_user_id,
            data,
            channel: None,
        }
    }

    pub fn truck_id(&self) -> TruckId {
        self.data.truck_id
    }

    pub fn is_connected(&self) -> bool {
        self.channel.is_some()
    }
}
