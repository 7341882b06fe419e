//! Ordered fan-out of gateway frames.
//!
//! Frames for one driver always land on the same lane and each lane applies
//! its frames one at a time, so a driver's connect/disconnect/position frames
//! take effect in arrival order. Different drivers hash to different lanes
//! and proceed in parallel.

use std::sync::Arc;

use anyhow::anyhow;
use futures::future::join_all;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error};

use super::event_processor::{process_event, EventContext};
use crate::models::gateway::GatewayEvent;
use crate::models::shift::DriverId;

const LANE_CAPACITY: usize = 1024;

pub struct EventDispatcher {
    lanes: Vec<mpsc::Sender<GatewayEvent>>,
    workers: Vec<JoinHandle<()>>,
}

impl EventDispatcher {
    pub fn spawn(ctx: Arc<EventContext>, lanes: usize) -> Self {
        let (lanes, workers) = (0..lanes.max(1))
            .map(|lane| {
                let (tx, rx) = mpsc::channel(LANE_CAPACITY);
                let worker = tokio::spawn(run_lane(lane, ctx.clone(), rx));
                (tx, worker)
            })
            .unzip();
        Self { lanes, workers }
    }

    pub fn lane_count(&self) -> usize {
        self.lanes.len()
    }

    pub fn lane_for(&self, driver_id: DriverId) -> usize {
        i64::from(driver_id).rem_euclid(self.lanes.len() as i64) as usize
    }

    /// Queues a frame on its driver's lane, waiting if the lane is full.
    pub async fn dispatch(&self, event: GatewayEvent) -> anyhow::Result<()> {
        let lane = self.lane_for(event.driver_id());
        self.lanes[lane]
            .send(event)
            .await
            .map_err(|_| anyhow!("event lane {} is closed", lane))
    }

    /// Stops accepting frames and waits for every lane to drain.
    pub async fn shutdown(self) {
        let Self { lanes, workers } = self;
        drop(lanes);
        for result in join_all(workers).await {
            if let Err(e) = result {
                error!("Event lane terminated abnormally: {}", e);
            }
        }
    }
}

async fn run_lane(lane: usize, ctx: Arc<EventContext>, mut rx: mpsc::Receiver<GatewayEvent>) {
    while let Some(event) = rx.recv().await {
        let driver_id = event.driver_id();
        if let Err(e) = process_event(&ctx, event).await {
            error!(lane, driver_id, "Error processing gateway event: {:#}", e);
        }
    }
    debug!(lane, "event lane drained");
}
