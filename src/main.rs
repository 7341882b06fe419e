use std::sync::Arc;

use fleet_shifts::config::AppConfig;
use fleet_shifts::db::{self, PgFleetRepository};
use fleet_shifts::kafka::{self, KafkaOutlet};
use fleet_shifts::processor::{EventContext, EventDispatcher};
use fleet_shifts::state::AppState;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load config
    let config = AppConfig::load()?;

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(&config.log_level)
        .init();

    info!("Starting Fleet Shifts Service...");

    // Init DB
    let pool = db::init_pool(&config.database_url).await?;
    info!("Connected to database");

    let repository = Arc::new(PgFleetRepository::new(pool));
    let state = AppState::new(config.live_options(), repository.clone(), repository);

    let ctx = Arc::new(EventContext {
        state,
        channels: Arc::new(KafkaOutlet::new(&config)?),
    });
    let dispatcher = EventDispatcher::spawn(ctx, config.event_workers);
    info!("Started {} event lanes", dispatcher.lane_count());

    // Start Kafka
    let result = tokio::select! {
        result = kafka::start_kafka_consumer(&config, &dispatcher) => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
            Ok(())
        }
    };

    dispatcher.shutdown().await;
    info!("Event lanes drained");

    result
}
