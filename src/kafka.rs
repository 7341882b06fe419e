use crate::channel::{ChannelFactory, ChannelHandle, ConnectionId};
use crate::config::AppConfig;
use crate::models::gateway::OutboundEnvelope;
use crate::models::shift::DriverId;
use crate::processor::{decode_event, EventDispatcher};
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::message::Message;
use rdkafka::producer::{FutureProducer, FutureRecord};
use std::time::Duration;
use tracing::{debug, error, info, warn};

const DELIVERY_TIMEOUT: Duration = Duration::from_secs(5);

fn client_config(config: &AppConfig) -> ClientConfig {
    let mut client_config = ClientConfig::new();
    client_config
        .set("bootstrap.servers", &config.kafka_bootstrap_servers)
        // SASL Configuration
        .set("security.protocol", &config.kafka_security_protocol)
        .set("sasl.mechanism", &config.kafka_sasl_mechanism)
        .set("sasl.username", &config.kafka_username)
        .set("sasl.password", &config.kafka_password);
    client_config
}

/// Delivers outbound client events by publishing them to the gateway's
/// outbound topic, keyed by connection id.
#[derive(Clone)]
pub struct KafkaOutlet {
    producer: FutureProducer,
    topic: String,
}

impl KafkaOutlet {
    pub fn new(config: &AppConfig) -> anyhow::Result<Self> {
        let producer: FutureProducer = client_config(config)
            .set("message.timeout.ms", "10000")
            .create()?;
        Ok(Self {
            producer,
            topic: config.kafka_outbound_topic.clone(),
        })
    }
}

impl ChannelFactory for KafkaOutlet {
    /// Spawns a drain task that lives until every handle for this connection
    /// is dropped.
    fn open(&self, connection_id: ConnectionId, driver_id: DriverId) -> ChannelHandle {
        let (handle, mut rx) = ChannelHandle::open(connection_id);
        let producer = self.producer.clone();
        let topic = self.topic.clone();

        tokio::spawn(async move {
            let key = connection_id.to_string();
            while let Some(event) = rx.recv().await {
                let envelope = OutboundEnvelope {
                    connection_id,
                    driver_id,
                    event: &event,
                };
                let body = match serde_json::to_vec(&envelope) {
                    Ok(body) => body,
                    Err(e) => {
                        warn!("Failed to encode outbound event for {}: {}", key, e);
                        continue;
                    }
                };

                let record = FutureRecord::to(&topic).key(&key).payload(&body);
                if let Err((e, _)) = producer.send(record, DELIVERY_TIMEOUT).await {
                    // Best-effort: the client resyncs on its next reconnect.
                    warn!("Failed to deliver outbound event for {}: {}", key, e);
                }
            }
            debug!(%connection_id, driver_id, "outbound channel closed");
        });

        handle
    }
}

/// Starts the gateway consumer with SASL/SCRAM authentication and a circuit breaker mechanism.
pub async fn start_kafka_consumer(config: &AppConfig, dispatcher: &EventDispatcher) -> anyhow::Result<()> {
    info!("Initializing Kafka consumer for topic: {}", config.kafka_inbound_topic);

    let consumer: StreamConsumer = client_config(config)
        .set("group.id", &config.kafka_group_id)
        .set("auto.offset.reset", &config.kafka_auto_offset_reset)
        .create()?;

    consumer.subscribe(&[config.kafka_inbound_topic.as_str()])?;
    info!("Subscribed to topic: {}", config.kafka_inbound_topic);

    let mut consecutive_failures = 0;
    let max_retries = config.kafka_max_retries;
    let cooldown_duration = Duration::from_secs(config.kafka_circuit_breaker_cooldown);

    loop {
        // Circuit Breaker Check
        if consecutive_failures >= max_retries {
            warn!(
                "Circuit breaker tripped ({} consecutive failures)! Sleeping for {} seconds...",
                consecutive_failures,
                config.kafka_circuit_breaker_cooldown
            );
            tokio::time::sleep(cooldown_duration).await;
            consecutive_failures = 0;
            info!("Circuit breaker reset. Resuming consumption.");
        }

        match consumer.recv().await {
            Ok(m) => {
                consecutive_failures = 0;

                let payload = match m.payload() {
                    None => {
                        warn!("Received empty payload from Kafka");
                        continue;
                    }
                    Some(p) => p,
                };

                let Some(event) = decode_event(config.kafka_payload_format, payload) else {
                    continue;
                };

                // Not spawned: the lane keeps this driver's frames in order.
                let driver_id = event.driver_id();
                if let Err(e) = dispatcher.dispatch(event).await {
                    error!(
                        driver_id,
                        lane = dispatcher.lane_for(driver_id),
                        "Failed to dispatch gateway event, stopping consumer: {:#}",
                        e
                    );
                    return Err(e);
                }
            }
            Err(e) => {
                error!("Kafka error: {}. Incrementing failure count ({} / {})", e, consecutive_failures + 1, max_retries);
                consecutive_failures += 1;

                // Small delay to prevent tight loop in case of minor network glitches
                tokio::time::sleep(Duration::from_millis(500)).await;
            }
        }
    }
}
