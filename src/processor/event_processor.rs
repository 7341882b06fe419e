use std::sync::Arc;

use prost::Message;
use tracing::{debug, warn};

use crate::channel::ChannelFactory;
use crate::config::PayloadFormat;
use crate::models::frame::GatewayFrame;
use crate::models::gateway::GatewayEvent;
use crate::models::position::GeoPosition;
use crate::state::AppState;

/// Everything a lane needs to apply gateway frames.
pub struct EventContext {
    pub state: AppState,
    pub channels: Arc<dyn ChannelFactory>,
}

/// Decodes one inbound frame. Malformed frames are logged and skipped.
pub fn decode_event(format: PayloadFormat, payload: &[u8]) -> Option<GatewayEvent> {
    let decoded = match format {
        PayloadFormat::Json => serde_json::from_slice::<GatewayEvent>(payload).map_err(anyhow::Error::from),
        PayloadFormat::Protobuf => GatewayFrame::decode(payload)
            .map_err(anyhow::Error::from)
            .and_then(|frame| Ok(GatewayEvent::try_from(frame)?)),
    };

    match decoded {
        Ok(event) => Some(event),
        Err(e) => {
            warn!("Failed to parse gateway frame ({:?}): {}", format, e);
            None
        }
    }
}

/// Applies one gateway frame to the live state.
pub async fn process_event(ctx: &EventContext, event: GatewayEvent) -> anyhow::Result<()> {
    match event {
        GatewayEvent::Connected {
            driver_id,
            connection_id,
        } => {
            let channel = ctx.channels.open(connection_id, driver_id);
            let outcome = ctx.state.reconciler.on_connect(driver_id, channel).await?;
            debug!(driver_id, %connection_id, ?outcome, "connect processed");
        }
        GatewayEvent::Disconnected {
            driver_id,
            connection_id,
        } => {
            let detached = ctx.state.reconciler.on_disconnect(driver_id, connection_id);
            let released = ctx.state.broadcaster.drop_connection(connection_id);
            debug!(driver_id, %connection_id, detached, released, "disconnect processed");
        }
        GatewayEvent::Position {
            driver_id,
            lat,
            lng,
            reported_at,
        } => {
            let report = ctx.state.broadcaster.publish_position_at(
                driver_id,
                GeoPosition::new(lat, lng),
                reported_at,
            );
            debug!(
                driver_id,
                driver_delivered = report.driver_delivered,
                dispatchers = report.dispatchers_delivered,
                "position processed"
            );
        }
        GatewayEvent::Subscribed {
            driver_id,
            connection_id,
        } => {
            let channel = ctx.channels.open(connection_id, driver_id);
            ctx.state.broadcaster.subscribe(driver_id, channel);
        }
        GatewayEvent::Unsubscribed {
            driver_id,
            connection_id,
        } => {
            ctx.state.broadcaster.unsubscribe(driver_id, connection_id);
        }
    }

    Ok(())
}
