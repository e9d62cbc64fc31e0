//! State publishing
//!
//! Every publish re-reads the live value through the host control
//! interface; the agent holds no cached copy that could go stale. A failed
//! host read or broker publish is logged and dropped; the next scheduled
//! tick retries naturally.

use std::sync::Arc;
use tracing::{debug, warn};

use crate::host::HostControls;
use crate::identity::BridgeContext;
use crate::mqtt::MessageSink;

pub struct StatePublisher {
    sink: Arc<dyn MessageSink>,
    host: Arc<dyn HostControls>,
    ctx: Arc<BridgeContext>,
}

impl StatePublisher {
    pub fn new(
        sink: Arc<dyn MessageSink>,
        host: Arc<dyn HostControls>,
        ctx: Arc<BridgeContext>,
    ) -> Self {
        Self { sink, host, ctx }
    }

    pub async fn publish_volume(&self) {
        match self.host.volume().await {
            Ok(level) => self.publish("volume", level.to_string()).await,
            Err(e) => warn!("skipping volume publish, read failed: {}", e),
        }
    }

    pub async fn publish_mute(&self) {
        match self.host.muted().await {
            Ok(muted) => self.publish("mute", muted.to_string()).await,
            Err(e) => warn!("skipping mute publish, read failed: {}", e),
        }
    }

    /// Battery percent and power-adapter presence come from one host read,
    /// so the two topics always describe the same instant.
    pub async fn publish_battery(&self) {
        match self.host.battery().await {
            Ok(status) => {
                self.publish("battery", status.percent.to_string()).await;
                self.publish("power_adapter", status.on_ac_power.to_string())
                    .await;
            }
            Err(e) => warn!("skipping battery publish, read failed: {}", e),
        }
    }

    /// Acknowledge a trigger command before the action runs; for sleep and
    /// shutdown there is no publishing afterwards.
    pub async fn publish_ack(&self, action: &str) {
        self.publish(action, action.to_string()).await;
    }

    async fn publish(&self, metric: &str, payload: String) {
        let topic = self.ctx.topics.state(metric);
        match self.sink.publish(&topic, false, payload.into_bytes()).await {
            Ok(()) => debug!("published {}", topic),
            Err(e) => warn!("failed to publish {}: {}", topic, e),
        }
    }
}
