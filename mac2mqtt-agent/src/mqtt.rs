//! Publish/subscribe seam over the broker client.
//!
//! Components talk to the broker through [`MessageSink`] so tests can swap
//! in a recording mock. The real sink wraps `rumqttc::AsyncClient` and
//! bounds every operation with the uniform 5 second timeout; a timed-out
//! publish is dropped and logged by the caller, never retried.

use async_trait::async_trait;
use rumqttc::{AsyncClient, QoS};
use std::time::Duration;
use thiserror::Error;

/// Uniform bound for a single broker operation.
pub const OPERATION_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("broker operation timed out after {0:?}")]
    Timeout(Duration),
    #[error(transparent)]
    Client(#[from] rumqttc::ClientError),
}

#[async_trait]
pub trait MessageSink: Send + Sync {
    async fn publish(&self, topic: &str, retain: bool, payload: Vec<u8>) -> Result<(), SinkError>;
    async fn subscribe(&self, filter: &str) -> Result<(), SinkError>;
}

/// Live sink over the shared broker client. QoS 0 everywhere; the retain
/// flag is the caller's choice (true only for discovery configs).
pub struct MqttSink {
    client: AsyncClient,
    timeout: Duration,
}

impl MqttSink {
    pub fn new(client: AsyncClient) -> Self {
        Self {
            client,
            timeout: OPERATION_TIMEOUT,
        }
    }
}

#[async_trait]
impl MessageSink for MqttSink {
    async fn publish(&self, topic: &str, retain: bool, payload: Vec<u8>) -> Result<(), SinkError> {
        tokio::time::timeout(
            self.timeout,
            self.client
                .publish(topic.to_owned(), QoS::AtMostOnce, retain, payload),
        )
        .await
        .map_err(|_| SinkError::Timeout(self.timeout))??;
        Ok(())
    }

    async fn subscribe(&self, filter: &str) -> Result<(), SinkError> {
        tokio::time::timeout(
            self.timeout,
            self.client.subscribe(filter.to_owned(), QoS::AtMostOnce),
        )
        .await
        .map_err(|_| SinkError::Timeout(self.timeout))??;
        Ok(())
    }
}
