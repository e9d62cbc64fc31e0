/*!
Mock MQTT client for development without a broker.

Records every publish and subscription so tests can assert on the exact
messages a component produced, and can simulate inbound messages through a
channel.
*/

use anyhow::Result;
use rumqttc::QoS;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct MockMessage {
    pub topic: String,
    pub payload: Vec<u8>,
    pub qos: QoS,
    pub retain: bool,
}

/// Mock client mirroring the `rumqttc::AsyncClient` publish/subscribe
/// surface. Clones share the recorded state.
#[derive(Clone, Default)]
pub struct MockMqttClient {
    published_messages: Arc<Mutex<Vec<MockMessage>>>,
    subscriptions: Arc<Mutex<Vec<String>>>,
    message_sender: Arc<Mutex<Option<mpsc::UnboundedSender<MockMessage>>>>,
}

impl MockMqttClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set up a channel for receiving simulated inbound messages.
    pub fn setup_receiver(&self) -> mpsc::UnboundedReceiver<MockMessage> {
        let (sender, receiver) = mpsc::unbounded_channel();
        *self.message_sender.lock().unwrap() = Some(sender);
        receiver
    }

    /// Record a publish (compatible with the `AsyncClient` signature).
    pub async fn publish<S, V>(&self, topic: S, qos: QoS, retain: bool, payload: V) -> Result<()>
    where
        S: Into<String>,
        V: Into<Vec<u8>>,
    {
        let message = MockMessage {
            topic: topic.into(),
            payload: payload.into(),
            qos,
            retain,
        };

        self.published_messages.lock().unwrap().push(message.clone());
        debug!("[mock] published {} bytes to {}", message.payload.len(), message.topic);
        Ok(())
    }

    /// Record a subscription (compatible with the `AsyncClient` signature).
    pub async fn subscribe<S: Into<String>>(&self, topic: S, _qos: QoS) -> Result<()> {
        let topic = topic.into();
        self.subscriptions.lock().unwrap().push(topic.clone());
        debug!("[mock] subscribed to {}", topic);
        Ok(())
    }

    /// Simulate an inbound message for the receiver side of a test.
    pub async fn simulate_incoming<S, V>(&self, topic: S, payload: V) -> Result<()>
    where
        S: Into<String>,
        V: Into<Vec<u8>>,
    {
        let message = MockMessage {
            topic: topic.into(),
            payload: payload.into(),
            qos: QoS::AtMostOnce,
            retain: false,
        };

        if let Some(sender) = self.message_sender.lock().unwrap().as_ref() {
            sender
                .send(message.clone())
                .map_err(|e| anyhow::anyhow!("send error: {e}"))?;
        }

        debug!("[mock] simulated incoming on {}", message.topic);
        Ok(())
    }

    /// All recorded publishes, in order.
    pub fn get_published_messages(&self) -> Vec<MockMessage> {
        self.published_messages.lock().unwrap().clone()
    }

    /// All recorded subscriptions, in order.
    pub fn get_subscriptions(&self) -> Vec<String> {
        self.subscriptions.lock().unwrap().clone()
    }

    /// Recorded publishes to one topic.
    pub fn find_messages_by_topic(&self, topic: &str) -> Vec<MockMessage> {
        self.published_messages
            .lock()
            .unwrap()
            .iter()
            .filter(|msg| msg.topic == topic)
            .cloned()
            .collect()
    }

    /// Parse the most recent message on a topic as JSON.
    pub fn get_last_json_message<T>(&self, topic: &str) -> Result<Option<T>>
    where
        T: for<'de> serde::Deserialize<'de>,
    {
        let messages = self.find_messages_by_topic(topic);
        match messages.last() {
            Some(last) => Ok(Some(serde_json::from_slice(&last.payload)?)),
            None => Ok(None),
        }
    }

    /// Drop all recorded messages and subscriptions.
    pub fn clear(&self) {
        self.published_messages.lock().unwrap().clear();
        self.subscriptions.lock().unwrap().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[tokio::test]
    async fn records_publishes_in_order() {
        let client = MockMqttClient::new();
        client.publish("a/b", QoS::AtMostOnce, false, "1").await.unwrap();
        client.publish("a/c", QoS::AtMostOnce, true, "2").await.unwrap();

        let messages = client.get_published_messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].topic, "a/b");
        assert!(messages[1].retain);
    }

    #[tokio::test]
    async fn filters_by_topic_and_parses_json() {
        let client = MockMqttClient::new();
        client
            .publish("cfg", QoS::AtMostOnce, true, r#"{"min":0,"max":100}"#)
            .await
            .unwrap();

        assert_eq!(client.find_messages_by_topic("cfg").len(), 1);
        assert_eq!(client.find_messages_by_topic("other").len(), 0);

        let parsed: Value = client.get_last_json_message("cfg").unwrap().unwrap();
        assert_eq!(parsed["max"], 100);
    }

    #[tokio::test]
    async fn delivers_simulated_incoming_messages() {
        let client = MockMqttClient::new();
        let mut receiver = client.setup_receiver();

        client.simulate_incoming("cmd/volume", "55").await.unwrap();

        let message = receiver.recv().await.unwrap();
        assert_eq!(message.topic, "cmd/volume");
        assert_eq!(message.payload, b"55");
    }

    #[tokio::test]
    async fn clear_resets_recorded_state() {
        let client = MockMqttClient::new();
        client.publish("a", QoS::AtMostOnce, false, "x").await.unwrap();
        client.subscribe("a/#", QoS::AtMostOnce).await.unwrap();

        client.clear();

        assert!(client.get_published_messages().is_empty());
        assert!(client.get_subscriptions().is_empty());
    }
}
