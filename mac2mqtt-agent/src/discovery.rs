//! Home Assistant MQTT discovery
//!
//! One retained config message per managed entity, published on every
//! successful (re)connection. Retained delivery means a restarted hub sees
//! the latest descriptors without the agent being asked. Descriptor
//! construction is a pure function of the host identity, so a repeated
//! announcement overwrites the retained copy with identical bytes.

use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::identity::BridgeContext;
use crate::mqtt::MessageSink;
use crate::topics::{config_topic, unique_id};

/// Shared device record tying all entities to one host.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Device {
    pub identifiers: Vec<String>,
    pub name: String,
    pub manufacturer: String,
    pub model: String,
}

#[derive(Debug, Serialize)]
struct SensorConfig {
    name: String,
    state_topic: String,
    unique_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    unit_of_measurement: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    device_class: Option<String>,
    device: Device,
}

#[derive(Debug, Serialize)]
struct BinarySensorConfig {
    name: String,
    state_topic: String,
    unique_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    device_class: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    payload_on: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    payload_off: Option<String>,
    device: Device,
}

#[derive(Debug, Serialize)]
struct ButtonConfig {
    name: String,
    command_topic: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    state_topic: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    payload_press: Option<String>,
    unique_id: String,
    device: Device,
}

#[derive(Debug, Serialize)]
struct NumberConfig {
    name: String,
    command_topic: String,
    state_topic: String,
    unique_id: String,
    min: u8,
    max: u8,
    device: Device,
}

/// One retained discovery publish: config topic plus serialized payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Announcement {
    pub topic: String,
    pub payload: Vec<u8>,
}

impl Announcement {
    fn new<C: Serialize>(kind: &str, uid: &str, config: &C) -> serde_json::Result<Self> {
        Ok(Self {
            topic: config_topic(kind, uid),
            payload: serde_json::to_vec(config)?,
        })
    }
}

/// Build the full set of entity descriptors for a host.
pub fn announcements(ctx: &BridgeContext) -> serde_json::Result<Vec<Announcement>> {
    let id = ctx.identity.id();
    let topics = &ctx.topics;

    let device = Device {
        identifiers: vec![id.to_string()],
        name: id.to_string(),
        manufacturer: "Apple".to_string(),
        model: ctx.identity.model().to_string(),
    };

    let battery_uid = unique_id(id, "battery");
    let battery = SensorConfig {
        name: format!("{id} Battery Level"),
        state_topic: topics.state("battery"),
        unique_id: battery_uid.clone(),
        unit_of_measurement: Some("%".to_string()),
        device_class: Some("battery".to_string()),
        device: device.clone(),
    };

    let power_uid = unique_id(id, "power_adapter");
    let power_adapter = BinarySensorConfig {
        name: format!("{id} Power Adapter"),
        state_topic: topics.state("power_adapter"),
        unique_id: power_uid.clone(),
        device_class: Some("plug".to_string()),
        payload_on: Some("true".to_string()),
        payload_off: Some("false".to_string()),
        device: device.clone(),
    };

    let volume_uid = unique_id(id, "volume");
    let volume = NumberConfig {
        name: format!("{id} Volume"),
        command_topic: topics.command("volume"),
        state_topic: topics.state("volume"),
        unique_id: volume_uid.clone(),
        min: 0,
        max: 100,
        device: device.clone(),
    };

    let mute_uid = unique_id(id, "mute");
    let mute = ButtonConfig {
        name: format!("{id} Mute"),
        command_topic: topics.command("mute"),
        state_topic: None,
        payload_press: Some("true".to_string()),
        unique_id: mute_uid.clone(),
        device: device.clone(),
    };

    let sleep_uid = unique_id(id, "sleep");
    let sleep = ButtonConfig {
        name: format!("{id} Sleep"),
        command_topic: topics.command("sleep"),
        state_topic: Some(topics.state("sleep")),
        payload_press: Some("sleep".to_string()),
        unique_id: sleep_uid.clone(),
        device: device.clone(),
    };

    let display_sleep_uid = unique_id(id, "display_sleep");
    let display_sleep = ButtonConfig {
        name: format!("{id} Display Sleep"),
        command_topic: topics.command("displaysleep"),
        state_topic: Some(topics.state("displaysleep")),
        payload_press: Some("displaysleep".to_string()),
        unique_id: display_sleep_uid.clone(),
        device: device.clone(),
    };

    let shutdown_uid = unique_id(id, "shutdown");
    let shutdown = ButtonConfig {
        name: format!("{id} Shutdown"),
        command_topic: topics.command("shutdown"),
        state_topic: Some(topics.state("shutdown")),
        payload_press: Some("shutdown".to_string()),
        unique_id: shutdown_uid.clone(),
        device,
    };

    Ok(vec![
        Announcement::new("sensor", &battery_uid, &battery)?,
        Announcement::new("binary_sensor", &power_uid, &power_adapter)?,
        Announcement::new("number", &volume_uid, &volume)?,
        Announcement::new("button", &mute_uid, &mute)?,
        Announcement::new("button", &sleep_uid, &sleep)?,
        Announcement::new("button", &display_sleep_uid, &display_sleep)?,
        Announcement::new("button", &shutdown_uid, &shutdown)?,
    ])
}

/// Publishes the retained descriptors; one failed entity never blocks the
/// rest.
pub struct DiscoveryPublisher {
    sink: Arc<dyn MessageSink>,
    ctx: Arc<BridgeContext>,
}

impl DiscoveryPublisher {
    pub fn new(sink: Arc<dyn MessageSink>, ctx: Arc<BridgeContext>) -> Self {
        Self { sink, ctx }
    }

    pub async fn announce(&self) {
        let announcements = match announcements(&self.ctx) {
            Ok(announcements) => announcements,
            Err(e) => {
                warn!("failed to serialize discovery configs: {}", e);
                return;
            }
        };

        for announcement in announcements {
            match self
                .sink
                .publish(&announcement.topic, true, announcement.payload)
                .await
            {
                Ok(()) => debug!("published discovery config to {}", announcement.topic),
                Err(e) => warn!(
                    "failed to publish discovery config to {}: {}",
                    announcement.topic, e
                ),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::HostIdentity;
    use serde_json::Value;

    fn context() -> BridgeContext {
        BridgeContext::new(HostIdentity::for_tests("testhost"))
    }

    fn find<'a>(announcements: &'a [Announcement], topic: &str) -> &'a Announcement {
        announcements
            .iter()
            .find(|a| a.topic == topic)
            .unwrap_or_else(|| panic!("no announcement for {topic}"))
    }

    #[test]
    fn announces_all_seven_entities() {
        let announcements = announcements(&context()).unwrap();
        assert_eq!(announcements.len(), 7);
    }

    #[test]
    fn volume_number_config_matches_hub_expectations() {
        let announcements = announcements(&context()).unwrap();
        let volume = find(&announcements, "homeassistant/number/testhost_volume/config");
        let config: Value = serde_json::from_slice(&volume.payload).unwrap();

        assert_eq!(config["unique_id"], "testhost_volume");
        assert_eq!(config["min"], 0);
        assert_eq!(config["max"], 100);
        assert_eq!(config["command_topic"], "homeassistant/testhost/command/volume");
        assert_eq!(config["state_topic"], "homeassistant/testhost/state/volume");
        assert_eq!(config["device"]["identifiers"][0], "testhost");
    }

    #[test]
    fn empty_optionals_are_omitted() {
        let announcements = announcements(&context()).unwrap();
        let mute = find(&announcements, "homeassistant/button/testhost_mute/config");
        let config: Value = serde_json::from_slice(&mute.payload).unwrap();

        assert_eq!(config["payload_press"], "true");
        assert!(config.get("state_topic").is_none());
        assert!(config.get("device_class").is_none());
    }

    #[test]
    fn trigger_buttons_are_gated_on_their_literals() {
        let announcements = announcements(&context()).unwrap();
        for (entity, literal) in [
            ("sleep", "sleep"),
            ("display_sleep", "displaysleep"),
            ("shutdown", "shutdown"),
        ] {
            let topic = format!("homeassistant/button/testhost_{entity}/config");
            let config: Value = serde_json::from_slice(&find(&announcements, &topic).payload).unwrap();
            assert_eq!(config["payload_press"], literal);
        }
    }

    #[test]
    fn announcing_twice_is_byte_identical() {
        let ctx = context();
        let first = announcements(&ctx).unwrap();
        let second = announcements(&ctx).unwrap();
        assert_eq!(first, second);
    }
}
