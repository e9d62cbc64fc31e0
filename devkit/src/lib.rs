/*!
# mac2mqtt DevKit

Test support for the workspace:
- Mock MQTT client for tests without a live broker
*/

pub mod mqtt_stub;

pub use mqtt_stub::{MockMessage, MockMqttClient};
