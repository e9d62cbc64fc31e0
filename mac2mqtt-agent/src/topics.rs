//! Topic naming
//!
//! Everything the agent says or hears lives under `homeassistant/<id>`:
//! inbound commands on `<prefix>/command/<action>`, outbound state on
//! `<prefix>/state/<metric>`. Discovery configs go to the global
//! `homeassistant/<kind>/<unique id>/config` topics instead so the hub
//! picks them up without knowing the host.

/// Deterministic topic namespace for one host identity.
#[derive(Debug, Clone)]
pub struct TopicNamespace {
    prefix: String,
}

impl TopicNamespace {
    pub fn new(identity: &str) -> Self {
        Self {
            prefix: format!("homeassistant/{identity}"),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// `<prefix>/command/<action>` — inbound.
    pub fn command(&self, action: &str) -> String {
        format!("{}/command/{action}", self.prefix)
    }

    /// Wildcard filter covering every command topic.
    pub fn command_wildcard(&self) -> String {
        format!("{}/command/#", self.prefix)
    }

    /// `<prefix>/state/<metric>` — outbound.
    pub fn state(&self, metric: &str) -> String {
        format!("{}/state/{metric}", self.prefix)
    }

    /// The `<action>` part of an inbound command topic, if it is one.
    pub fn command_action<'a>(&self, topic: &'a str) -> Option<&'a str> {
        topic
            .strip_prefix(self.prefix.as_str())?
            .strip_prefix("/command/")
    }
}

/// Discovery config topic: `homeassistant/<kind>/<unique id>/config`.
pub fn config_topic(kind: &str, unique_id: &str) -> String {
    format!("homeassistant/{kind}/{unique_id}/config")
}

/// `<identity>_<entity>` — unique id for one entity of one host.
pub fn unique_id(identity: &str, entity: &str) -> String {
    format!("{identity}_{entity}")
}
