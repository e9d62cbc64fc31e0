//! Host identity
//!
//! Derives the stable identity token that namespaces every topic and
//! unique id: the machine hostname, cut at the first dot and stripped to
//! `[A-Za-z0-9_-]`. Derived once at startup and carried in an immutable
//! context passed to every component.

use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info};

use crate::topics::TopicNamespace;

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("hostname {0:?} contains no usable characters")]
    Unusable(String),
}

/// Sanitized host identity plus the hardware model for the device record.
#[derive(Debug, Clone)]
pub struct HostIdentity {
    id: String,
    model: String,
}

impl HostIdentity {
    /// Discover the identity from the live host.
    pub async fn discover() -> Result<Self, IdentityError> {
        let hostname = gethostname::gethostname().to_string_lossy().to_string();
        let id = sanitize_hostname(&hostname);
        if id.is_empty() {
            return Err(IdentityError::Unusable(hostname));
        }

        let model = hardware_model().await.unwrap_or_else(|| id.clone());
        info!("host identity derived from hostname {:?}", hostname);

        Ok(Self { id, model })
    }

    #[cfg(test)]
    pub fn for_tests(id: &str) -> Self {
        Self {
            id: id.to_string(),
            model: id.to_string(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

/// Immutable per-process context handed to every component.
#[derive(Debug)]
pub struct BridgeContext {
    pub identity: HostIdentity,
    pub topics: TopicNamespace,
}

impl BridgeContext {
    pub fn new(identity: HostIdentity) -> Self {
        let topics = TopicNamespace::new(identity.id());
        Self { identity, topics }
    }
}

/// "name.local" => "name", restricted to [a-zA-Z0-9_-].
pub fn sanitize_hostname(hostname: &str) -> String {
    let first_label = hostname.split('.').next().unwrap_or("");
    first_label
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .collect()
}

/// Best-effort hardware model probe; the identity is a fine fallback.
async fn hardware_model() -> Option<String> {
    let output = Command::new("/usr/sbin/sysctl")
        .args(["-n", "hw.model"])
        .output()
        .await
        .ok()?;
    if !output.status.success() {
        debug!("sysctl hw.model failed, falling back to host identity");
        return None;
    }
    let model = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!model.is_empty()).then_some(model)
}
