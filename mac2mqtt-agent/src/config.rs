//! Broker configuration
//!
//! The agent reads a small TOML file with the broker address and
//! credentials. All four fields are required; a missing or empty field is a
//! startup error so a misconfigured agent never limps along half-connected.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default configuration file name, looked up in the working directory and
/// then under the user's config directory (`<config>/mac2mqtt/`).
pub const FILE_NAME: &str = "mac2mqtt.toml";

#[derive(Debug, Clone, Deserialize)]
pub struct BridgeConfig {
    pub mqtt_ip: String,
    pub mqtt_port: u16,
    pub mqtt_user: String,
    pub mqtt_password: String,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no {FILE_NAME} found (searched {searched})")]
    NotFound { searched: String },
    #[error("failed to read {path}: {source}")]
    Unreadable {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Invalid {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("must specify {0} in {FILE_NAME}")]
    MissingField(&'static str),
}

impl BridgeConfig {
    /// Load the configuration, preferring an explicitly given path.
    pub async fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let candidates = match explicit {
            Some(path) => vec![path.to_path_buf()],
            None => Self::default_paths(),
        };

        for path in &candidates {
            if path.exists() {
                let content = tokio::fs::read_to_string(path).await.map_err(|source| {
                    ConfigError::Unreadable {
                        path: path.clone(),
                        source,
                    }
                })?;
                return Self::parse(&content, path);
            }
        }

        let searched = candidates
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(", ");
        Err(ConfigError::NotFound { searched })
    }

    /// Parse and validate file content.
    pub fn parse(content: &str, path: &Path) -> Result<Self, ConfigError> {
        let config: BridgeConfig =
            toml::from_str(content).map_err(|source| ConfigError::Invalid {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()
    }

    fn validate(self) -> Result<Self, ConfigError> {
        if self.mqtt_ip.is_empty() {
            return Err(ConfigError::MissingField("mqtt_ip"));
        }
        if self.mqtt_user.is_empty() {
            return Err(ConfigError::MissingField("mqtt_user"));
        }
        if self.mqtt_password.is_empty() {
            return Err(ConfigError::MissingField("mqtt_password"));
        }
        Ok(self)
    }

    fn default_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(FILE_NAME)];
        if let Some(mut dir) = dirs::config_dir() {
            dir.push("mac2mqtt");
            dir.push(FILE_NAME);
            paths.push(dir);
        }
        paths
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(content: &str) -> Result<BridgeConfig, ConfigError> {
        BridgeConfig::parse(content, Path::new(FILE_NAME))
    }

    #[test]
    fn parses_complete_config() {
        let config = parse(
            r#"
            mqtt_ip = "10.0.0.5"
            mqtt_port = 1883
            mqtt_user = "u"
            mqtt_password = "p"
            "#,
        )
        .unwrap();

        assert_eq!(config.mqtt_ip, "10.0.0.5");
        assert_eq!(config.mqtt_port, 1883);
        assert_eq!(config.mqtt_user, "u");
        assert_eq!(config.mqtt_password, "p");
    }

    #[test]
    fn rejects_missing_field() {
        let err = parse(
            r#"
            mqtt_ip = "10.0.0.5"
            mqtt_port = 1883
            mqtt_user = "u"
            "#,
        )
        .unwrap_err();

        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn rejects_empty_required_field() {
        let err = parse(
            r#"
            mqtt_ip = ""
            mqtt_port = 1883
            mqtt_user = "u"
            mqtt_password = "p"
            "#,
        )
        .unwrap_err();

        assert!(matches!(err, ConfigError::MissingField("mqtt_ip")));
    }

    #[test]
    fn rejects_non_numeric_port() {
        let err = parse(
            r#"
            mqtt_ip = "10.0.0.5"
            mqtt_port = "1883a"
            mqtt_user = "u"
            mqtt_password = "p"
            "#,
        )
        .unwrap_err();

        assert!(matches!(err, ConfigError::Invalid { .. }));
    }
}
