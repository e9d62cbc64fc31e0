//! Command routing
//!
//! Inbound payloads are decoded into typed commands before anything
//! touches the host: volume must be an integer in 0..=100, mute a literal
//! bool, and the trigger commands fire only on their exact payload. After
//! a successful volume or mute mutation the router waits a short settle
//! delay and republishes both audio metrics from fresh host reads — the
//! OS may quantize the requested value or another change may have landed
//! in between, so state is read back, never echoed.

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::host::HostControls;
use crate::state::StatePublisher;

/// Time given to the OS to apply an audio change before read-back.
pub const SETTLE_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    SetVolume(u8),
    SetMute(bool),
    Sleep,
    DisplaySleep,
    Shutdown,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("volume payload {0:?} is not an integer in 0..=100")]
    InvalidVolume(String),
    #[error("mute payload {0:?} is not \"true\" or \"false\"")]
    InvalidMute(String),
}

/// Decode one command topic's payload into a typed command.
///
/// `Ok(None)` means a deliberate no-op: an unknown action, or a trigger
/// whose payload does not match its literal. `Err` is a malformed payload
/// on a topic that does carry a schema.
pub fn decode(action: &str, payload: &str) -> Result<Option<Command>, CommandError> {
    match action {
        "volume" => payload
            .parse::<i64>()
            .ok()
            .filter(|level| (0..=100).contains(level))
            .map(|level| Some(Command::SetVolume(level as u8)))
            .ok_or_else(|| CommandError::InvalidVolume(payload.to_string())),
        "mute" => match payload {
            "true" => Ok(Some(Command::SetMute(true))),
            "false" => Ok(Some(Command::SetMute(false))),
            _ => Err(CommandError::InvalidMute(payload.to_string())),
        },
        "sleep" => Ok((payload == "sleep").then_some(Command::Sleep)),
        "displaysleep" => Ok((payload == "displaysleep").then_some(Command::DisplaySleep)),
        "shutdown" => Ok((payload == "shutdown").then_some(Command::Shutdown)),
        _ => Ok(None),
    }
}

pub struct CommandRouter {
    host: Arc<dyn HostControls>,
    state: Arc<StatePublisher>,
    settle: Duration,
}

impl CommandRouter {
    pub fn new(host: Arc<dyn HostControls>, state: Arc<StatePublisher>, settle: Duration) -> Self {
        Self {
            host,
            state,
            settle,
        }
    }

    pub async fn handle(&self, action: &str, payload: &[u8]) {
        let Ok(payload) = std::str::from_utf8(payload) else {
            warn!("ignoring non-UTF-8 payload on command {}", action);
            return;
        };
        info!("received command [{}] [{}]", action, payload);

        match decode(action, payload) {
            Ok(Some(command)) => self.execute(command).await,
            Ok(None) => debug!("ignoring command {} with payload {:?}", action, payload),
            Err(e) => warn!("rejected command: {}", e),
        }
    }

    async fn execute(&self, command: Command) {
        match command {
            Command::SetVolume(level) => {
                if let Err(e) = self.host.set_volume(level).await {
                    warn!("failed to set volume: {}", e);
                    return;
                }
                self.republish_audio().await;
            }
            Command::SetMute(muted) => {
                if let Err(e) = self.host.set_muted(muted).await {
                    warn!("failed to set mute: {}", e);
                    return;
                }
                self.republish_audio().await;
            }
            Command::Sleep => {
                self.state.publish_ack("sleep").await;
                if let Err(e) = self.host.sleep().await {
                    warn!("failed to sleep: {}", e);
                }
            }
            Command::DisplaySleep => {
                self.state.publish_ack("displaysleep").await;
                if let Err(e) = self.host.display_sleep().await {
                    warn!("failed to sleep display: {}", e);
                }
            }
            Command::Shutdown => {
                self.state.publish_ack("shutdown").await;
                if let Err(e) = self.host.shutdown().await {
                    warn!("failed to shut down: {}", e);
                }
            }
        }
    }

    async fn republish_audio(&self) {
        sleep(self.settle).await;
        self.state.publish_volume().await;
        self.state.publish_mute().await;
    }
}
