//! Host control interface
//!
//! Narrow seam over the OS utilities that read and mutate host state:
//! `osascript` for volume and mute, `pmset` for battery and sleep. Reads
//! are idempotent and writes are last-write-wins, so concurrent invocation
//! from a command handler and a scheduled tick is safe. Every call shells
//! out and blocks its caller for the duration of the process invocation.

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;
use tracing::info;

const OSASCRIPT: &str = "/usr/bin/osascript";
const PMSET: &str = "/usr/bin/pmset";
const SHUTDOWN: &str = "/sbin/shutdown";

/// Battery percent and power source from a single `pmset` read, so the two
/// values can never disagree about the same instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatteryStatus {
    pub percent: u8,
    pub on_ac_power: bool,
}

#[derive(Debug, Error)]
pub enum HostError {
    #[error("failed to launch {command}: {source}")]
    Launch {
        command: &'static str,
        source: std::io::Error,
    },
    #[error("{command} exited with {status}: {stderr}")]
    Failed {
        command: &'static str,
        status: std::process::ExitStatus,
        stderr: String,
    },
    #[error("could not parse {what} from {output:?}")]
    Parse {
        what: &'static str,
        output: String,
    },
}

#[async_trait]
pub trait HostControls: Send + Sync {
    async fn volume(&self) -> Result<u8, HostError>;
    async fn set_volume(&self, level: u8) -> Result<(), HostError>;
    async fn muted(&self) -> Result<bool, HostError>;
    async fn set_muted(&self, muted: bool) -> Result<(), HostError>;
    async fn battery(&self) -> Result<BatteryStatus, HostError>;
    async fn sleep(&self) -> Result<(), HostError>;
    async fn display_sleep(&self) -> Result<(), HostError>;
    async fn shutdown(&self) -> Result<(), HostError>;
}

/// The live implementation for macOS.
pub struct MacControls;

impl MacControls {
    async fn command_output(
        command: &'static str,
        args: &[&str],
    ) -> Result<String, HostError> {
        let output = Command::new(command)
            .args(args)
            .output()
            .await
            .map_err(|source| HostError::Launch { command, source })?;

        if !output.status.success() {
            return Err(HostError::Failed {
                command,
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout)
            .trim_end_matches('\n')
            .to_string())
    }

    async fn run(command: &'static str, args: &[&str]) -> Result<(), HostError> {
        Self::command_output(command, args).await.map(|_| ())
    }
}

#[async_trait]
impl HostControls for MacControls {
    async fn volume(&self) -> Result<u8, HostError> {
        let output =
            Self::command_output(OSASCRIPT, &["-e", "output volume of (get volume settings)"])
                .await?;
        parse_volume(&output)
    }

    async fn set_volume(&self, level: u8) -> Result<(), HostError> {
        Self::run(
            OSASCRIPT,
            &["-e", &format!("set volume output volume {level}")],
        )
        .await
    }

    async fn muted(&self) -> Result<bool, HostError> {
        let output =
            Self::command_output(OSASCRIPT, &["-e", "output muted of (get volume settings)"])
                .await?;
        parse_muted(&output)
    }

    async fn set_muted(&self, muted: bool) -> Result<(), HostError> {
        Self::run(
            OSASCRIPT,
            &["-e", &format!("set volume output muted {muted}")],
        )
        .await
    }

    async fn battery(&self) -> Result<BatteryStatus, HostError> {
        let output = Self::command_output(PMSET, &["-g", "batt"]).await?;
        parse_battery(&output)
    }

    async fn sleep(&self) -> Result<(), HostError> {
        info!("putting host to sleep");
        Self::run(PMSET, &["sleepnow"]).await
    }

    async fn display_sleep(&self) -> Result<(), HostError> {
        info!("putting display to sleep");
        Self::run(PMSET, &["displaysleepnow"]).await
    }

    async fn shutdown(&self) -> Result<(), HostError> {
        if nix::unistd::Uid::effective().is_root() {
            // root can always power the machine off
            info!("shutting down host (privileged)");
            Self::run(SHUTDOWN, &["-h", "now"]).await
        } else {
            // best effort: another logged-in user can block this
            info!("requesting host shutdown (unprivileged)");
            Self::run(OSASCRIPT, &["-e", "tell app \"System Events\" to shut down"]).await
        }
    }
}

fn parse_volume(output: &str) -> Result<u8, HostError> {
    output
        .trim()
        .parse::<u8>()
        .ok()
        .filter(|level| *level <= 100)
        .ok_or_else(|| HostError::Parse {
            what: "output volume",
            output: output.to_string(),
        })
}

fn parse_muted(output: &str) -> Result<bool, HostError> {
    match output.trim() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(HostError::Parse {
            what: "output muted",
            output: output.to_string(),
        }),
    }
}

/// Extract percent and power source from `pmset -g batt` output, e.g.
///
/// ```text
/// Now drawing from 'Battery Power'
///  -InternalBattery-0 (id=4653155)        100%; discharging; 20:00 remaining present: true
/// ```
fn parse_battery(output: &str) -> Result<BatteryStatus, HostError> {
    let percent = output
        .split_whitespace()
        .find_map(|token| token.strip_suffix("%;").or_else(|| token.strip_suffix('%')))
        .and_then(|digits| digits.parse::<u8>().ok())
        .filter(|percent| *percent <= 100)
        .ok_or_else(|| HostError::Parse {
            what: "battery percent",
            output: output.to_string(),
        })?;

    Ok(BatteryStatus {
        percent,
        on_ac_power: output.contains("AC Power"),
    })
}
