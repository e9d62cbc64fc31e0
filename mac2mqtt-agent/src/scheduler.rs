//! Periodic state publishing
//!
//! Two independent tickers drive the state publisher: audio every 2
//! seconds so volume changes feel responsive in automation UIs, battery
//! every 60 seconds since it moves slowly. No ordering is guaranteed
//! between the two. Ticks are skipped while the link is down; the retained
//! discovery configs plus the first post-reconnect ticks catch observers
//! up.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::interval;
use tracing::debug;

use crate::session::LinkState;
use crate::state::StatePublisher;

pub const AUDIO_INTERVAL: Duration = Duration::from_secs(2);
pub const BATTERY_INTERVAL: Duration = Duration::from_secs(60);

pub async fn run(publisher: Arc<StatePublisher>, link: watch::Receiver<LinkState>) {
    let mut audio = interval(AUDIO_INTERVAL);
    let mut battery = interval(BATTERY_INTERVAL);

    loop {
        tokio::select! {
            _ = audio.tick() => {
                if *link.borrow() != LinkState::Connected {
                    debug!("link down, skipping audio state publish");
                    continue;
                }
                publisher.publish_volume().await;
                publisher.publish_mute().await;
            }
            _ = battery.tick() => {
                if *link.borrow() != LinkState::Connected {
                    debug!("link down, skipping battery state publish");
                    continue;
                }
                publisher.publish_battery().await;
            }
        }
    }
}
