//! Connection lifecycle
//!
//! The session is created once at startup; the initial connect is fatal on
//! timeout or refusal, because a bridge that never reaches its broker is
//! misconfigured. After that the supervisor owns the event loop and never
//! gives up: a lost connection is retried forever at a fixed interval, and
//! every re-established session re-announces discovery and re-subscribes
//! before state publishing resumes.
//!
//! Lifecycle handling is an explicit state machine rather than registered
//! callbacks: [`step`] is a pure transition function from (state, event) to
//! (state, action), and the supervisor merely executes the actions.

use rumqttc::{
    AsyncClient, ConnAck, ConnectReturnCode, Event, EventLoop, Incoming, MqttOptions, Publish,
};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::commands::CommandRouter;
use crate::config::BridgeConfig;
use crate::discovery::DiscoveryPublisher;
use crate::identity::BridgeContext;
use crate::mqtt::MessageSink;

/// Bound on the initial connection handshake.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
/// Fixed pause between reconnection attempts.
pub const RETRY_INTERVAL: Duration = Duration::from_secs(5);
const KEEP_ALIVE: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("broker refused connection: {0:?}")]
    Refused(ConnectReturnCode),
    #[error("connection failed: {0}")]
    Connection(#[from] rumqttc::ConnectionError),
    #[error("timed out connecting to broker after {0:?}")]
    Timeout(Duration),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Connecting,
    Connected,
    Disconnected,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// Broker acknowledged the session (initial connect or auto-reconnect).
    SessionEstablished,
    /// Event loop reported a connection error.
    ConnectionLost(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkAction {
    /// Publish discovery configs and subscribe the command namespace.
    Announce,
    /// Wait the fixed retry interval before polling again.
    Backoff,
}

/// Pure lifecycle transition. Every established session announces exactly
/// once; every loss backs off, from any state.
pub fn step(state: LinkState, event: &LinkEvent) -> (LinkState, LinkAction) {
    match event {
        LinkEvent::SessionEstablished => {
            if state != LinkState::Connected {
                debug!("link {:?} -> Connected", state);
            }
            (LinkState::Connected, LinkAction::Announce)
        }
        LinkEvent::ConnectionLost(_) => (LinkState::Disconnected, LinkAction::Backoff),
    }
}

/// A freshly established broker session.
pub struct Session {
    client: AsyncClient,
    event_loop: EventLoop,
}

impl Session {
    /// Establish the one session this process will use. Fails fast: a
    /// timeout, a refused CONNACK or a transport error here means the
    /// process should exit with a diagnostic.
    pub async fn connect(config: &BridgeConfig, client_id: &str) -> Result<Self, SessionError> {
        let mut options = MqttOptions::new(client_id, config.mqtt_ip.clone(), config.mqtt_port);
        options.set_credentials(config.mqtt_user.clone(), config.mqtt_password.clone());
        options.set_keep_alive(KEEP_ALIVE);
        options.set_clean_session(true);

        let (client, mut event_loop) = AsyncClient::new(options, 10);

        let ack = tokio::time::timeout(CONNECT_TIMEOUT, Self::await_connack(&mut event_loop))
            .await
            .map_err(|_| SessionError::Timeout(CONNECT_TIMEOUT))??;
        if ack.code != ConnectReturnCode::Success {
            return Err(SessionError::Refused(ack.code));
        }

        Ok(Self { client, event_loop })
    }

    async fn await_connack(event_loop: &mut EventLoop) -> Result<ConnAck, SessionError> {
        loop {
            match event_loop.poll().await {
                Ok(Event::Incoming(Incoming::ConnAck(ack))) => return Ok(ack),
                Ok(_) => {}
                Err(e) => return Err(SessionError::Connection(e)),
            }
        }
    }

    /// Clone of the thread-safe client for publishing from other tasks.
    pub fn client(&self) -> AsyncClient {
        self.client.clone()
    }
}

/// Owns the event loop for the life of the process.
pub struct Supervisor {
    event_loop: EventLoop,
    sink: Arc<dyn MessageSink>,
    discovery: DiscoveryPublisher,
    router: Arc<CommandRouter>,
    ctx: Arc<BridgeContext>,
    state: LinkState,
    state_tx: watch::Sender<LinkState>,
}

impl Supervisor {
    pub fn new(
        session: Session,
        sink: Arc<dyn MessageSink>,
        discovery: DiscoveryPublisher,
        router: Arc<CommandRouter>,
        ctx: Arc<BridgeContext>,
    ) -> (Self, watch::Receiver<LinkState>) {
        let (state_tx, state_rx) = watch::channel(LinkState::Connecting);
        (
            Self {
                event_loop: session.event_loop,
                sink,
                discovery,
                router,
                ctx,
                state: LinkState::Connecting,
                state_tx,
            },
            state_rx,
        )
    }

    /// Drive the session forever. The CONNACK that established the session
    /// was consumed by [`Session::connect`], so the first announcement runs
    /// up front; later CONNACKs come from rumqttc's reconnect and trigger
    /// the same transition.
    pub async fn run(mut self) {
        self.transition(LinkEvent::SessionEstablished).await;

        loop {
            match self.event_loop.poll().await {
                Ok(Event::Incoming(Incoming::ConnAck(ack))) => {
                    if ack.code == ConnectReturnCode::Success {
                        info!("session re-established");
                        self.transition(LinkEvent::SessionEstablished).await;
                    } else {
                        warn!("broker refused session: {:?}", ack.code);
                    }
                }
                Ok(Event::Incoming(Incoming::Publish(publish))) => self.dispatch(publish),
                Ok(_) => {}
                Err(e) => {
                    self.transition(LinkEvent::ConnectionLost(e.to_string()))
                        .await;
                }
            }
        }
    }

    async fn transition(&mut self, event: LinkEvent) {
        if let LinkEvent::ConnectionLost(reason) = &event {
            if self.state == LinkState::Connected {
                warn!("connection lost: {}", reason);
            } else {
                debug!("reconnect attempt failed: {}", reason);
            }
        }

        let (next, action) = step(self.state, &event);
        self.state = next;

        match action {
            LinkAction::Announce => {
                // discovery and subscription complete before the link is
                // reported up, so ticks never race the announcement
                self.announce_and_subscribe().await;
                let _ = self.state_tx.send(self.state);
            }
            LinkAction::Backoff => {
                let _ = self.state_tx.send(self.state);
                debug!("retrying in {:?}", RETRY_INTERVAL);
                tokio::time::sleep(RETRY_INTERVAL).await;
            }
        }
    }

    async fn announce_and_subscribe(&self) {
        self.discovery.announce().await;

        let filter = self.ctx.topics.command_wildcard();
        match self.sink.subscribe(&filter).await {
            Ok(()) => info!("subscribed to {}", filter),
            Err(e) => warn!("failed to subscribe to {}: {}", filter, e),
        }
    }

    /// Hand a command to the router on its own task; the settle delay in
    /// the handler must not stall keep-alive traffic on the event loop.
    fn dispatch(&self, publish: Publish) {
        let Some(action) = self.ctx.topics.command_action(&publish.topic) else {
            debug!("ignoring message on {}", publish.topic);
            return;
        };
        let action = action.to_string();
        let router = Arc::clone(&self.router);
        tokio::spawn(async move {
            router.handle(&action, &publish.payload).await;
        });
    }
}
