//! Auto-reconnecting STOMP subscription to one topic.
//!
//! The channel owns a background task with a single state machine:
//!
//! ```text
//! Disconnected -> Connecting -> Open
//!      ^              |           |
//!      +-- delay -----+-----------+   (refused, lost, ERROR, heart-beat timeout)
//!
//! any state -> Closed                  (teardown or drop)
//! ```
//!
//! Losses are logged and retried after the reconnect delay, forever. They are
//! never surfaced as errors.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval};

use super::stomp::{self, Command, Frame, HeartBeat, HeartBeatTiming, Incoming};
use crate::traits::{BrokerConnector, BrokerSocket, WsError};

/// Default broker WebSocket URL.
pub const DEFAULT_BROKER_URL: &str = "ws://localhost:8080/ws";
/// Default delay before reconnecting after a loss.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_millis(5000);
/// Default heart-beat offer in both directions.
pub const DEFAULT_HEARTBEAT_MS: u64 = 4000;
/// Default time allowed between opening the socket and CONNECTED.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// Default prefix put in front of the topic to form the destination.
pub const DEFAULT_DESTINATION_PREFIX: &str = "/topic/";

const SUBSCRIPTION_ID: &str = "sub-0";
const NOTICE_CAPACITY: usize = 64;

/// Connection state of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Open,
    Closed,
}

/// Published for every MESSAGE received on the subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityNotice {
    pub topic: String,
}

/// Broker settings shared by every channel.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    pub broker_url: String,
    /// Value of the CONNECT `host` header.
    pub host: String,
    pub destination_prefix: String,
    pub heart_beat: HeartBeat,
    pub reconnect_delay: Duration,
    pub connect_timeout: Duration,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BROKER_URL)
    }
}

impl ChannelConfig {
    pub fn new(broker_url: impl Into<String>) -> Self {
        let broker_url = broker_url.into();
        Self {
            host: host_of(&broker_url),
            broker_url,
            destination_prefix: DEFAULT_DESTINATION_PREFIX.to_string(),
            heart_beat: HeartBeat::new(DEFAULT_HEARTBEAT_MS, DEFAULT_HEARTBEAT_MS),
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    pub fn with_heart_beat(mut self, heart_beat: HeartBeat) -> Self {
        self.heart_beat = heart_beat;
        self
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_destination_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.destination_prefix = prefix.into();
        self
    }

    /// Full destination for a topic.
    pub fn destination(&self, topic: &str) -> String {
        format!("{}{}", self.destination_prefix, topic)
    }
}

/// Host part of a WebSocket URL, used as the STOMP virtual host.
fn host_of(url: &str) -> String {
    let without_scheme = url.split_once("://").map(|(_, rest)| rest).unwrap_or(url);
    let authority = without_scheme.split('/').next().unwrap_or_default();
    let host = authority.rsplit_once('@').map(|(_, h)| h).unwrap_or(authority);
    let host = host.split(':').next().unwrap_or_default();
    if host.is_empty() {
        "localhost".to_string()
    } else {
        host.to_string()
    }
}

/// Handle to a running subscription.
///
/// Dropping the handle stops the background task; [`teardown`](Self::teardown)
/// also waits for it to finish.
pub struct NotificationChannel {
    topic: String,
    state_rx: watch::Receiver<ConnectionState>,
    activity_tx: Arc<watch::Sender<bool>>,
    activity_rx: watch::Receiver<bool>,
    notices: broadcast::Sender<ActivityNotice>,
    shutdown_tx: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl NotificationChannel {
    /// Start subscribing to `topic`. Must be called inside a tokio runtime.
    pub fn open(
        config: ChannelConfig,
        topic: impl Into<String>,
        connector: Arc<dyn BrokerConnector>,
    ) -> Self {
        let topic = topic.into();
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        let (activity_tx, activity_rx) = watch::channel(false);
        let activity_tx = Arc::new(activity_tx);
        let (notices, _) = broadcast::channel(NOTICE_CAPACITY);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let worker = ChannelWorker {
            destination: config.destination(&topic),
            config,
            topic: topic.clone(),
            connector,
            state_tx,
            activity_tx: Arc::clone(&activity_tx),
            notices: notices.clone(),
        };
        let task = tokio::spawn(worker.run(shutdown_rx));

        Self {
            topic,
            state_rx,
            activity_tx,
            activity_rx,
            notices,
            shutdown_tx,
            task: Some(task),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }

    /// Receiver that observes every state change.
    pub fn state_receiver(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    /// Whether a message arrived since the last [`acknowledge`](Self::acknowledge).
    pub fn has_activity(&self) -> bool {
        *self.activity_rx.borrow()
    }

    pub fn activity_receiver(&self) -> watch::Receiver<bool> {
        self.activity_rx.clone()
    }

    /// Reset the activity flag once the UI has shown it.
    pub fn acknowledge(&self) {
        self.activity_tx.send_replace(false);
    }

    /// Subscribe to per-message notices.
    pub fn notices(&self) -> broadcast::Receiver<ActivityNotice> {
        self.notices.subscribe()
    }

    /// Stop the subscription and wait for the background task to finish.
    ///
    /// Sends DISCONNECT if the channel is open and closes the socket.
    pub async fn teardown(mut self) {
        let _ = self.shutdown_tx.send(true);
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::warn!(topic = %self.topic, "Notification task ended abnormally: {}", e);
            }
        }
    }
}

impl Drop for NotificationChannel {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(true);
    }
}

impl std::fmt::Debug for NotificationChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationChannel")
            .field("topic", &self.topic)
            .field("state", &self.state())
            .finish()
    }
}

/// Why the pump loop returned.
enum PumpExit {
    Shutdown,
    Lost(String),
}

struct ChannelWorker {
    config: ChannelConfig,
    topic: String,
    destination: String,
    connector: Arc<dyn BrokerConnector>,
    state_tx: watch::Sender<ConnectionState>,
    activity_tx: Arc<watch::Sender<bool>>,
    notices: broadcast::Sender<ActivityNotice>,
}

impl ChannelWorker {
    fn set_state(&self, state: ConnectionState) {
        self.state_tx.send_replace(state);
    }

    async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut attempt: u32 = 0;

        loop {
            if *shutdown.borrow() {
                break;
            }

            attempt += 1;
            self.set_state(ConnectionState::Connecting);
            tracing::debug!(topic = %self.topic, attempt, "Connecting to broker");

            let established = tokio::select! {
                _ = shutdown.changed() => break,
                result = self.establish() => result,
            };

            match established {
                Ok((socket, timing)) => {
                    attempt = 0;
                    self.set_state(ConnectionState::Open);
                    tracing::info!(topic = %self.topic, destination = %self.destination, "Subscribed");

                    match self.pump(socket, timing, &mut shutdown).await {
                        PumpExit::Shutdown => break,
                        PumpExit::Lost(reason) => {
                            tracing::warn!(topic = %self.topic, "Broker connection lost: {}", reason);
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(topic = %self.topic, attempt, "Broker connection failed: {}", e);
                }
            }

            self.set_state(ConnectionState::Disconnected);
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = tokio::time::sleep(self.config.reconnect_delay) => {}
            }
        }

        self.set_state(ConnectionState::Closed);
        tracing::info!(topic = %self.topic, "Notification channel closed");
    }

    /// Open a socket and run the CONNECT / CONNECTED / SUBSCRIBE handshake.
    async fn establish(&self) -> Result<(Box<dyn BrokerSocket>, HeartBeatTiming), WsError> {
        let mut socket = self.connector.connect(&self.config.broker_url).await?;
        match self.handshake(socket.as_mut()).await {
            Ok(timing) => Ok((socket, timing)),
            Err(e) => {
                let _ = socket.close().await;
                Err(e)
            }
        }
    }

    async fn handshake(&self, socket: &mut dyn BrokerSocket) -> Result<HeartBeatTiming, WsError> {
        let client_beat = self.config.heart_beat;
        socket
            .send_text(Frame::connect(&self.config.host, client_beat).encode())
            .await?;

        let connected = tokio::time::timeout(self.config.connect_timeout, wait_connected(&mut *socket))
            .await
            .map_err(|_| {
                WsError::Timeout(format!(
                    "no CONNECTED within {:?}",
                    self.config.connect_timeout
                ))
            })??;

        let server_beat = match connected.get("heart-beat") {
            Some(value) => value
                .parse::<HeartBeat>()
                .map_err(|e| WsError::ParseError(e.to_string()))?,
            None => HeartBeat::disabled(),
        };
        let timing = stomp::negotiate(client_beat, server_beat);
        tracing::debug!(topic = %self.topic, ?timing, "STOMP session established");

        socket
            .send_text(Frame::subscribe(SUBSCRIPTION_ID, &self.destination).encode())
            .await?;
        Ok(timing)
    }

    async fn pump(
        &self,
        mut socket: Box<dyn BrokerSocket>,
        timing: HeartBeatTiming,
        shutdown: &mut watch::Receiver<bool>,
    ) -> PumpExit {
        let mut beat = timing
            .send_every
            .map(|every| tokio::time::interval_at(Instant::now() + every, every));
        let idle_limit = timing.expect_every.map(|every| every * 2);
        let mut last_seen = Instant::now();

        let exit = loop {
            let idle_deadline = idle_limit.map(|limit| last_seen + limit);

            tokio::select! {
                _ = shutdown.changed() => {
                    let _ = socket.send_text(Frame::disconnect(None).encode()).await;
                    break PumpExit::Shutdown;
                }
                incoming = socket.next_text() => match incoming {
                    Some(Ok(text)) => {
                        last_seen = Instant::now();
                        if let Some(reason) = self.handle_text(&text) {
                            break PumpExit::Lost(reason);
                        }
                    }
                    Some(Err(e)) => break PumpExit::Lost(e.to_string()),
                    None => break PumpExit::Lost("closed by broker".to_string()),
                },
                _ = next_beat(&mut beat) => {
                    if let Err(e) = socket.send_text("\n".to_string()).await {
                        break PumpExit::Lost(e.to_string());
                    }
                }
                _ = sleep_until(idle_deadline) => {
                    break PumpExit::Lost("heart-beat timeout".to_string());
                }
            }
        };

        let _ = socket.close().await;
        exit
    }

    /// Handle one text message. Returns a reason when the broker ended the
    /// session.
    fn handle_text(&self, text: &str) -> Option<String> {
        let items = match stomp::decode(text) {
            Ok(items) => items,
            Err(e) => {
                tracing::warn!(topic = %self.topic, "Ignoring malformed frame: {}", e);
                return None;
            }
        };

        for item in items {
            let Incoming::Frame(frame) = item else { continue };
            match frame.command {
                Command::Message => {
                    if frame.get("subscription").map_or(true, |id| id == SUBSCRIPTION_ID) {
                        tracing::debug!(topic = %self.topic, "Activity received");
                        self.activity_tx.send_replace(true);
                        let _ = self.notices.send(ActivityNotice {
                            topic: self.topic.clone(),
                        });
                    }
                }
                Command::Error => {
                    let message = frame.get("message").unwrap_or("ERROR frame").to_string();
                    return Some(format!("broker error: {}", message));
                }
                _ => {}
            }
        }
        None
    }
}

async fn wait_connected(socket: &mut dyn BrokerSocket) -> Result<Frame, WsError> {
    loop {
        let text = match socket.next_text().await {
            Some(result) => result?,
            None => return Err(WsError::Disconnected),
        };
        let items = stomp::decode(&text).map_err(|e| WsError::ParseError(e.to_string()))?;
        for item in items {
            match item {
                Incoming::Frame(frame) if frame.command == Command::Connected => {
                    return Ok(frame)
                }
                Incoming::Frame(frame) if frame.command == Command::Error => {
                    let message = frame.get("message").unwrap_or("ERROR frame").to_string();
                    return Err(WsError::ConnectionFailed(message));
                }
                _ => {}
            }
        }
    }
}

async fn next_beat(beat: &mut Option<Interval>) {
    match beat {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending::<()>().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_of() {
        assert_eq!(host_of("ws://localhost:8080/ws"), "localhost");
        assert_eq!(host_of("wss://broker.market.test/ws"), "broker.market.test");
        assert_eq!(host_of("ws://user@10.0.0.2:61614"), "10.0.0.2");
        assert_eq!(host_of(""), "localhost");
    }

    #[test]
    fn test_config_defaults() {
        let config = ChannelConfig::default();
        assert_eq!(config.broker_url, DEFAULT_BROKER_URL);
        assert_eq!(config.heart_beat, HeartBeat::new(4000, 4000));
        assert_eq!(config.reconnect_delay, Duration::from_millis(5000));
        assert_eq!(config.destination("shop/42/orders"), "/topic/shop/42/orders");
    }

    #[test]
    fn test_config_builders() {
        let config = ChannelConfig::new("ws://b/ws")
            .with_destination_prefix("/exchange/")
            .with_reconnect_delay(Duration::from_millis(10))
            .with_connect_timeout(Duration::from_millis(20))
            .with_heart_beat(HeartBeat::disabled());
        assert_eq!(config.destination("x"), "/exchange/x");
        assert_eq!(config.reconnect_delay, Duration::from_millis(10));
        assert_eq!(config.connect_timeout, Duration::from_millis(20));
        assert_eq!(config.heart_beat, HeartBeat::disabled());
    }
}
