//! In-process STOMP broker for testing.
//!
//! Speaks just enough STOMP to drive the notification channel: answers
//! CONNECT, records subscriptions and publishes MESSAGE frames to them.
//! Connections can be dropped or refused on demand.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;

use crate::notifications::stomp::{self, Command, Frame, HeartBeat, Incoming};
use crate::traits::{BrokerConnector, BrokerSocket, WsError};

/// Something that happened on the broker, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrokerEvent {
    /// A CONNECT frame arrived on connection `conn`.
    Connected { conn: usize },
    /// A SUBSCRIBE frame arrived.
    Subscribed { conn: usize, destination: String },
    /// A DISCONNECT frame arrived.
    Disconnected { conn: usize },
    /// The client closed the socket.
    Closed { conn: usize },
    /// The broker dropped the connection.
    Dropped { conn: usize },
}

#[derive(Debug)]
struct Connection {
    id: usize,
    tx: Option<mpsc::UnboundedSender<String>>,
    subscriptions: Vec<(String, String)>,
}

#[derive(Debug, Default)]
struct BrokerState {
    connections: Mutex<Vec<Connection>>,
    events: Mutex<Vec<BrokerEvent>>,
    frames: Mutex<Vec<Frame>>,
    heart_beat: Mutex<HeartBeat>,
    fail_next: AtomicUsize,
    silent: AtomicBool,
    next_id: AtomicUsize,
    message_seq: AtomicUsize,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl BrokerState {
    fn record(&self, event: BrokerEvent) {
        lock(&self.events).push(event);
    }

    fn reply(&self, conn: usize, frame: &Frame) {
        let connections = lock(&self.connections);
        if let Some(tx) = connections
            .iter()
            .find(|c| c.id == conn)
            .and_then(|c| c.tx.as_ref())
        {
            let _ = tx.send(frame.encode());
        }
    }

    fn handle_frame(&self, conn: usize, frame: Frame) {
        match frame.command {
            Command::Connect | Command::Stomp => {
                self.record(BrokerEvent::Connected { conn });
                if !self.silent.load(Ordering::SeqCst) {
                    let heart_beat = *lock(&self.heart_beat);
                    let connected = Frame::new(Command::Connected)
                        .header("version", "1.2")
                        .header("heart-beat", heart_beat.to_string());
                    self.reply(conn, &connected);
                }
            }
            Command::Subscribe => {
                let id = frame.get("id").unwrap_or_default().to_string();
                let destination = frame.get("destination").unwrap_or_default().to_string();
                if let Some(c) = lock(&self.connections).iter_mut().find(|c| c.id == conn) {
                    c.subscriptions.push((id, destination.clone()));
                }
                self.record(BrokerEvent::Subscribed { conn, destination });
            }
            Command::Disconnect => {
                self.record(BrokerEvent::Disconnected { conn });
                if let Some(receipt) = frame.get("receipt") {
                    let reply = Frame::new(Command::Receipt).header("receipt-id", receipt);
                    self.reply(conn, &reply);
                }
            }
            _ => {}
        }
        lock(&self.frames).push(frame);
    }

    fn close(&self, conn: usize) -> bool {
        let mut connections = lock(&self.connections);
        match connections.iter_mut().find(|c| c.id == conn) {
            Some(c) if c.tx.is_some() => {
                c.tx = None;
                c.subscriptions.clear();
                true
            }
            _ => false,
        }
    }
}

/// In-process STOMP broker and connector.
///
/// # Example
///
/// ```ignore
/// use market_session::adapters::mock::MockBroker;
///
/// let broker = MockBroker::new();
/// let channel = NotificationChannel::open(config, "shop/42/orders", Arc::new(broker.clone()));
///
/// // ... once the channel is open
/// broker.publish("/topic/shop/42/orders", "{}");
/// broker.drop_connections();
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockBroker {
    state: Arc<BrokerState>,
}

impl MockBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Heart-beat header the broker answers CONNECT with. Defaults to `0,0`.
    pub fn set_heart_beat(&self, heart_beat: HeartBeat) {
        *lock(&self.state.heart_beat) = heart_beat;
    }

    /// Refuse the next `count` connection attempts.
    pub fn fail_next_connects(&self, count: usize) {
        self.state.fail_next.store(count, Ordering::SeqCst);
    }

    /// Stop answering CONNECT frames.
    pub fn set_silent(&self, silent: bool) {
        self.state.silent.store(silent, Ordering::SeqCst);
    }

    /// Send a MESSAGE to every live subscription on `destination`.
    ///
    /// # Returns
    /// The number of subscriptions the message was delivered to.
    pub fn publish(&self, destination: &str, body: &str) -> usize {
        let connections = lock(&self.state.connections);
        let mut delivered = 0;
        for conn in connections.iter() {
            let Some(tx) = conn.tx.as_ref() else { continue };
            for (id, dest) in &conn.subscriptions {
                if dest != destination {
                    continue;
                }
                let seq = self.state.message_seq.fetch_add(1, Ordering::SeqCst);
                let frame = Frame::new(Command::Message)
                    .header("subscription", id.as_str())
                    .header("message-id", seq.to_string())
                    .header("destination", destination)
                    .with_body(body);
                if tx.send(frame.encode()).is_ok() {
                    delivered += 1;
                }
            }
        }
        delivered
    }

    /// Send a raw text message to every live connection.
    pub fn send_raw(&self, text: &str) {
        for conn in lock(&self.state.connections).iter() {
            if let Some(tx) = conn.tx.as_ref() {
                let _ = tx.send(text.to_string());
            }
        }
    }

    /// Send an ERROR frame to every live connection.
    pub fn send_error(&self, message: &str) {
        self.send_raw(&Frame::new(Command::Error).header("message", message).encode());
    }

    /// Drop every live connection from the broker side.
    pub fn drop_connections(&self) {
        let ids: Vec<usize> = lock(&self.state.connections)
            .iter()
            .filter(|c| c.tx.is_some())
            .map(|c| c.id)
            .collect();
        for id in ids {
            if self.state.close(id) {
                self.state.record(BrokerEvent::Dropped { conn: id });
            }
        }
    }

    /// Number of connections accepted so far.
    pub fn connect_count(&self) -> usize {
        self.state.next_id.load(Ordering::SeqCst)
    }

    /// Number of connections currently open.
    pub fn live_connections(&self) -> usize {
        lock(&self.state.connections)
            .iter()
            .filter(|c| c.tx.is_some())
            .count()
    }

    pub fn events(&self) -> Vec<BrokerEvent> {
        lock(&self.state.events).clone()
    }

    /// Frames received from clients, in arrival order.
    pub fn received_frames(&self) -> Vec<Frame> {
        lock(&self.state.frames).clone()
    }

    /// Destinations of every SUBSCRIBE received, in order.
    pub fn subscriptions(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                BrokerEvent::Subscribed { destination, .. } => Some(destination),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl BrokerConnector for MockBroker {
    async fn connect(&self, _url: &str) -> Result<Box<dyn BrokerSocket>, WsError> {
        let refused = self
            .state
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if refused {
            return Err(WsError::ConnectionFailed("Mock broker refused".to_string()));
        }

        let id = self.state.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = mpsc::unbounded_channel();
        lock(&self.state.connections).push(Connection {
            id,
            tx: Some(tx),
            subscriptions: Vec::new(),
        });

        Ok(Box::new(MockBrokerSocket {
            id,
            state: Arc::clone(&self.state),
            inbound: rx,
        }))
    }
}

/// Client end of a [`MockBroker`] connection.
pub struct MockBrokerSocket {
    id: usize,
    state: Arc<BrokerState>,
    inbound: mpsc::UnboundedReceiver<String>,
}

#[async_trait]
impl BrokerSocket for MockBrokerSocket {
    async fn send_text(&mut self, text: String) -> Result<(), WsError> {
        let live = lock(&self.state.connections)
            .iter()
            .any(|c| c.id == self.id && c.tx.is_some());
        if !live {
            return Err(WsError::Disconnected);
        }

        let items = stomp::decode(&text).map_err(|e| WsError::ParseError(e.to_string()))?;
        for item in items {
            if let Incoming::Frame(frame) = item {
                self.state.handle_frame(self.id, frame);
            }
        }
        Ok(())
    }

    async fn next_text(&mut self) -> Option<Result<String, WsError>> {
        self.inbound.recv().await.map(Ok)
    }

    async fn close(&mut self) -> Result<(), WsError> {
        if self.state.close(self.id) {
            self.state.record(BrokerEvent::Closed { conn: self.id });
        }
        self.inbound.close();
        Ok(())
    }
}
