//! Broker socket trait abstraction.
//!
//! The notification channel speaks STOMP over text messages. These traits
//! hide the WebSocket library so the channel can run against
//! [`MockBroker`](crate::adapters::mock::MockBroker) in tests.

use async_trait::async_trait;

/// WebSocket connection errors.
#[derive(Debug, Clone)]
pub enum WsError {
    /// Connection failed
    ConnectionFailed(String),
    /// Disconnected from server
    Disconnected,
    /// Failed to send message
    SendFailed(String),
    /// Failed to parse message
    ParseError(String),
    /// Connection timeout
    Timeout(String),
    /// Other error
    Other(String),
}

impl std::fmt::Display for WsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WsError::ConnectionFailed(msg) => write!(f, "Connection failed: {}", msg),
            WsError::Disconnected => write!(f, "Disconnected from server"),
            WsError::SendFailed(msg) => write!(f, "Send failed: {}", msg),
            WsError::ParseError(msg) => write!(f, "Parse error: {}", msg),
            WsError::Timeout(msg) => write!(f, "Connection timeout: {}", msg),
            WsError::Other(msg) => write!(f, "WebSocket error: {}", msg),
        }
    }
}

impl std::error::Error for WsError {}

/// One open connection to the broker.
#[async_trait]
pub trait BrokerSocket: Send {
    /// Send one text message.
    async fn send_text(&mut self, text: String) -> Result<(), WsError>;

    /// Receive the next text message.
    ///
    /// # Returns
    /// - `Some(Ok(text))` for a text message
    /// - `Some(Err(error))` if the socket failed
    /// - `None` once the peer closed the connection
    async fn next_text(&mut self) -> Option<Result<String, WsError>>;

    /// Close the connection. Errors are ignored by callers.
    async fn close(&mut self) -> Result<(), WsError>;
}

/// Opens broker connections.
///
/// # Example
///
/// ```ignore
/// use market_session::traits::BrokerConnector;
///
/// async fn ping<C: BrokerConnector>(connector: &C) -> Result<(), WsError> {
///     let mut socket = connector.connect("ws://localhost:8080/ws").await?;
///     socket.send_text("\n".to_string()).await?;
///     socket.close().await
/// }
/// ```
#[async_trait]
pub trait BrokerConnector: Send + Sync {
    /// Open a new connection to `url`.
    async fn connect(&self, url: &str) -> Result<Box<dyn BrokerSocket>, WsError>;
}
