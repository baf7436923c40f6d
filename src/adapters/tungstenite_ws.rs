//! Tungstenite-based broker connector.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::traits::{BrokerConnector, BrokerSocket, WsError};

/// Opens broker connections with tokio-tungstenite.
#[derive(Debug, Clone, Default)]
pub struct TungsteniteConnector;

impl TungsteniteConnector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl BrokerConnector for TungsteniteConnector {
    async fn connect(&self, url: &str) -> Result<Box<dyn BrokerSocket>, WsError> {
        let (stream, _response) = connect_async(url)
            .await
            .map_err(|e| WsError::ConnectionFailed(e.to_string()))?;
        tracing::debug!(url = %url, "WebSocket connected");
        Ok(Box::new(TungsteniteSocket { stream }))
    }
}

/// One tokio-tungstenite WebSocket connection.
pub struct TungsteniteSocket {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl BrokerSocket for TungsteniteSocket {
    async fn send_text(&mut self, text: String) -> Result<(), WsError> {
        self.stream
            .send(Message::Text(text))
            .await
            .map_err(|e| WsError::SendFailed(e.to_string()))
    }

    async fn next_text(&mut self) -> Option<Result<String, WsError>> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => return Some(Ok(text)),
                Some(Ok(Message::Binary(data))) => {
                    return Some(
                        String::from_utf8(data).map_err(|e| WsError::ParseError(e.to_string())),
                    )
                }
                Some(Ok(Message::Close(_))) => return None,
                // tungstenite answers pings itself
                Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => continue,
                Some(Ok(Message::Frame(_))) => continue,
                Some(Err(e)) => return Some(Err(WsError::Other(e.to_string()))),
                None => return None,
            }
        }
    }

    async fn close(&mut self) -> Result<(), WsError> {
        self.stream
            .close(None)
            .await
            .map_err(|e| WsError::Other(e.to_string()))
    }
}
