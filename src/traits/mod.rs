//! Trait abstractions for dependency injection and testability.
//!
//! # Traits
//!
//! - [`HttpClient`] - HTTP requests against the marketplace API
//! - [`CredentialStore`] - Per-role credential storage
//! - [`BrokerConnector`] / [`BrokerSocket`] - STOMP broker connections

pub mod credentials;
pub mod http;
pub mod websocket;

pub use credentials::{CredentialStore, CredentialsError};
pub use http::{Headers, HttpClient, HttpError, HttpMethod, Response};
pub use websocket::{BrokerConnector, BrokerSocket, WsError};
