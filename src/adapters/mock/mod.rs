//! Test doubles for the trait seams.
//!
//! - [`MockHttpClient`] - canned responses, request recording
//! - [`InMemoryCredentialStore`] - credential slots in memory, injectable failures
//! - [`MockBroker`] - scripted STOMP broker

pub mod credentials;
pub mod http;
pub mod websocket;

pub use credentials::InMemoryCredentialStore;
pub use http::{MockHttpClient, MockResponse, RecordedRequest};
pub use websocket::{BrokerEvent, MockBroker, MockBrokerSocket};
