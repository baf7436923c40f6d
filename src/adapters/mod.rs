//! Concrete implementations of the trait seams in `crate::traits`.
//!
//! - [`ReqwestHttpClient`] - HTTP over reqwest
//! - [`TungsteniteConnector`] - broker WebSocket over tokio-tungstenite
//! - [`FileCredentialStore`] - per-role JSON files
//!
//! The [`mock`] submodule provides test doubles for each seam.

pub mod file_credentials;
pub mod mock;
pub mod reqwest_http;
pub mod tungstenite_ws;

pub use file_credentials::FileCredentialStore;
pub use mock::{InMemoryCredentialStore, MockBroker, MockHttpClient};
pub use reqwest_http::ReqwestHttpClient;
pub use tungstenite_ws::{TungsteniteConnector, TungsteniteSocket};
