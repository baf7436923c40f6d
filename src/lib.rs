//! market-session - authenticated session layer for the marketplace consoles
//!
//! - Per-role credentials with transparent, single-flight refresh on 401
//! - At most one retry per logical request, idempotency keys for checkout
//! - Auto-reconnecting STOMP subscription for live shop order alerts

pub mod adapters;
pub mod auth;
pub mod client;
pub mod config;
pub mod endpoints;
pub mod error;
pub mod logging;
pub mod notifications;
pub mod request;
pub mod traits;

pub use auth::{Credential, RefreshOutcome, RefreshState, Role, SignOut};
pub use client::SessionClient;
pub use config::SessionConfig;
pub use error::{SessionError, SessionResult};
pub use notifications::{ConnectionState, NotificationChannel, ShopNotifications};
pub use request::{CheckoutIntent, Execution, RequestDescriptor, ResultEnvelope};
