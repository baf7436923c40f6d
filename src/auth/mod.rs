//! Authentication for the four marketplace roles.
//!
//! - Per-role credential slots on disk
//! - Auth endpoint client (login, refresh, validity check)
//! - Single-flight refresh coordination

pub mod api;
pub mod credentials;
pub mod refresh;
pub mod role;

pub use api::{AuthApi, AuthApiError, TokenResponse, DEFAULT_AUTH_BASE_URL};
pub use credentials::{Credential, CredentialsManager};
pub use refresh::{RefreshCoordinator, RefreshOutcome, RefreshState, SignOut};
pub use role::Role;
