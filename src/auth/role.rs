//! Tenant roles.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::SessionError;

/// One of the four tenant perspectives. Each role has its own credential
/// slot and its own refresh state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Customer,
    Shop,
    Vendor,
    Admin,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Customer, Role::Shop, Role::Vendor, Role::Admin];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Customer => "customer",
            Role::Shop => "shop",
            Role::Vendor => "vendor",
            Role::Admin => "admin",
        }
    }

    /// Path segment of the role's login endpoint (`/login/{segment}`).
    pub fn login_segment(&self) -> &'static str {
        match self {
            Role::Customer => "customer",
            Role::Shop => "vendor-shop",
            Role::Vendor => "vendor",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "customer" => Ok(Role::Customer),
            "shop" => Ok(Role::Shop),
            "vendor" => Ok(Role::Vendor),
            "admin" => Ok(Role::Admin),
            other => Err(SessionError::UnknownRole(other.to_string())),
        }
    }
}
