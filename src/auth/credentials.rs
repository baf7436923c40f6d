//! Credential model and on-disk slot management.
//!
//! Each role's credential lives in its own file,
//! `~/.market-session/credentials/<role>.json` by default.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use super::Role;
use crate::traits::CredentialsError;

/// The credentials directory, relative to the home directory.
const CREDENTIALS_DIR: &str = ".market-session/credentials";

/// An opaque session credential for one role.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Credential {
    pub role: Role,
    /// Bearer token sent on every request.
    pub access_token: String,
    /// Token exchanged for a new access token. Login may not return one.
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// When the credential was issued or last refreshed.
    pub issued_at: DateTime<Utc>,
}

impl Credential {
    /// Create a credential issued now.
    pub fn new(
        role: Role,
        access_token: impl Into<String>,
        refresh_token: Option<String>,
    ) -> Self {
        Self {
            role,
            access_token: access_token.into(),
            refresh_token,
            issued_at: Utc::now(),
        }
    }

    /// The token to present to the refresh endpoint.
    pub fn refresh_bearer(&self) -> &str {
        self.refresh_token.as_deref().unwrap_or(&self.access_token)
    }

    /// Build the successor credential after a refresh. A missing refresh
    /// token keeps the current one.
    pub fn refreshed(&self, access_token: String, refresh_token: Option<String>) -> Self {
        Self {
            role: self.role,
            access_token,
            refresh_token: refresh_token.or_else(|| self.refresh_token.clone()),
            issued_at: Utc::now(),
        }
    }
}

/// Manages the per-role credential files in one directory.
#[derive(Debug, Clone)]
pub struct CredentialsManager {
    dir: PathBuf,
}

impl CredentialsManager {
    /// Create a manager rooted at `~/.market-session/credentials`.
    ///
    /// Returns `None` if the home directory cannot be determined.
    pub fn new() -> Option<Self> {
        let home = dirs::home_dir()?;
        Some(Self::with_dir(home.join(CREDENTIALS_DIR)))
    }

    /// Create a manager rooted at a custom directory.
    pub fn with_dir(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path to the slot file for a role.
    pub fn slot_path(&self, role: Role) -> PathBuf {
        self.dir.join(format!("{}.json", role))
    }

    /// Load the credential for a role.
    ///
    /// Missing, unreadable and corrupt slots all read as `None`. The latter
    /// two are logged.
    pub fn load(&self, role: Role) -> Option<Credential> {
        let path = self.slot_path(role);
        if !path.exists() {
            return None;
        }

        let file = match File::open(&path) {
            Ok(f) => f,
            Err(e) => {
                tracing::warn!(role = %role, path = %path.display(), "Unreadable credential slot: {}", e);
                return None;
            }
        };

        match serde_json::from_reader::<_, Credential>(BufReader::new(file)) {
            Ok(credential) if credential.role == role => Some(credential),
            Ok(credential) => {
                tracing::warn!(
                    role = %role,
                    stored_role = %credential.role,
                    "Credential slot holds another role's credential, ignoring"
                );
                None
            }
            Err(e) => {
                tracing::warn!(role = %role, path = %path.display(), "Corrupt credential slot: {}", e);
                None
            }
        }
    }

    /// Save a credential into its role's slot.
    ///
    /// Writes to a temporary sibling first and renames it over the slot so
    /// readers see either the old or the new credential.
    pub fn save(&self, credential: &Credential) -> Result<(), CredentialsError> {
        fs::create_dir_all(&self.dir).map_err(|e| CredentialsError::Io(e.to_string()))?;

        let path = self.slot_path(credential.role);
        let tmp_path = path.with_extension("json.tmp");

        let file = File::create(&tmp_path).map_err(|e| CredentialsError::SaveFailed(e.to_string()))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, credential)
            .map_err(|e| CredentialsError::Serialization(e.to_string()))?;
        writer
            .flush()
            .map_err(|e| CredentialsError::SaveFailed(e.to_string()))?;
        drop(writer);

        fs::rename(&tmp_path, &path).map_err(|e| {
            let _ = fs::remove_file(&tmp_path);
            CredentialsError::SaveFailed(e.to_string())
        })
    }

    /// Remove a role's slot. Succeeds if the slot does not exist.
    pub fn clear(&self, role: Role) -> Result<(), CredentialsError> {
        let path = self.slot_path(role);
        if !path.exists() {
            return Ok(());
        }
        fs::remove_file(&path).map_err(|e| CredentialsError::ClearFailed(e.to_string()))
    }
}
