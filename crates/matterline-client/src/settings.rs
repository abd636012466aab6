//! Persisted login settings.
//!
//! The only state that survives a restart: the server domain, the username
//! and the last session token, stored as JSON in the platform config
//! directory. A missing or corrupt file loads as defaults; entity state is
//! never persisted.

use std::fs;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ClientError, Result};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoginSettings {
    pub domain: String,
    pub username: String,
    pub token: String,
}

impl LoginSettings {
    /// True when a silent re-login can be attempted without prompting.
    pub fn is_complete(&self) -> bool {
        !self.domain.is_empty() && !self.username.is_empty() && !self.token.is_empty()
    }

    fn default_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("org", "matterline", "matterline")
            .ok_or(ClientError::NoConfigDir)?;
        Ok(dirs.config_dir().join("login.json"))
    }

    pub fn load() -> Self {
        match Self::default_path() {
            Ok(path) => Self::load_from(&path),
            Err(_) => Self::default(),
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::default_path()?)
    }

    pub fn load_from(path: &Path) -> Self {
        let Ok(raw) = fs::read_to_string(path) else {
            return Self::default();
        };
        match serde_json::from_str(&raw) {
            Ok(settings) => settings,
            Err(error) => {
                warn!(%error, path = %path.display(), "corrupt login settings, using defaults");
                Self::default()
            }
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}
