//! Configuration management
//!
//! `config.json` is stored as an open JSON document so that unknown keys
//! survive `flow config set`. This module gives the rest of the crate a
//! typed view over the sections it reads.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::git;
use crate::restore::DEFAULT_STALE_THRESHOLD_DAYS;
use crate::storage::Store;
use crate::team::DEFAULT_BACKBOARD_URL;

/// Environment variable that overrides the storage root.
pub const HOME_ENV: &str = "FLOW_GUARDIAN_HOME";

/// Resolves the storage root: `$FLOW_GUARDIAN_HOME`, else `~/.flow-guardian`.
pub fn storage_root() -> Result<PathBuf> {
    if let Some(root) = std::env::var_os(HOME_ENV).filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(root));
    }

    let home = dirs::home_dir().ok_or_else(|| anyhow::anyhow!("Could not find home directory"))?;
    Ok(home.join(".flow-guardian"))
}

/// Typed view of `config.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub user: UserSettings,
    pub backboard: BackboardSettings,
    pub settings: Settings,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserSettings {
    /// Recorded as the author of new learnings
    pub name: Option<String>,
}

/// Connection details for the team store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackboardSettings {
    pub api_key: Option<String>,
    pub base_url: String,
    pub personal_thread_id: Option<String>,
    pub team_thread_id: Option<String>,
}

impl Default for BackboardSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BACKBOARD_URL.to_string(),
            personal_thread_id: None,
            team_thread_id: None,
        }
    }
}

impl BackboardSettings {
    /// Whether an API key is set.
    pub fn is_configured(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }
}

/// Behavioural settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub stale_threshold_days: i64,
    pub git_timeout_ms: u64,
    pub ai_provider: Option<String>,
    pub ai_api_key: Option<String>,
    pub ai_model: Option<String>,
    /// Also send saved sessions to the personal thread
    pub share_with_team: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            stale_threshold_days: DEFAULT_STALE_THRESHOLD_DAYS,
            git_timeout_ms: git::DEFAULT_TIMEOUT.as_millis() as u64,
            ai_provider: None,
            ai_api_key: None,
            ai_model: None,
            share_with_team: false,
        }
    }
}

impl Settings {
    /// Timeout applied to each git subprocess.
    pub fn git_timeout(&self) -> Duration {
        Duration::from_millis(self.git_timeout_ms)
    }
}

impl Config {
    /// Reads the typed view from a raw config document.
    ///
    /// A document that does not match the expected shape is reported and
    /// replaced by defaults.
    pub fn from_value(value: &Value) -> Self {
        serde_json::from_value(value.clone()).unwrap_or_else(|e| {
            tracing::warn!("Ignoring malformed config.json: {e}");
            Self::default()
        })
    }

    /// Loads the configuration from `store`.
    pub fn load(store: &Store) -> Self {
        Self::from_value(&store.config())
    }

    /// Author recorded on new learnings.
    pub fn author(&self) -> Option<String> {
        self.user
            .name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(|n| n.to_string())
    }
}

/// Parses a `flow config set` value: JSON when it parses, else a string.
pub fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}
