//! Team sharing.
//!
//! Sessions and learnings can be pushed to a remote message thread so a
//! team sees them. The remote side is reached through the [`TeamStore`]
//! trait; [`BackboardClient`] talks to the Backboard API and
//! [`DisabledTeamStore`] stands in when no API key is configured.
//!
//! # Submodules
//!
//! - `client` - HTTP client for the Backboard API

pub mod client;

use serde::Serialize;
use serde_json::{json, Value};

use crate::config::BackboardSettings;
use crate::storage::{Learning, Session};

pub use client::BackboardClient;

/// Default Backboard API base URL.
pub const DEFAULT_BACKBOARD_URL: &str = "https://app.backboard.io/api";

/// Errors from the team store.
#[derive(Debug, thiserror::Error)]
pub enum TeamError {
    /// No API key or thread id is configured.
    #[error("Team sharing not configured. Set backboard.api_key and a thread id with 'flow config set'.")]
    NotConfigured,

    /// HTTP request error.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The configured base URL cannot carry a thread path.
    #[error("Invalid Backboard URL '{0}'")]
    InvalidUrl(String),

    /// The server returned an error response.
    #[error("Server error ({status}): {message}")]
    ServerError { status: u16, message: String },
}

/// One message posted to a thread.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamMessage {
    pub content: String,
    pub metadata: Value,
}

/// A remote thread-based store.
pub trait TeamStore {
    /// Appends a message to `thread_id`.
    fn store(&self, thread_id: &str, message: &TeamMessage) -> Result<(), TeamError>;

    /// Whether messages actually leave the machine.
    fn is_enabled(&self) -> bool {
        true
    }
}

/// Team store used when sharing is not configured. Every call is a no-op.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledTeamStore;

impl TeamStore for DisabledTeamStore {
    fn store(&self, thread_id: &str, _message: &TeamMessage) -> Result<(), TeamError> {
        tracing::debug!("Team sharing disabled, not sending to thread {thread_id}");
        Ok(())
    }

    fn is_enabled(&self) -> bool {
        false
    }
}

/// Builds the team store for this process.
pub fn team_store_from_settings(settings: &BackboardSettings) -> Box<dyn TeamStore> {
    let Some(api_key) = settings.api_key.as_deref().filter(|_| settings.is_configured()) else {
        return Box::new(DisabledTeamStore);
    };

    match BackboardClient::with_url(&settings.base_url) {
        Ok(client) => Box::new(client.with_api_key(api_key)),
        Err(e) => {
            tracing::warn!("Could not set up team sharing: {e}");
            Box::new(DisabledTeamStore)
        }
    }
}

/// Builds the message for a saved session.
///
/// Every file and next step is listed.
pub fn session_payload(session: &Session) -> TeamMessage {
    let context = &session.context;
    let mut lines = vec![format!("Session: {}", context.summary)];

    if let Some(ref hypothesis) = context.hypothesis {
        lines.push(format!("Hypothesis: {hypothesis}"));
    }
    if let Some(ref branch) = session.git.branch {
        lines.push(format!("Branch: {branch}"));
    }
    if !context.files.is_empty() {
        lines.push("Files:".to_string());
        lines.extend(context.files.iter().map(|f| format!("- {f}")));
    }
    if !context.next_steps.is_empty() {
        lines.push("Next steps:".to_string());
        lines.extend(context.next_steps.iter().map(|s| format!("- {s}")));
    }
    if !context.decisions.is_empty() {
        lines.push("Decisions:".to_string());
        lines.extend(context.decisions.iter().map(|d| format!("- {d}")));
    }

    TeamMessage {
        content: lines.join("\n"),
        metadata: json!({
            "type": "session",
            "session_id": session.id,
            "timestamp": session.timestamp,
            "branch": session.git.branch,
            "tags": session.metadata.tags,
            "trigger": session.metadata.trigger,
            "machine": machine_name(),
        }),
    }
}

/// Builds the message for a learning.
pub fn learning_payload(learning: &Learning) -> TeamMessage {
    let content = if learning.tags.is_empty() {
        format!("Learning: {}", learning.text)
    } else {
        format!("Learning: {} [{}]", learning.text, learning.tags.join(", "))
    };

    TeamMessage {
        content,
        metadata: json!({
            "type": "learning",
            "learning_id": learning.id,
            "timestamp": learning.timestamp,
            "tags": learning.tags,
            "team": learning.team,
            "author": learning.author,
            "machine": machine_name(),
        }),
    }
}

fn machine_name() -> Option<String> {
    hostname::get()
        .ok()
        .map(|h| h.to_string_lossy().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{GitSnapshot, SessionContext};

    #[test]
    fn test_session_payload_lists_every_file_and_step() {
        let files: Vec<String> = (0..30).map(|i| format!("src/module_{i}.rs")).collect();
        let steps: Vec<String> = (0..12).map(|i| format!("Step {i}")).collect();
        let session = Session {
            id: "session_2024-01-01_12-00-00".to_string(),
            context: SessionContext {
                summary: "Refactoring modules".to_string(),
                hypothesis: Some("Smaller modules compile faster".to_string()),
                files: files.clone(),
                next_steps: steps.clone(),
                decisions: Vec::new(),
            },
            git: GitSnapshot {
                branch: Some("refactor".to_string()),
                ..GitSnapshot::default()
            },
            ..Session::default()
        };

        let payload = session_payload(&session);

        assert!(payload.content.starts_with("Session: Refactoring modules"));
        for file in &files {
            assert!(payload.content.contains(file), "missing {file}");
        }
        for step in &steps {
            assert!(payload.content.contains(step), "missing {step}");
        }
        assert!(!payload.content.contains("..."));
        assert_eq!(payload.metadata["type"], "session");
        assert_eq!(payload.metadata["session_id"], "session_2024-01-01_12-00-00");
        assert_eq!(payload.metadata["branch"], "refactor");
        assert_eq!(payload.metadata["trigger"], "manual");
    }

    #[test]
    fn test_learning_payload() {
        let mut learning = Learning::new(
            "Token refresh needs a mutex",
            vec!["auth".to_string()],
            true,
        );
        learning.author = Some("Dana".to_string());

        let payload = learning_payload(&learning);

        assert_eq!(payload.content, "Learning: Token refresh needs a mutex [auth]");
        assert_eq!(payload.metadata["type"], "learning");
        assert_eq!(payload.metadata["team"], true);
        assert_eq!(payload.metadata["author"], "Dana");
    }

    #[test]
    fn test_disabled_store_is_noop() {
        let store = DisabledTeamStore;
        let message = TeamMessage {
            content: "x".to_string(),
            metadata: Value::Null,
        };

        assert!(store.store("thread", &message).is_ok());
        assert!(!store.is_enabled());
    }

    #[test]
    fn test_store_from_unconfigured_settings_is_disabled() {
        let settings = BackboardSettings::default();
        assert!(!team_store_from_settings(&settings).is_enabled());

        let configured = BackboardSettings {
            api_key: Some("bb-key".to_string()),
            ..BackboardSettings::default()
        };
        assert!(team_store_from_settings(&configured).is_enabled());
    }

    #[test]
    fn test_team_error_display() {
        let err = TeamError::ServerError {
            status: 401,
            message: "bad key".to_string(),
        };
        assert!(err.to_string().contains("401"));
        assert!(TeamError::NotConfigured.to_string().contains("not configured"));
    }
}
