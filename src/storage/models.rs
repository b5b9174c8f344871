//! Core data models for Flow Guardian
//!
//! These are the records persisted under the storage root: full session
//! bodies, the compact session index, and the learnings collection.

use serde::{Deserialize, Serialize};

/// A Session is a snapshot of in-progress work, saved so it can be
/// restored later.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Storage key, `session_<YYYY-MM-DD>_<HH-MM-SS>`. Empty until the
    /// store assigns one.
    #[serde(default)]
    pub id: String,

    /// RFC 3339 creation time. Empty until the store assigns one.
    #[serde(default)]
    pub timestamp: String,

    /// What the developer was doing
    #[serde(default)]
    pub context: SessionContext,

    /// Repository state at save time
    #[serde(default)]
    pub git: GitSnapshot,

    /// How and why the session was saved
    #[serde(default)]
    pub metadata: SessionMetadata,

    /// Insights attached to this session
    #[serde(default)]
    pub learnings: Vec<LearningRef>,
}

impl Session {
    /// Projects this session onto its index entry.
    pub fn index_entry(&self) -> IndexEntry {
        IndexEntry {
            id: self.id.clone(),
            timestamp: self.timestamp.clone(),
            branch: self.git.branch.clone(),
            summary: self.context.summary.clone(),
        }
    }
}

/// The working context of a session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionContext {
    #[serde(default)]
    pub summary: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hypothesis: Option<String>,

    /// Files in play, in the order they were recorded
    #[serde(default)]
    pub files: Vec<String>,

    #[serde(default)]
    pub next_steps: Vec<String>,

    #[serde(default)]
    pub decisions: Vec<String>,
}

/// Git state captured alongside a session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GitSnapshot {
    /// Branch name, absent outside a repository
    #[serde(default)]
    pub branch: Option<String>,

    #[serde(default)]
    pub uncommitted_files: Vec<String>,

    /// `git log --oneline` lines, newest first
    #[serde(default)]
    pub recent_commits: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionMetadata {
    /// Free-form note supplied when saving
    #[serde(default)]
    pub message: Option<String>,

    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default)]
    pub trigger: Trigger,
}

/// What caused a session to be saved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trigger {
    /// Explicit `flow save`.
    #[default]
    Manual,
    /// Saved by an automatic checkpoint.
    Auto,
    /// Saved from a git hook.
    Hook,
}

impl std::fmt::Display for Trigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Trigger::Manual => write!(f, "manual"),
            Trigger::Auto => write!(f, "auto"),
            Trigger::Hook => write!(f, "hook"),
        }
    }
}

/// A learning attached to a session.
///
/// Older sessions store bare strings, newer ones structured records; both
/// forms read back losslessly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LearningRef {
    /// Text with tags
    Structured {
        #[serde(alias = "insight")]
        text: String,
        #[serde(default)]
        tags: Vec<String>,
    },
    /// Text only
    Plain(String),
}

impl LearningRef {
    /// The learning's text regardless of form.
    pub fn text(&self) -> &str {
        match self {
            LearningRef::Structured { text, .. } => text,
            LearningRef::Plain(text) => text,
        }
    }

    /// Renders the learning as a single Markdown list item.
    pub fn render(&self) -> String {
        match self {
            LearningRef::Structured { text, tags } if !tags.is_empty() => {
                format!("- {} [{}]", text, tags.join(", "))
            }
            LearningRef::Structured { text, .. } => format!("- {text}"),
            LearningRef::Plain(text) => format!("- {text}"),
        }
    }
}

/// A short reusable insight, optionally shared with a team.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Learning {
    /// `learning_<YYYY-MM-DD>_<HH-MM-SS>`. Empty until assigned.
    #[serde(default)]
    pub id: String,

    #[serde(alias = "insight")]
    pub text: String,

    /// Matched as a set; order carries no meaning
    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default)]
    pub team: bool,

    #[serde(default)]
    pub timestamp: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
}

impl Learning {
    /// Creates an unsaved learning.
    pub fn new(text: impl Into<String>, tags: Vec<String>, team: bool) -> Self {
        Self {
            text: text.into(),
            tags,
            team,
            ..Self::default()
        }
    }
}

/// One row of `sessions/index.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub id: String,
    pub timestamp: String,
    #[serde(default)]
    pub branch: Option<String>,
    #[serde(default)]
    pub summary: String,
}

/// Counts reported by `flow status`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    pub sessions_count: usize,
    pub personal_learnings: usize,
    pub team_learnings: usize,
    pub total_learnings: usize,
}

/// Field-level patch for [`Session`].
///
/// Each `Some` replaces the stored value wholesale; each `None` leaves it
/// untouched, so lists that are not mentioned survive an update verbatim.
#[derive(Debug, Clone, Default)]
pub struct SessionPatch {
    pub summary: Option<String>,
    pub hypothesis: Option<Option<String>>,
    pub files: Option<Vec<String>>,
    pub next_steps: Option<Vec<String>>,
    pub decisions: Option<Vec<String>>,
    pub git: Option<GitSnapshot>,
    pub message: Option<Option<String>>,
    pub tags: Option<Vec<String>>,
    pub learnings: Option<Vec<LearningRef>>,
}

impl SessionPatch {
    /// Applies this patch to `session` in place.
    pub fn apply(self, session: &mut Session) {
        if let Some(summary) = self.summary {
            session.context.summary = summary;
        }
        if let Some(hypothesis) = self.hypothesis {
            session.context.hypothesis = hypothesis;
        }
        if let Some(files) = self.files {
            session.context.files = files;
        }
        if let Some(next_steps) = self.next_steps {
            session.context.next_steps = next_steps;
        }
        if let Some(decisions) = self.decisions {
            session.context.decisions = decisions;
        }
        if let Some(git) = self.git {
            session.git = git;
        }
        if let Some(message) = self.message {
            session.metadata.message = message;
        }
        if let Some(tags) = self.tags {
            session.metadata.tags = tags;
        }
        if let Some(learnings) = self.learnings {
            session.learnings = learnings;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_learning_ref_reads_both_forms() {
        let json = r#"[{"text": "Learning 1", "tags": ["tag1"]}, "Learning 2 (plain string)"]"#;
        let refs: Vec<LearningRef> = serde_json::from_str(json).unwrap();

        assert_eq!(
            refs[0],
            LearningRef::Structured {
                text: "Learning 1".to_string(),
                tags: vec!["tag1".to_string()],
            }
        );
        assert_eq!(refs[1], LearningRef::Plain("Learning 2 (plain string)".to_string()));
    }

    #[test]
    fn test_learning_ref_render() {
        let structured = LearningRef::Structured {
            text: "JWT expiry is 15m".to_string(),
            tags: vec!["auth".to_string(), "jwt".to_string()],
        };
        assert_eq!(structured.render(), "- JWT expiry is 15m [auth, jwt]");

        let plain = LearningRef::Plain("Use the pool".to_string());
        assert_eq!(plain.render(), "- Use the pool");
    }

    #[test]
    fn test_learning_accepts_insight_key() {
        let learning: Learning =
            serde_json::from_str(r#"{"insight": "Use refresh tokens", "tags": ["auth"]}"#).unwrap();
        assert_eq!(learning.text, "Use refresh tokens");
        assert!(!learning.team);
    }

    #[test]
    fn test_trigger_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Trigger::Manual).unwrap(), "\"manual\"");
        assert_eq!(Trigger::Hook.to_string(), "hook");
    }

    #[test]
    fn test_minimal_session_parses_with_defaults() {
        let session: Session =
            serde_json::from_str(r#"{"context": {"summary": "Working"}}"#).unwrap();
        assert!(session.id.is_empty());
        assert!(session.git.branch.is_none());
        assert_eq!(session.metadata.trigger, Trigger::Manual);
    }

    #[test]
    fn test_patch_retains_unmentioned_lists() {
        let mut session = Session::default();
        session.context.files = vec!["a.rs".to_string(), "b.rs".to_string()];
        session.context.next_steps = vec!["ship".to_string()];

        SessionPatch {
            summary: Some("blocked".to_string()),
            ..SessionPatch::default()
        }
        .apply(&mut session);

        assert_eq!(session.context.summary, "blocked");
        assert_eq!(session.context.files, vec!["a.rs", "b.rs"]);
        assert_eq!(session.context.next_steps, vec!["ship"]);
    }
}
