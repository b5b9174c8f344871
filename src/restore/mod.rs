//! Context restoration.
//!
//! Given a saved session, works out how long the developer has been away,
//! whether the session is stale, what changed in the repository since,
//! and whether the live repository has drifted from the saved state. The
//! result is turned into a welcome-back message by the assistant, or by a
//! deterministic template when the assistant is unavailable.

pub mod render;

use std::time::Duration;

use chrono::{DateTime, Local, NaiveDateTime, TimeZone};
use serde::{Deserialize, Serialize};

use crate::git::{self, GitProbe};
use crate::storage::{Session, Store};
use crate::summarize::SessionAssistant;

pub use render::build_raw_context;

/// Age in days at which a session is considered stale.
pub const DEFAULT_STALE_THRESHOLD_DAYS: i64 = 7;

/// What happened in the repository since a session was saved.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Changes {
    /// Human-readable time since the session, e.g. `"2h 30m"`.
    pub elapsed: String,
    /// `git log --oneline` lines, newest first
    pub commits: Vec<String>,
    /// Files touched by those commits, first-seen order
    pub files_changed: Vec<String>,
    pub is_stale: bool,
}

/// Outcome of resolving a session to restore.
#[derive(Debug)]
pub enum Restoration {
    /// There is no saved session matching the request.
    NoSession,
    /// A session was found and compared against the live repository.
    Restored(Box<RestoredSession>),
}

/// A resolved session plus everything computed about it.
#[derive(Debug, Clone)]
pub struct RestoredSession {
    pub session: Session,
    pub changes: Changes,
    /// Advisory only; never blocks restoration
    pub conflicts: Vec<String>,
}

/// Parses a stored timestamp.
///
/// RFC 3339 is the native format. Naive ISO-8601 strings without an
/// offset are read as local time.
pub fn parse_timestamp(timestamp: &str) -> Option<DateTime<Local>> {
    let timestamp = timestamp.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(timestamp) {
        return Some(dt.with_timezone(&Local));
    }

    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(timestamp, fmt).ok())
        .and_then(|naive| Local.from_local_datetime(&naive).earliest())
}

/// Formats the time elapsed since `timestamp`.
pub fn elapsed(timestamp: &str) -> String {
    elapsed_at(timestamp, Local::now())
}

/// Formats the time between `timestamp` and `now`.
///
/// Under a minute is `"just now"`, under an hour `"45m"`, under a day
/// `"3h"` or `"2h 30m"`, and beyond that whole days (`"1 day"`,
/// `"3 days"`). An unparseable timestamp yields `"unknown time"`.
pub fn elapsed_at(timestamp: &str, now: DateTime<Local>) -> String {
    let Some(then) = parse_timestamp(timestamp) else {
        return "unknown time".to_string();
    };

    let delta = now.signed_duration_since(then);
    if delta.num_seconds() < 60 {
        return "just now".to_string();
    }

    let minutes = delta.num_minutes();
    if minutes < 60 {
        return format!("{minutes}m");
    }

    let hours = delta.num_hours();
    if hours < 24 {
        let rem = minutes % 60;
        return if rem == 0 {
            format!("{hours}h")
        } else {
            format!("{hours}h {rem}m")
        };
    }

    match delta.num_days() {
        1 => "1 day".to_string(),
        days => format!("{days} days"),
    }
}

/// Whether a session saved at `timestamp` is at least `threshold_days` old.
pub fn is_stale(timestamp: &str, threshold_days: i64) -> bool {
    is_stale_at(timestamp, threshold_days, Local::now())
}

/// [`is_stale`] against an explicit clock. Unparseable timestamps are not
/// stale.
pub fn is_stale_at(timestamp: &str, threshold_days: i64, now: DateTime<Local>) -> bool {
    parse_timestamp(timestamp)
        .map(|then| now.signed_duration_since(then).num_days() >= threshold_days)
        .unwrap_or(false)
}

/// Runs the restoration pipeline against a git probe and an assistant.
pub struct Restorer<'a> {
    git: &'a dyn GitProbe,
    assistant: &'a dyn SessionAssistant,
    stale_threshold_days: i64,
    git_timeout: Duration,
}

impl<'a> Restorer<'a> {
    pub fn new(git: &'a dyn GitProbe, assistant: &'a dyn SessionAssistant) -> Self {
        Self {
            git,
            assistant,
            stale_threshold_days: DEFAULT_STALE_THRESHOLD_DAYS,
            git_timeout: git::DEFAULT_TIMEOUT,
        }
    }

    pub fn with_stale_threshold(mut self, days: i64) -> Self {
        self.stale_threshold_days = days;
        self
    }

    pub fn with_git_timeout(mut self, timeout: Duration) -> Self {
        self.git_timeout = timeout;
        self
    }

    /// Resolves the session to restore (by id, or the latest) and computes
    /// its changes and conflicts.
    pub fn restore(&self, store: &Store, id: Option<&str>) -> Restoration {
        let session = match id {
            Some(id) => store.load_session(id),
            None => store.latest_session(),
        };
        let Some(session) = session else {
            return Restoration::NoSession;
        };

        let changes = self.changes_since(&session.timestamp);
        let conflicts = self.detect_conflicts(&session);
        tracing::debug!(
            "Restored {} ({} commits since, {} conflicts)",
            session.id,
            changes.commits.len(),
            conflicts.len()
        );

        Restoration::Restored(Box::new(RestoredSession {
            session,
            changes,
            conflicts,
        }))
    }

    /// Collects commits and changed files since `timestamp`.
    ///
    /// Outside a repository, or when the timestamp cannot be parsed, the
    /// commit and file lists are empty.
    pub fn changes_since(&self, timestamp: &str) -> Changes {
        let mut changes = Changes {
            elapsed: elapsed(timestamp),
            commits: Vec::new(),
            files_changed: Vec::new(),
            is_stale: is_stale(timestamp, self.stale_threshold_days),
        };

        let Some(since) = parse_timestamp(timestamp) else {
            return changes;
        };
        if !self.git.is_repo() {
            return changes;
        }

        let since_arg = format!("--since={}", since.to_rfc3339());

        if let Some(log) = self
            .git
            .run(&["log", &since_arg, "--oneline"], self.git_timeout)
            .ok()
        {
            changes.commits = non_empty_lines(&log);
        }

        if let Some(names) = self
            .git
            .run(
                &["log", &since_arg, "--name-only", "--pretty=format:"],
                self.git_timeout,
            )
            .ok()
        {
            for file in non_empty_lines(&names) {
                if !changes.files_changed.contains(&file) {
                    changes.files_changed.push(file);
                }
            }
        }

        changes
    }

    /// Compares the saved git state with the live repository.
    ///
    /// Reports a branch switch, and whether files that were uncommitted at
    /// save time are still dirty.
    pub fn detect_conflicts(&self, session: &Session) -> Vec<String> {
        let mut conflicts = Vec::new();

        let current = self.git.current_branch();
        if let (Some(saved), Some(current)) = (session.git.branch.as_deref(), current.as_deref()) {
            if saved != current {
                conflicts.push(format!("Branch changed from {saved} to {current}"));
            }
        }

        if session.git.uncommitted_files.is_empty() {
            return conflicts;
        }

        let Some(status) = self
            .git
            .run(&["status", "--porcelain"], self.git_timeout)
            .ok()
        else {
            return conflicts;
        };

        let dirty = git::parse_status_paths(&status);
        let still_dirty: Vec<&str> = session
            .git
            .uncommitted_files
            .iter()
            .filter(|f| dirty.contains(*f))
            .map(|f| f.as_str())
            .collect();

        if !still_dirty.is_empty() {
            conflicts.push(format!(
                "{} file(s) that were uncommitted when you left still have uncommitted changes: {}",
                still_dirty.len(),
                still_dirty.join(", ")
            ));
        }

        conflicts
    }

    /// Produces the welcome-back message, falling back to
    /// [`fallback_message`] if the assistant fails.
    pub fn restoration_message(&self, session: &Session, changes: &Changes) -> String {
        match self.assistant.restoration_message(session, changes) {
            Ok(message) => message,
            Err(e) => {
                tracing::debug!("Assistant unavailable, using fallback message: {e}");
                fallback_message(session, changes)
            }
        }
    }
}

/// Deterministic welcome-back message built only from the session and its
/// changes.
///
/// Always starts with `"Welcome back"` and names the summary, hypothesis
/// (when present), branch and elapsed time.
pub fn fallback_message(session: &Session, changes: &Changes) -> String {
    let mut lines = Vec::new();

    if changes.elapsed == "just now" {
        lines.push("Welcome back! You left just now.".to_string());
    } else {
        lines.push(format!("Welcome back! You've been away for {}.", changes.elapsed));
    }
    lines.push(String::new());

    lines.push(format!("You were working on: {}", session.context.summary));
    if let Some(ref hypothesis) = session.context.hypothesis {
        lines.push(format!("Your hypothesis: {hypothesis}"));
    }
    lines.push(format!(
        "Branch: {}",
        session.git.branch.as_deref().unwrap_or("(none)")
    ));

    if !session.context.files.is_empty() {
        lines.push(format!("Files: {}", session.context.files.join(", ")));
    }

    if !session.context.next_steps.is_empty() {
        lines.push(String::new());
        lines.push("Next steps you planned:".to_string());
        for (i, step) in session.context.next_steps.iter().enumerate() {
            lines.push(format!("  {}. {step}", i + 1));
        }
    }

    if !changes.commits.is_empty() || !changes.files_changed.is_empty() {
        lines.push(String::new());
        lines.push(format!(
            "While you were away: {} new commit(s), {} file(s) changed.",
            changes.commits.len(),
            changes.files_changed.len()
        ));
    }

    if changes.is_stale {
        lines.push(String::new());
        lines.push("This session is stale; double-check that its context still applies.".to_string());
    }

    lines.join("\n")
}

fn non_empty_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(|l| l.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    use chrono::Duration as ChronoDuration;

    use crate::git::GitOutput;
    use crate::storage::{GitSnapshot, SessionContext};
    use crate::summarize::{OfflineAssistant, ScriptedAssistant};

    /// Git probe that replays canned answers and records the commands run.
    struct FakeGit {
        repo: bool,
        branch: Option<String>,
        outputs: RefCell<Vec<GitOutput>>,
        calls: RefCell<Vec<String>>,
    }

    impl FakeGit {
        fn new(branch: Option<&str>, outputs: Vec<GitOutput>) -> Self {
            Self {
                repo: branch.is_some(),
                branch: branch.map(|b| b.to_string()),
                outputs: RefCell::new(outputs),
                calls: RefCell::new(Vec::new()),
            }
        }
    }

    impl GitProbe for FakeGit {
        fn is_repo(&self) -> bool {
            self.repo
        }

        fn current_branch(&self) -> Option<String> {
            self.branch.clone()
        }

        fn run(&self, args: &[&str], _timeout: Duration) -> GitOutput {
            self.calls.borrow_mut().push(args.join(" "));
            let mut outputs = self.outputs.borrow_mut();
            if outputs.is_empty() {
                GitOutput::failed()
            } else {
                outputs.remove(0)
            }
        }
    }

    fn ok(stdout: &str) -> GitOutput {
        GitOutput {
            success: true,
            stdout: stdout.to_string(),
        }
    }

    fn ago(delta: ChronoDuration) -> String {
        (Local::now() - delta).to_rfc3339()
    }

    fn session_on(branch: &str, uncommitted: &[&str]) -> Session {
        Session {
            git: GitSnapshot {
                branch: Some(branch.to_string()),
                uncommitted_files: uncommitted.iter().map(|s| s.to_string()).collect(),
                ..GitSnapshot::default()
            },
            ..Session::default()
        }
    }

    fn auth_session() -> Session {
        Session {
            context: SessionContext {
                summary: "Implementing auth".to_string(),
                hypothesis: Some("JWT is best".to_string()),
                files: vec!["auth.py".to_string(), "tokens.py".to_string()],
                next_steps: vec!["Add refresh tokens".to_string(), "Write tests".to_string()],
                decisions: Vec::new(),
            },
            ..session_on("feature/auth", &[])
        }
    }

    fn changes(elapsed: &str) -> Changes {
        Changes {
            elapsed: elapsed.to_string(),
            commits: vec!["123 Added base auth".to_string()],
            files_changed: vec!["README.md".to_string()],
            is_stale: false,
        }
    }

    // ==================== Elapsed Tests ====================

    #[test]
    fn test_elapsed_buckets() {
        let now = Local::now();
        let at = |d: ChronoDuration| (now - d).to_rfc3339();

        assert_eq!(elapsed_at(&at(ChronoDuration::seconds(5)), now), "just now");
        assert_eq!(elapsed_at(&at(ChronoDuration::minutes(45)), now), "45m");
        assert_eq!(
            elapsed_at(&at(ChronoDuration::hours(2) + ChronoDuration::minutes(30)), now),
            "2h 30m"
        );
        assert_eq!(elapsed_at(&at(ChronoDuration::hours(3)), now), "3h");
        assert_eq!(
            elapsed_at(&at(ChronoDuration::days(1) + ChronoDuration::hours(5)), now),
            "1 day"
        );
        assert_eq!(elapsed_at(&at(ChronoDuration::days(3)), now), "3 days");
    }

    #[test]
    fn test_elapsed_with_real_clock() {
        assert_eq!(elapsed(&ago(ChronoDuration::zero())), "just now");
        assert_eq!(elapsed(&ago(ChronoDuration::minutes(45))), "45m");
        assert_eq!(elapsed(&ago(ChronoDuration::days(3))), "3 days");
    }

    #[test]
    fn test_elapsed_future_is_just_now() {
        let now = Local::now();
        let future = (now + ChronoDuration::hours(2)).to_rfc3339();
        assert_eq!(elapsed_at(&future, now), "just now");
    }

    #[test]
    fn test_elapsed_invalid() {
        assert_eq!(elapsed("not a timestamp"), "unknown time");
        assert_eq!(elapsed(""), "unknown time");
    }

    #[test]
    fn test_parse_naive_timestamp() {
        let parsed = parse_timestamp("2024-01-01T12:00:00").expect("naive ISO should parse");
        assert_eq!(parsed.format("%Y-%m-%d %H:%M").to_string(), "2024-01-01 12:00");
        assert!(parse_timestamp("2024-01-01T12:00:00.123456").is_some());
        assert!(parse_timestamp("2024-01-17T10:00:00Z").is_some());
    }

    // ==================== Staleness Tests ====================

    #[test]
    fn test_is_stale() {
        assert!(!is_stale(&ago(ChronoDuration::zero()), DEFAULT_STALE_THRESHOLD_DAYS));
        assert!(is_stale(&ago(ChronoDuration::days(10)), DEFAULT_STALE_THRESHOLD_DAYS));
        assert!(is_stale(&ago(ChronoDuration::days(3)), 2));
        assert!(!is_stale(&ago(ChronoDuration::days(1)), 2));
        assert!(!is_stale("garbage", 2));
    }

    // ==================== Change Detection Tests ====================

    #[test]
    fn test_changes_since_not_repo() {
        let git = FakeGit::new(None, vec![ok("should not be read")]);
        let restorer = Restorer::new(&git, &OfflineAssistant);

        let changes = restorer.changes_since(&ago(ChronoDuration::hours(1)));

        assert_eq!(changes.elapsed, "1h");
        assert!(changes.commits.is_empty());
        assert!(changes.files_changed.is_empty());
        assert!(!changes.is_stale);
        assert!(git.calls.borrow().is_empty());
    }

    #[test]
    fn test_changes_since_collects_commits_and_files() {
        let git = FakeGit::new(
            Some("main"),
            vec![
                ok("abc123 Fix login\ndef456 Add tests"),
                ok("src/login.rs\n\nsrc/lib.rs\nsrc/login.rs\ntests/login.rs"),
            ],
        );
        let restorer = Restorer::new(&git, &OfflineAssistant);

        let changes = restorer.changes_since(&ago(ChronoDuration::days(3)));

        assert_eq!(changes.commits, vec!["abc123 Fix login", "def456 Add tests"]);
        assert_eq!(
            changes.files_changed,
            vec!["src/login.rs", "src/lib.rs", "tests/login.rs"]
        );
        assert!(!changes.is_stale);
        let calls = git.calls.borrow();
        assert!(calls[0].starts_with("log --since="));
        assert!(calls[0].ends_with("--oneline"));
    }

    #[test]
    fn test_changes_since_uses_threshold() {
        let git = FakeGit::new(None, vec![]);
        let restorer = Restorer::new(&git, &OfflineAssistant).with_stale_threshold(2);

        assert!(restorer.changes_since(&ago(ChronoDuration::days(3))).is_stale);
    }

    #[test]
    fn test_changes_since_git_failure_is_empty() {
        let git = FakeGit::new(Some("main"), vec![GitOutput::failed(), GitOutput::failed()]);
        let restorer = Restorer::new(&git, &OfflineAssistant);

        let changes = restorer.changes_since(&ago(ChronoDuration::hours(1)));

        assert!(changes.commits.is_empty());
        assert!(changes.files_changed.is_empty());
    }

    // ==================== Conflict Tests ====================

    #[test]
    fn test_detect_conflicts_none() {
        let git = FakeGit::new(Some("main"), vec![ok(" M other.py")]);
        let restorer = Restorer::new(&git, &OfflineAssistant);

        assert!(restorer.detect_conflicts(&session_on("main", &[])).is_empty());
        assert!(restorer
            .detect_conflicts(&session_on("main", &["file.py"]))
            .is_empty());
    }

    #[test]
    fn test_detect_conflicts_branch_mismatch() {
        let git = FakeGit::new(Some("main"), vec![]);
        let restorer = Restorer::new(&git, &OfflineAssistant);

        let conflicts = restorer.detect_conflicts(&session_on("feature", &[]));

        assert_eq!(conflicts.len(), 1);
        assert!(conflicts[0].contains("Branch changed"));
        assert_eq!(conflicts[0], "Branch changed from feature to main");
    }

    #[test]
    fn test_detect_conflicts_uncommitted_files() {
        let git = FakeGit::new(Some("main"), vec![ok(" M file.py\n?? scratch.txt")]);
        let restorer = Restorer::new(&git, &OfflineAssistant);

        let conflicts = restorer.detect_conflicts(&session_on("main", &["file.py", "gone.py"]));

        assert_eq!(conflicts.len(), 1);
        assert!(conflicts[0].to_lowercase().contains("uncommitted"));
        assert!(conflicts[0].contains("file.py"));
        assert!(!conflicts[0].contains("gone.py"));
    }

    #[test]
    fn test_detect_conflicts_outside_repo() {
        let git = FakeGit::new(None, vec![]);
        let restorer = Restorer::new(&git, &OfflineAssistant);

        assert!(restorer
            .detect_conflicts(&session_on("feature", &["file.py"]))
            .is_empty());
    }

    // ==================== Message Tests ====================

    #[test]
    fn test_restoration_message_uses_assistant() {
        let git = FakeGit::new(Some("main"), vec![]);
        let assistant = ScriptedAssistant::restoring("Welcome back! You were working on a feature.");
        let restorer = Restorer::new(&git, &assistant);

        let message = restorer.restoration_message(&auth_session(), &changes("2h"));

        assert_eq!(message, "Welcome back! You were working on a feature.");
    }

    #[test]
    fn test_restoration_message_falls_back() {
        let git = FakeGit::new(Some("main"), vec![]);
        let restorer = Restorer::new(&git, &OfflineAssistant);

        let message = restorer.restoration_message(&auth_session(), &changes("2h"));

        assert!(message.starts_with("Welcome back"));
        assert!(message.contains("Implementing auth"));
    }

    #[test]
    fn test_fallback_message_contents() {
        let message = fallback_message(&auth_session(), &changes("3h"));

        assert!(message.starts_with("Welcome back"));
        assert!(message.contains("Implementing auth"));
        assert!(message.contains("JWT is best"));
        assert!(message.contains("feature/auth"));
        assert!(message.contains("3h"));
        assert!(message.contains("1 new commit(s)"));
    }

    #[test]
    fn test_fallback_message_minimal_session() {
        let session = Session {
            context: SessionContext {
                summary: "Working".to_string(),
                ..SessionContext::default()
            },
            ..Session::default()
        };
        let message = fallback_message(&session, &Changes {
            elapsed: "just now".to_string(),
            ..Changes::default()
        });

        assert!(message.starts_with("Welcome back"));
        assert!(message.contains("Working"));
        assert!(!message.contains("hypothesis"));
        assert!(!message.contains("While you were away"));
    }

    // ==================== Pipeline Tests ====================

    #[test]
    fn test_restore_no_session() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(dir.path());
        store.init().unwrap();
        let git = FakeGit::new(None, vec![]);
        let restorer = Restorer::new(&git, &OfflineAssistant);

        assert!(matches!(restorer.restore(&store, None), Restoration::NoSession));
        assert!(matches!(
            restorer.restore(&store, Some("session_missing")),
            Restoration::NoSession
        ));
    }

    #[test]
    fn test_restore_latest_session() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(dir.path());
        store.init().unwrap();
        let mut session = session_on("feature", &[]);
        session.context.summary = "Fixing flaky test".to_string();
        session.timestamp = ago(ChronoDuration::minutes(45));
        store.save_session(&session).unwrap();

        let git = FakeGit::new(Some("main"), vec![ok(""), ok("")]);
        let restorer = Restorer::new(&git, &OfflineAssistant);

        let Restoration::Restored(restored) = restorer.restore(&store, None) else {
            panic!("Expected a restored session");
        };
        assert_eq!(restored.session.context.summary, "Fixing flaky test");
        assert_eq!(restored.changes.elapsed, "45m");
        assert_eq!(restored.conflicts, vec!["Branch changed from feature to main"]);
    }
}
