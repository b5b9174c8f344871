//! Session capture.
//!
//! Snapshots the repository, asks the assistant to make sense of it, and
//! assembles an unsaved [`Session`]. Nothing here fails: an unreachable
//! repository yields an empty [`GitState`] and an unavailable assistant
//! yields a fallback analysis.

use chrono::Local;
use serde::Serialize;

use crate::git::{parse_status_paths, GitProbe};
use crate::storage::{GitSnapshot, LearningRef, Session, SessionContext, SessionMetadata, Trigger};
use crate::summarize::{Analysis, SessionAssistant};

/// Number of recent commits recorded with a session.
pub const RECENT_COMMITS: usize = 5;

/// Diff lines handed to the assistant.
pub const ANALYSIS_DIFF_LINES: usize = 200;

/// Live repository state at capture time.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GitState {
    pub is_git: bool,
    pub branch: Option<String>,
    pub uncommitted_files: Vec<String>,
    /// `git log --oneline`, newest first
    pub recent_commits: Vec<String>,
    pub last_commit: Option<LastCommit>,
    /// Truncated working-tree diff, for analysis only
    #[serde(skip)]
    pub diff: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LastCommit {
    pub hash: String,
    pub message: String,
}

impl GitState {
    /// The part of this state persisted with a session.
    pub fn snapshot(&self) -> GitSnapshot {
        GitSnapshot {
            branch: self.branch.clone(),
            uncommitted_files: self.uncommitted_files.clone(),
            recent_commits: self.recent_commits.clone(),
        }
    }
}

/// Captures branch, dirty files, recent commits and HEAD.
///
/// Outside a repository every field is empty.
pub fn capture_git_state(git: &dyn GitProbe) -> GitState {
    if !git.is_repo() {
        return GitState::default();
    }

    let timeout = git.timeout();
    let uncommitted_files = git
        .run(&["status", "--porcelain"], timeout)
        .ok()
        .map(|out| parse_status_paths(&out))
        .unwrap_or_default();

    let count = format!("-{RECENT_COMMITS}");
    let recent_commits = git
        .run(&["log", &count, "--oneline"], timeout)
        .ok()
        .map(|out| {
            out.lines()
                .filter(|l| !l.trim().is_empty())
                .map(|l| l.to_string())
                .collect()
        })
        .unwrap_or_default();

    let last_commit = git
        .run(&["log", "-1", "--format=%H%n%s"], timeout)
        .ok()
        .and_then(|out| {
            let mut lines = out.lines();
            let hash = lines.next()?.trim().to_string();
            let message = lines.next().unwrap_or_default().trim().to_string();
            (!hash.is_empty()).then_some(LastCommit { hash, message })
        });

    GitState {
        is_git: true,
        branch: git.current_branch(),
        uncommitted_files,
        recent_commits,
        last_commit,
        diff: detailed_diff(git, ANALYSIS_DIFF_LINES),
    }
}

/// `git diff --stat`, or empty outside a repository.
pub fn diff_summary(git: &dyn GitProbe) -> String {
    if !git.is_repo() {
        return String::new();
    }
    git.run(&["diff", "--stat"], git.timeout())
        .ok()
        .unwrap_or_default()
}

/// `git diff` cut to at most `max_lines` lines.
///
/// When lines are dropped, the last kept line is replaced by a marker
/// saying how many were omitted.
pub fn detailed_diff(git: &dyn GitProbe, max_lines: usize) -> String {
    if !git.is_repo() {
        return String::new();
    }
    let Some(diff) = git.run(&["diff"], git.timeout()).ok() else {
        return String::new();
    };
    truncate_lines(&diff, max_lines)
}

fn truncate_lines(text: &str, max_lines: usize) -> String {
    let lines: Vec<&str> = text.lines().collect();
    if lines.len() <= max_lines {
        return text.to_string();
    }

    let keep = max_lines.saturating_sub(1);
    let mut out: Vec<String> = lines[..keep].iter().map(|l| l.to_string()).collect();
    out.push(format!("... ({} more lines omitted)", lines.len() - keep));
    out.join("\n")
}

/// Asks the assistant to analyse the work state.
///
/// The assistant's file list is replaced by the uncommitted files. If the
/// assistant fails, the summary is the message, else `"Working on
/// <branch>"`, else `"Working on code"`, with no hypothesis and empty lists.
pub fn analyze_context(
    assistant: &dyn SessionAssistant,
    git_state: &GitState,
    message: Option<&str>,
) -> Analysis {
    match assistant.analyze(git_state, message) {
        Ok(mut analysis) => {
            analysis.files = git_state.uncommitted_files.clone();
            analysis
        }
        Err(e) => {
            tracing::debug!("Context analysis unavailable: {e}");
            fallback_analysis(git_state, message)
        }
    }
}

fn fallback_analysis(git_state: &GitState, message: Option<&str>) -> Analysis {
    let summary = match (message.map(str::trim).filter(|m| !m.is_empty()), &git_state.branch) {
        (Some(message), _) => message.to_string(),
        (None, Some(branch)) => format!("Working on {branch}"),
        (None, None) => "Working on code".to_string(),
    };

    Analysis {
        summary,
        ..Analysis::default()
    }
}

/// Captures, analyses and assembles a new session.
///
/// The session carries its timestamp; the id is assigned when it is saved.
pub fn build_session(
    git: &dyn GitProbe,
    assistant: &dyn SessionAssistant,
    message: Option<&str>,
    tags: Vec<String>,
    trigger: Trigger,
) -> Session {
    let git_state = capture_git_state(git);
    let analysis = analyze_context(assistant, &git_state, message);
    session_from(&git_state, analysis, message, tags, trigger)
}

/// Assembles a session from already-captured parts.
pub fn session_from(
    git_state: &GitState,
    analysis: Analysis,
    message: Option<&str>,
    tags: Vec<String>,
    trigger: Trigger,
) -> Session {
    Session {
        id: String::new(),
        timestamp: Local::now().to_rfc3339(),
        context: SessionContext {
            summary: analysis.summary,
            hypothesis: analysis.hypothesis,
            files: analysis.files,
            next_steps: analysis.next_steps,
            decisions: analysis.decisions,
        },
        git: git_state.snapshot(),
        metadata: SessionMetadata {
            message: message.map(|m| m.to_string()),
            tags,
            trigger,
        },
        learnings: analysis
            .learnings
            .into_iter()
            .map(LearningRef::Plain)
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::time::Duration;

    use crate::git::GitOutput;
    use crate::summarize::{OfflineAssistant, ScriptedAssistant};

    /// Git probe answering by command prefix.
    struct FakeGit {
        repo: bool,
        answers: Vec<(&'static str, String)>,
        calls: RefCell<Vec<String>>,
    }

    impl FakeGit {
        fn repo<S: Into<String>>(answers: Vec<(&'static str, S)>) -> Self {
            Self {
                repo: true,
                answers: answers.into_iter().map(|(p, out)| (p, out.into())).collect(),
                calls: RefCell::new(Vec::new()),
            }
        }

        fn outside() -> Self {
            Self {
                repo: false,
                answers: Vec::new(),
                calls: RefCell::new(Vec::new()),
            }
        }
    }

    impl GitProbe for FakeGit {
        fn is_repo(&self) -> bool {
            self.repo
        }

        fn current_branch(&self) -> Option<String> {
            self.repo.then(|| "main".to_string())
        }

        fn run(&self, args: &[&str], _timeout: Duration) -> GitOutput {
            let command = args.join(" ");
            self.calls.borrow_mut().push(command.clone());
            self.answers
                .iter()
                .find(|(prefix, _)| command.starts_with(prefix))
                .map(|(_, out)| GitOutput {
                    success: true,
                    stdout: out.clone(),
                })
                .unwrap_or_else(GitOutput::failed)
        }
    }

    fn repo_state(branch: Option<&str>, uncommitted: &[&str]) -> GitState {
        GitState {
            is_git: true,
            branch: branch.map(|b| b.to_string()),
            uncommitted_files: uncommitted.iter().map(|s| s.to_string()).collect(),
            ..GitState::default()
        }
    }

    // ==================== Git State Tests ====================

    #[test]
    fn test_capture_git_state_in_repo() {
        let git = FakeGit::repo(vec![
            ("status --porcelain", " M file.py\n?? new.py"),
            ("log -5 --oneline", "abc123 Initial commit\ndef456 Second"),
            ("log -1", "abc123full\nInitial commit"),
            ("diff", "+added line"),
        ]);

        let state = capture_git_state(&git);

        assert!(state.is_git);
        assert_eq!(state.branch.as_deref(), Some("main"));
        assert_eq!(state.uncommitted_files, vec!["file.py", "new.py"]);
        assert_eq!(state.recent_commits.len(), 2);
        assert_eq!(
            state.last_commit,
            Some(LastCommit {
                hash: "abc123full".to_string(),
                message: "Initial commit".to_string(),
            })
        );
        assert_eq!(state.diff, "+added line");
    }

    #[test]
    fn test_capture_git_state_not_in_repo() {
        let git = FakeGit::outside();

        let state = capture_git_state(&git);

        assert!(!state.is_git);
        assert!(state.branch.is_none());
        assert!(state.uncommitted_files.is_empty());
        assert!(state.recent_commits.is_empty());
        assert!(state.last_commit.is_none());
        assert!(git.calls.borrow().is_empty());
    }

    #[test]
    fn test_capture_git_state_tolerates_failures() {
        let git = FakeGit::repo(Vec::<(&str, String)>::new());

        let state = capture_git_state(&git);

        assert!(state.is_git);
        assert!(state.uncommitted_files.is_empty());
        assert!(state.last_commit.is_none());
    }

    #[test]
    fn test_diff_summary() {
        let git = FakeGit::repo(vec![("diff --stat", " file.py | 2 +-")]);
        assert_eq!(diff_summary(&git), " file.py | 2 +-");
        assert_eq!(diff_summary(&FakeGit::outside()), "");
    }

    #[test]
    fn test_detailed_diff_truncates() {
        let long = (0..50)
            .map(|i| format!("+line {i}"))
            .collect::<Vec<_>>()
            .join("\n");
        let git = FakeGit::repo(vec![("diff", long)]);

        let diff = detailed_diff(&git, 10);
        let lines: Vec<&str> = diff.lines().collect();

        assert_eq!(lines.len(), 10);
        assert_eq!(lines[0], "+line 0");
        assert_eq!(lines[9], "... (41 more lines omitted)");
    }

    #[test]
    fn test_detailed_diff_short_is_untouched() {
        let git = FakeGit::repo(vec![("diff", "+one\n+two")]);
        assert_eq!(detailed_diff(&git, 10), "+one\n+two");
    }

    // ==================== Analysis Tests ====================

    #[test]
    fn test_analyze_context_with_assistant() {
        let assistant = ScriptedAssistant::analyzing(Analysis {
            summary: "Working on test feature".to_string(),
            hypothesis: Some("Testing approach".to_string()),
            files: vec!["ignored.py".to_string()],
            next_steps: vec!["Write tests".to_string()],
            decisions: vec!["Use pytest".to_string()],
            learnings: vec!["TDD is useful".to_string()],
        });

        let analysis = analyze_context(
            &assistant,
            &repo_state(Some("feature/test"), &["test.py"]),
            Some("Test message"),
        );

        assert_eq!(analysis.summary, "Working on test feature");
        assert_eq!(analysis.hypothesis.as_deref(), Some("Testing approach"));
        assert_eq!(analysis.files, vec!["test.py"]);
    }

    #[test]
    fn test_analyze_context_fallback_uses_message() {
        let analysis = analyze_context(
            &OfflineAssistant,
            &repo_state(Some("main"), &[]),
            Some("Working on feature"),
        );

        assert_eq!(analysis.summary, "Working on feature");
        assert!(analysis.hypothesis.is_none());
        assert!(analysis.files.is_empty());
    }

    #[test]
    fn test_analyze_context_fallback_uses_branch_then_default() {
        let on_branch = analyze_context(&OfflineAssistant, &repo_state(Some("main"), &[]), None);
        assert_eq!(on_branch.summary, "Working on main");

        let nowhere = analyze_context(&OfflineAssistant, &GitState::default(), Some("  "));
        assert_eq!(nowhere.summary, "Working on code");
    }

    // ==================== Session Assembly Tests ====================

    #[test]
    fn test_build_session_structure() {
        let git = FakeGit::repo(vec![
            ("status --porcelain", " M file.py"),
            ("log -5 --oneline", "abc123 Initial commit"),
        ]);
        let assistant = ScriptedAssistant::analyzing(Analysis {
            summary: "Test session".to_string(),
            hypothesis: Some("Test hypothesis".to_string()),
            next_steps: vec!["Step 1".to_string()],
            decisions: vec!["Decision 1".to_string()],
            learnings: vec!["Learning 1".to_string()],
            ..Analysis::default()
        });

        let session = build_session(
            &git,
            &assistant,
            Some("Test message"),
            vec!["test".to_string(), "example".to_string()],
            Trigger::Manual,
        );

        assert!(session.id.is_empty());
        assert!(!session.timestamp.is_empty());
        assert_eq!(session.context.summary, "Test session");
        assert_eq!(session.context.hypothesis.as_deref(), Some("Test hypothesis"));
        assert_eq!(session.context.files, vec!["file.py"]);
        assert_eq!(session.git.branch.as_deref(), Some("main"));
        assert_eq!(session.git.uncommitted_files, vec!["file.py"]);
        assert_eq!(session.git.recent_commits, vec!["abc123 Initial commit"]);
        assert_eq!(session.metadata.message.as_deref(), Some("Test message"));
        assert_eq!(session.metadata.tags, vec!["test", "example"]);
        assert_eq!(session.metadata.trigger, Trigger::Manual);
        assert_eq!(
            session.learnings,
            vec![LearningRef::Plain("Learning 1".to_string())]
        );
    }

    #[test]
    fn test_build_session_without_message() {
        let session = build_session(
            &FakeGit::outside(),
            &OfflineAssistant,
            None,
            Vec::new(),
            Trigger::Hook,
        );

        assert_eq!(session.context.summary, "Working on code");
        assert!(session.metadata.message.is_none());
        assert!(session.metadata.tags.is_empty());
        assert_eq!(session.metadata.trigger, Trigger::Hook);
        assert!(crate::restore::parse_timestamp(&session.timestamp).is_some());
    }
}
