//! Prompt construction for the session assistant.
//!
//! Two exchanges are supported: analysing the current work state into a
//! structured session context, and writing a welcome-back message for a
//! restored session.

use crate::capture::GitState;
use crate::restore::Changes;
use crate::storage::Session;

/// Upper bound on the user content sent with a single request.
pub const MAX_PROMPT_CHARS: usize = 20_000;

/// How many changed commits or files are listed before eliding the rest.
const MAX_LISTED: usize = 20;

/// System prompt for context analysis.
///
/// The model must answer with a single JSON object so the reply can be
/// parsed into an [`super::Analysis`].
pub fn analysis_system_prompt() -> &'static str {
    "You help a developer save their working context so they can resume later. \
     Given the developer's note and the state of their git repository, infer what \
     they are working on.\n\n\
     Respond with a single JSON object and nothing else, using these keys:\n\
     - \"summary\": one sentence describing the current task\n\
     - \"hypothesis\": the working theory being tested, or null\n\
     - \"next_steps\": list of short imperative steps\n\
     - \"decisions\": list of decisions already made\n\
     - \"learnings\": list of insights worth remembering\n\n\
     Keep every string under 200 characters."
}

/// System prompt for the welcome-back message.
pub fn restoration_system_prompt() -> &'static str {
    "You help a developer get back into their work after a break. \
     Write a short, friendly welcome-back message that starts with \"Welcome back\". \
     Remind them what they were doing, their hypothesis if any, and the next step. \
     Mention notable changes made while they were away. \
     Use plain text, at most 8 lines."
}

/// Formats the analysis request.
pub fn format_analysis_input(git_state: &GitState, message: Option<&str>) -> String {
    let mut parts = Vec::new();

    if let Some(message) = message.filter(|m| !m.trim().is_empty()) {
        parts.push(format!("Developer note: {message}"));
    }

    if git_state.is_git {
        parts.push(format!(
            "Branch: {}",
            git_state.branch.as_deref().unwrap_or("(detached)")
        ));
        if !git_state.uncommitted_files.is_empty() {
            parts.push(format!(
                "Uncommitted files:\n{}",
                bullet_list(&git_state.uncommitted_files)
            ));
        }
        if !git_state.recent_commits.is_empty() {
            parts.push(format!(
                "Recent commits:\n{}",
                bullet_list(&git_state.recent_commits)
            ));
        }
        if !git_state.diff.is_empty() {
            parts.push(format!("Diff:\n{}", git_state.diff));
        }
    } else {
        parts.push("Not inside a git repository.".to_string());
    }

    truncate_chars(&parts.join("\n\n"), MAX_PROMPT_CHARS)
}

/// Formats the restoration request.
pub fn format_restoration_input(session: &Session, changes: &Changes) -> String {
    let context = &session.context;
    let mut parts = vec![
        format!("Time away: {}", changes.elapsed),
        format!("Was working on: {}", context.summary),
    ];

    if let Some(ref hypothesis) = context.hypothesis {
        parts.push(format!("Hypothesis: {hypothesis}"));
    }
    if let Some(ref branch) = session.git.branch {
        parts.push(format!("Branch: {branch}"));
    }
    if !context.files.is_empty() {
        parts.push(format!("Files:\n{}", bullet_list(&context.files)));
    }
    if !context.next_steps.is_empty() {
        parts.push(format!("Planned next steps:\n{}", bullet_list(&context.next_steps)));
    }
    if !changes.commits.is_empty() {
        parts.push(format!(
            "Commits since then ({}):\n{}",
            changes.commits.len(),
            bullet_list(&changes.commits)
        ));
    }
    if !changes.files_changed.is_empty() {
        parts.push(format!(
            "Files changed since then ({}):\n{}",
            changes.files_changed.len(),
            bullet_list(&changes.files_changed)
        ));
    }
    if changes.is_stale {
        parts.push("The session is stale; the context may be outdated.".to_string());
    }

    truncate_chars(&parts.join("\n\n"), MAX_PROMPT_CHARS)
}

fn bullet_list(items: &[String]) -> String {
    let mut lines: Vec<String> = items
        .iter()
        .take(MAX_LISTED)
        .map(|item| format!("- {item}"))
        .collect();
    if items.len() > MAX_LISTED {
        lines.push(format!("- ... and {} more", items.len() - MAX_LISTED));
    }
    lines.join("\n")
}

/// Cuts `text` to at most `max_chars` characters, marking the cut.
fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let kept: String = text.chars().take(max_chars).collect();
    format!("{kept}\n\n[... truncated ...]")
}
