//! Markdown rendering of a restored session.
//!
//! Produces the `flow resume --raw` document: a fixed sequence of
//! sections, each omitted when it would be empty.

use crate::storage::Session;

use super::Changes;

/// Builds the Markdown context for `session`.
///
/// Sections appear in this order: Session Context, Previous Learnings,
/// Changes Since Last Session, Suggested Next Steps.
pub fn build_raw_context(session: &Session, changes: &Changes) -> String {
    let sections: Vec<String> = [
        session_section(session),
        learnings_section(session),
        changes_section(changes),
        next_steps_section(session, changes),
    ]
    .into_iter()
    .flatten()
    .collect();

    let mut out = sections.join("\n");
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
    out
}

fn session_section(session: &Session) -> Option<String> {
    let context = &session.context;
    let mut body = Vec::new();

    if !context.summary.is_empty() {
        body.push(format!("**Working on:** {}", context.summary));
    }
    if let Some(ref hypothesis) = context.hypothesis {
        body.push(format!("**Hypothesis:** {hypothesis}"));
    }
    if let Some(ref branch) = session.git.branch {
        body.push(format!("**Branch:** {branch}"));
    }
    if !context.files.is_empty() {
        body.push("**Files:**".to_string());
        body.extend(context.files.iter().map(|f| format!("- {f}")));
    }
    if !context.decisions.is_empty() {
        body.push("**Decisions:**".to_string());
        body.extend(context.decisions.iter().map(|d| format!("- {d}")));
    }
    if !context.next_steps.is_empty() {
        body.push("**Planned next steps:**".to_string());
        body.extend(context.next_steps.iter().map(|s| format!("- {s}")));
    }

    section("Session Context", body)
}

fn learnings_section(session: &Session) -> Option<String> {
    let body = session.learnings.iter().map(|l| l.render()).collect();
    section("Previous Learnings", body)
}

fn changes_section(changes: &Changes) -> Option<String> {
    let mut body = vec![format!("**Time away:** {}", changes.elapsed)];

    if !changes.commits.is_empty() {
        body.push(format!("**New commits ({}):**", changes.commits.len()));
        body.extend(changes.commits.iter().map(|c| format!("- {c}")));
    }
    if !changes.files_changed.is_empty() {
        body.push(format!("**Files changed ({}):**", changes.files_changed.len()));
        body.extend(changes.files_changed.iter().map(|f| format!("- {f}")));
    }
    if changes.is_stale {
        body.push("**Note:** this session is stale.".to_string());
    }

    section("Changes Since Last Session", body)
}

fn next_steps_section(session: &Session, changes: &Changes) -> Option<String> {
    let mut steps: Vec<String> = session.context.next_steps.clone();

    if !changes.commits.is_empty() {
        steps.push(format!(
            "Review the {} commit(s) made since this session",
            changes.commits.len()
        ));
    }
    if changes.is_stale {
        if let Some(ref hypothesis) = session.context.hypothesis {
            steps.push(format!("Re-check whether \"{hypothesis}\" still holds"));
        }
    }

    let body = steps
        .iter()
        .enumerate()
        .map(|(i, step)| format!("{}. {step}", i + 1))
        .collect();
    section("Suggested Next Steps", body)
}

fn section(title: &str, body: Vec<String>) -> Option<String> {
    if body.is_empty() {
        return None;
    }
    Some(format!("## {title}\n\n{}\n", body.join("\n")))
}
