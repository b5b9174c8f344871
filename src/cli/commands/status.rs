//! Status command - show current Flow Guardian state.
//!
//! Displays storage counts, the latest session, the live git state and
//! which optional integrations are configured.

use anyhow::Result;
use colored::Colorize;

use crate::cli::format::truncate;
use crate::cli::App;
use crate::git::GitProbe;
use crate::restore;
use crate::summarize::resolve_config;

/// Executes the status command.
pub fn run() -> Result<()> {
    let app = App::load()?;
    let stats = app.store.stats();

    println!("{}", "Flow Guardian".bold().cyan());
    println!("{}", "Save and restore your working context".dimmed());
    println!();

    println!("{}", "Storage:".bold());
    println!("  Location:           {}", app.store.root().display());
    println!("  Sessions:           {}", stats.sessions_count);
    println!(
        "  Learnings:          {} ({} personal, {} team)",
        stats.total_learnings, stats.personal_learnings, stats.team_learnings
    );

    println!();
    println!("{}", "Latest session:".bold());
    match app.store.latest_session() {
        Some(session) => {
            let stale = restore::is_stale(
                &session.timestamp,
                app.config.settings.stale_threshold_days,
            );
            let age = restore::elapsed(&session.timestamp);
            println!("  {}  {}", session.id.cyan(), truncate(&session.context.summary, 60));
            println!(
                "  {} ago{}  on {}",
                age,
                if stale { " (stale)".yellow().to_string() } else { String::new() },
                session.git.branch.as_deref().unwrap_or("-").yellow()
            );
        }
        None => println!("  {}", "No saved sessions".dimmed()),
    }

    println!();
    println!("{}", "Git:".bold());
    if app.git.is_repo() {
        let state = crate::capture::capture_git_state(&app.git);
        println!(
            "  Branch:             {}",
            state.branch.as_deref().unwrap_or("-").yellow()
        );
        println!("  Uncommitted files:  {}", state.uncommitted_files.len());
        if let Some(commit) = state.last_commit {
            let short = commit.hash.get(..8).unwrap_or(&commit.hash);
            println!("  Last commit:        {} {}", short.cyan(), commit.message);
        }
    } else {
        println!("  {}", "Not a git repository".dimmed());
    }

    println!();
    println!("{}", "Integrations:".bold());
    match resolve_config(&app.config.settings) {
        Ok(ai) => println!("  {} AI assistant ({})", "✓".green(), ai.kind),
        Err(_) => println!("  {} AI assistant (offline fallback)", "○".dimmed()),
    }
    if app.team.is_enabled() {
        println!("  {} Team sharing", "✓".green());
    } else {
        println!("  {} Team sharing (not configured)", "○".dimmed());
    }

    Ok(())
}
