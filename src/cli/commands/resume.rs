//! Resume command - restore a saved session.
//!
//! Shows how long you were away, what changed in the repository, any
//! drift from the saved git state, and a welcome-back message.

use std::io::{self, BufRead, Write};

use anyhow::{Context, Result};
use colored::Colorize;

use crate::cli::format::{short_timestamp, truncate};
use crate::cli::App;
use crate::restore::{build_raw_context, Restoration};
use crate::storage::IndexEntry;

/// Sessions offered by `--pick`.
const PICK_LIMIT: usize = 10;

/// Arguments for the resume command.
#[derive(clap::Args)]
#[command(after_help = "EXAMPLES:\n    \
    flow resume                    Restore the latest session\n    \
    flow resume -s session_2024-01-17_10-00-00\n    \
    flow resume -p                 Pick from recent sessions\n    \
    flow resume --raw > ctx.md     Print Markdown context for an AI assistant")]
pub struct Args {
    /// Restore a specific session by id
    #[arg(short, long = "session", value_name = "ID", conflicts_with = "pick")]
    pub session: Option<String>,

    /// Choose interactively from recent sessions
    #[arg(short, long)]
    pub pick: bool,

    /// Print the Markdown context instead of the welcome-back message
    #[arg(long)]
    pub raw: bool,
}

/// Executes the resume command.
pub fn run(args: Args) -> Result<()> {
    let app = App::load()?;

    let id = if args.pick {
        let recent = app.store.list_sessions(Some(PICK_LIMIT), None);
        if recent.is_empty() {
            println!("{}", "No saved sessions.".dimmed());
            println!();
            println!("Run 'flow save' to save your first session.");
            return Ok(());
        }
        match pick_session(&recent)? {
            Some(id) => Some(id),
            None => return Ok(()),
        }
    } else {
        args.session
    };

    let restored = match app.restorer().restore(&app.store, id.as_deref()) {
        Restoration::Restored(restored) => restored,
        Restoration::NoSession => {
            match id {
                Some(id) => println!("{}", format!("Session '{id}' not found.").yellow()),
                None => {
                    println!("{}", "No saved sessions.".dimmed());
                    println!();
                    println!("Run 'flow save' to save your first session.");
                }
            }
            return Ok(());
        }
    };

    if args.raw {
        print!(
            "{}",
            build_raw_context(&restored.session, &restored.changes)
        );
        return Ok(());
    }

    for conflict in &restored.conflicts {
        println!("{} {}", "Warning:".yellow().bold(), conflict.yellow());
    }
    if !restored.conflicts.is_empty() {
        println!();
    }

    let message = app
        .restorer()
        .restoration_message(&restored.session, &restored.changes);
    println!("{message}");

    println!();
    println!(
        "{}",
        format!(
            "Session {} ({})",
            restored.session.id,
            short_timestamp(&restored.session.timestamp)
        )
        .dimmed()
    );

    Ok(())
}

/// Lists `recent` and reads a 1-based choice from stdin.
fn pick_session(recent: &[IndexEntry]) -> Result<Option<String>> {
    println!("{}", "Recent sessions:".bold());
    for (i, entry) in recent.iter().enumerate() {
        println!(
            "  {:>2}. {}  {:<20}  {}",
            i + 1,
            short_timestamp(&entry.timestamp).dimmed(),
            truncate(entry.branch.as_deref().unwrap_or("-"), 20).yellow(),
            truncate(&entry.summary, 60)
        );
    }
    print!("Select a session [1-{}]: ", recent.len());
    io::stdout().flush().context("Failed to flush stdout")?;

    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read selection")?;

    match parse_choice(&line, recent.len()) {
        Some(index) => Ok(Some(recent[index].id.clone())),
        None => {
            println!("{}", "No session selected.".dimmed());
            Ok(None)
        }
    }
}

/// Parses a 1-based choice into an index below `count`.
fn parse_choice(input: &str, count: usize) -> Option<usize> {
    let choice: usize = input.trim().parse().ok()?;
    (1..=count).contains(&choice).then(|| choice - 1)
}
