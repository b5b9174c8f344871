//! History command - list saved sessions.
//!
//! Reads only the session index, so listing stays fast no matter how many
//! sessions have been saved.

use anyhow::Result;
use colored::Colorize;

use crate::cli::format::{short_timestamp, truncate};
use crate::cli::OutputFormat;
use crate::storage::{IndexEntry, Store};

/// Arguments for the history command.
#[derive(clap::Args)]
#[command(after_help = "EXAMPLES:\n    \
    flow history                   Last 10 sessions\n    \
    flow history -n 25             Last 25 sessions\n    \
    flow history --all             Every session\n    \
    flow history --branch main     Sessions saved on 'main'\n    \
    flow history -f json           Output as JSON")]
pub struct Args {
    /// Number of sessions to show
    #[arg(short = 'n', long, default_value = "10", value_name = "N")]
    pub limit: usize,

    /// Show every session
    #[arg(long, conflicts_with = "limit")]
    pub all: bool,

    /// Only sessions saved on this branch
    #[arg(short, long, value_name = "BRANCH")]
    pub branch: Option<String>,

    /// Output format: text (default), json
    #[arg(short, long, value_enum, default_value = "text")]
    pub format: OutputFormat,
}

/// Executes the history command.
pub fn run(args: Args) -> Result<()> {
    let store = Store::open_default()?;
    let limit = (!args.all).then_some(args.limit);
    let entries = store.list_sessions(limit, args.branch.as_deref());

    if args.format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!("{}", "No sessions found.".dimmed());
        println!();
        println!("Run 'flow save' to save your first session.");
        return Ok(());
    }

    let id_width = id_column_width(&entries);
    const SAVED_WIDTH: usize = 16;
    const BRANCH_WIDTH: usize = 24;

    println!(
        "{}",
        format!(
            "{:<id_width$}  {:<SAVED_WIDTH$}  {:<BRANCH_WIDTH$}  {}",
            "ID", "SAVED", "BRANCH", "SUMMARY"
        )
        .bold()
    );

    for entry in &entries {
        let branch = truncate(entry.branch.as_deref().unwrap_or("-"), BRANCH_WIDTH);
        println!(
            "{}  {}  {}  {}",
            format!("{:<id_width$}", entry.id).cyan(),
            format!("{:<SAVED_WIDTH$}", short_timestamp(&entry.timestamp)).dimmed(),
            format!("{branch:<BRANCH_WIDTH$}").yellow(),
            truncate(&entry.summary, 60)
        );
    }

    Ok(())
}

/// Width of the id column: the longest listed id, counter suffix included.
fn id_column_width(entries: &[IndexEntry]) -> usize {
    entries
        .iter()
        .map(|e| e.id.chars().count())
        .max()
        .unwrap_or(0)
        .max("ID".len())
}
