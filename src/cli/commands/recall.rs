//! Recall command - search your learnings.
//!
//! Matches the query against learning text and tags, case-insensitively.
//! Tag filters narrow the results to learnings sharing at least one tag.

use anyhow::Result;
use colored::Colorize;

use crate::cli::format::short_timestamp;
use crate::cli::OutputFormat;
use crate::storage::{Learning, Store};

/// Arguments for the recall command.
#[derive(clap::Args)]
#[command(after_help = "EXAMPLES:\n    \
    flow recall jwt                  Learnings mentioning 'jwt'\n    \
    flow recall \"\" -t auth           Every learning tagged 'auth'\n    \
    flow recall cache --limit 5\n    \
    flow recall db -f json           Output as JSON")]
pub struct Args {
    /// Text to look for in learnings and their tags
    #[arg(value_name = "QUERY")]
    pub query: String,

    /// Only learnings with this tag (repeatable)
    #[arg(short, long = "tag", value_name = "TAG")]
    pub tags: Vec<String>,

    /// Maximum number of learnings to display
    #[arg(short, long, default_value = "10", value_name = "N")]
    pub limit: usize,

    /// Output format: text (default), json
    #[arg(short, long, value_enum, default_value = "text")]
    pub format: OutputFormat,
}

/// Executes the recall command.
pub fn run(args: Args) -> Result<()> {
    let store = Store::open_default()?;
    let results = search(&store, &args.query, &args.tags, None, args.limit);
    print_learnings(&results, &args.query, args.format)
}

/// Searches learnings, optionally only team or personal ones, newest first.
pub(crate) fn search(
    store: &Store,
    query: &str,
    tags: &[String],
    team: Option<bool>,
    limit: usize,
) -> Vec<Learning> {
    let tags = (!tags.is_empty()).then_some(tags);
    let mut results: Vec<Learning> = store
        .search_learnings(query, tags)
        .into_iter()
        .filter(|l| team.is_none_or(|t| l.team == t))
        .collect();
    results.reverse();
    results.truncate(limit);
    results
}

/// Prints search results, or a friendly message when there are none.
pub(crate) fn print_learnings(results: &[Learning], query: &str, format: OutputFormat) -> Result<()> {
    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(results)?);
        return Ok(());
    }

    if results.is_empty() {
        if query.trim().is_empty() {
            println!("{}", "No learnings found.".dimmed());
        } else {
            println!("{}", format!("No learnings found matching '{query}'.").dimmed());
        }
        return Ok(());
    }

    for learning in results {
        let mut line = format!("- {}", learning.text);
        if !learning.tags.is_empty() {
            line.push_str(&format!(" {}", format!("[{}]", learning.tags.join(", ")).cyan()));
        }
        if learning.team {
            line.push_str(&format!(" {}", "(team)".green()));
        }
        println!("{line}");

        let mut details = vec![short_timestamp(&learning.timestamp)];
        if let Some(ref author) = learning.author {
            details.push(author.clone());
        }
        println!("  {}", details.join(" · ").dimmed());
    }

    Ok(())
}
