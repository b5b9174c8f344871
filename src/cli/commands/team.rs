//! Team command - search learnings shared with your team.

use anyhow::Result;
use colored::Colorize;

use super::recall;
use crate::cli::OutputFormat;
use crate::config::Config;
use crate::storage::Store;

/// Arguments for the team command.
#[derive(clap::Args)]
#[command(after_help = "EXAMPLES:\n    \
    flow team deploy                 Team learnings mentioning 'deploy'\n    \
    flow team \"\" -t infra            Every team learning tagged 'infra'")]
pub struct Args {
    /// Text to look for in team learnings and their tags
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

/// Executes the team command.
pub fn run(args: Args) -> Result<()> {
    let store = Store::open_default()?;
    let config = Config::load(&store);

    if args.format == OutputFormat::Text && !config.backboard.is_configured() {
        println!(
            "{}",
            "Team sharing is not configured. Showing team learnings saved on this machine.".yellow()
        );
        println!(
            "{}",
            "Set it up with 'flow config set backboard.api_key <KEY>' and 'flow config set backboard.team_thread_id <ID>'."
                .dimmed()
        );
        println!();
    }

    let results = recall::search(&store, &args.query, &args.tags, Some(true), args.limit);
    recall::print_learnings(&results, &args.query, args.format)
}
