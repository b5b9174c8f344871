//! Learn command - record an insight.

use anyhow::{bail, Context, Result};
use colored::Colorize;

use crate::cli::App;
use crate::storage::Learning;
use crate::team;

/// Arguments for the learn command.
#[derive(clap::Args)]
#[command(after_help = "EXAMPLES:\n    \
    flow learn \"Token refresh needs a mutex\" -t auth\n    \
    flow learn \"Use the staging DB for load tests\" --team")]
pub struct Args {
    /// The insight to remember
    #[arg(value_name = "TEXT")]
    pub text: String,

    /// Tag for the learning (repeatable)
    #[arg(short, long = "tag", value_name = "TAG")]
    pub tags: Vec<String>,

    /// Share with your team
    #[arg(long)]
    pub team: bool,
}

/// Executes the learn command.
pub fn run(args: Args) -> Result<()> {
    let text = args.text.trim();
    if text.is_empty() {
        bail!("Learning text cannot be empty");
    }

    let app = App::load()?;

    let mut learning = Learning::new(text, args.tags, args.team);
    learning.author = app.config.author();
    learning.timestamp = chrono::Local::now().to_rfc3339();

    let id = app
        .store
        .save_learning(&learning)
        .context("Failed to save learning")?;
    learning.id = id.clone();

    println!("{} {}", "Saved learning".green(), id.cyan());

    if args.team {
        let shared = app.share(
            app.config.backboard.team_thread_id.as_deref(),
            &team::learning_payload(&learning),
        );
        if shared {
            println!("  {}", "Shared with your team".dimmed());
        } else if !app.team.is_enabled() {
            println!(
                "  {}",
                "Saved locally. Team sharing is not configured; set backboard.api_key and backboard.team_thread_id."
                    .yellow()
            );
        } else {
            println!("  {}", "Saved locally. Could not reach the team store.".yellow());
        }
    }

    Ok(())
}
