//! Save command - capture the current work context.
//!
//! Snapshots the repository, lets the assistant summarise it, and stores
//! the result as a new session.

use anyhow::{Context, Result};
use clap::ValueEnum;
use colored::Colorize;

use crate::capture;
use crate::cli::App;
use crate::storage::{Session, Store, Trigger};
use crate::team;

/// What caused this save, as accepted on the command line.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum TriggerArg {
    #[default]
    Manual,
    Auto,
    Hook,
}

impl From<TriggerArg> for Trigger {
    fn from(arg: TriggerArg) -> Self {
        match arg {
            TriggerArg::Manual => Trigger::Manual,
            TriggerArg::Auto => Trigger::Auto,
            TriggerArg::Hook => Trigger::Hook,
        }
    }
}

/// Arguments for the save command.
#[derive(clap::Args)]
#[command(after_help = "EXAMPLES:\n    \
    flow save                             Save with an inferred summary\n    \
    flow save -m \"Debugging token refresh\" Save with a note\n    \
    flow save -t auth -t bug              Tag the session\n    \
    flow save -q                          Print only the session id")]
pub struct Args {
    /// Note describing what you are working on
    #[arg(short, long, value_name = "MSG")]
    pub message: Option<String>,

    /// Tag for the session (repeatable)
    #[arg(short, long = "tag", value_name = "TAG")]
    pub tags: Vec<String>,

    /// Print only the session id
    #[arg(short, long)]
    pub quiet: bool,

    /// What triggered the save
    #[arg(long, value_enum, default_value = "manual", hide = true)]
    pub trigger: TriggerArg,
}

/// Executes the save command.
pub fn run(args: Args) -> Result<()> {
    let app = App::load()?;

    let mut session = capture::build_session(
        &app.git,
        app.assistant.as_ref(),
        args.message.as_deref(),
        args.tags,
        args.trigger.into(),
    );

    let id = persist(&app.store, &mut session)?;

    let shared = app.config.settings.share_with_team
        && app.share(
            app.config.backboard.personal_thread_id.as_deref(),
            &team::session_payload(&session),
        );

    if args.quiet {
        println!("{id}");
        return Ok(());
    }

    println!("{} {}", "Saved session".green(), id.cyan());
    println!("  {}  {}", "Summary:".dimmed(), session.context.summary);
    if let Some(ref hypothesis) = session.context.hypothesis {
        println!("  {}  {}", "Hypothesis:".dimmed(), hypothesis);
    }
    if let Some(ref branch) = session.git.branch {
        println!("  {}  {}", "Branch:".dimmed(), branch.yellow());
    }
    if !session.context.files.is_empty() {
        println!(
            "  {}  {} file(s)",
            "Files:".dimmed(),
            session.context.files.len()
        );
    }
    if shared {
        println!("  {}", "Shared to your personal thread".dimmed());
    }

    println!();
    println!("Run 'flow resume' to pick up where you left off.");

    Ok(())
}

/// Saves `session` and records the id the store assigned to it.
fn persist(store: &Store, session: &mut Session) -> Result<String> {
    let id = store
        .save_session(session)
        .context("Failed to save session")?;
    session.id = id.clone();
    Ok(id)
}
