use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use flow_guardian::cli::commands;

/// The main CLI command line interface.
#[derive(Parser)]
#[command(name = "flow")]
#[command(version)]
#[command(about = "Save and restore your working context across interruptions")]
#[command(long_about = "Flow Guardian snapshots what you are working on, together with the\n\
    state of your git repository, and restores it later with a summary of\n\
    what changed while you were away.\n\n\
    Learnings you record can be recalled later and shared with your team.")]
#[command(after_help = "EXAMPLES:\n    \
    flow save -m \"Chasing the login race\"   Save your context\n    \
    flow resume                              Pick up where you left off\n    \
    flow learn \"Retry needs jitter\" -t net   Record a learning\n    \
    flow recall retry                        Search your learnings\n    \
    flow history                             List saved sessions\n\n\
    For more information about a command, run 'flow <command> --help'.")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output for debugging
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// Available CLI subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Save the current working context as a session
    #[command(long_about = "Captures the branch, uncommitted files and recent commits of the\n\
        current repository, asks the configured AI assistant to summarise\n\
        the work, and saves the result as a new session. Without an AI\n\
        provider the summary is taken from --message or the branch name.")]
    Save(commands::save::Args),

    /// Restore a saved session
    #[command(long_about = "Restores the latest (or a chosen) session: how long you were away,\n\
        commits and files changed since, conflicts with the saved git state,\n\
        and a welcome-back message.")]
    Resume(commands::resume::Args),

    /// Record a learning
    Learn(commands::learn::Args),

    /// Search your learnings
    Recall(commands::recall::Args),

    /// Search learnings shared with your team
    Team(commands::team::Args),

    /// Show storage, latest session and integration status
    Status,

    /// List saved sessions
    History(commands::history::Args),

    /// View and manage configuration settings
    #[command(long_about = "Provides subcommands to show, get, and set configuration values.\n\
        Configuration is stored in config.json under the storage root\n\
        ($FLOW_GUARDIAN_HOME, default ~/.flow-guardian).")]
    Config(commands::config::Args),

    /// Rebuild the session index from session files
    Reindex,

    /// Generate shell completion scripts
    Completions(commands::completions::Args),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        "flow_guardian=debug"
    } else {
        "flow_guardian=info"
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with(
            tracing_subscriber::fmt::layer()
                .without_time()
                .with_writer(std::io::stderr),
        )
        .init();

    match cli.command {
        Commands::Save(args) => commands::save::run(args),
        Commands::Resume(args) => commands::resume::run(args),
        Commands::Learn(args) => commands::learn::run(args),
        Commands::Recall(args) => commands::recall::run(args),
        Commands::Team(args) => commands::team::run(args),
        Commands::Status => commands::status::run(),
        Commands::History(args) => commands::history::run(args),
        Commands::Config(args) => commands::config::run(args),
        Commands::Reindex => commands::reindex::run(),
        Commands::Completions(args) => {
            commands::completions::generate_completions(&mut Cli::command(), args.shell);
            Ok(())
        }
    }
}
