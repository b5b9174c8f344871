//! Command-line interface for Flow Guardian.
//!
//! Provides the `flow` commands for saving and restoring sessions and for
//! recording and recalling learnings.

/// Individual CLI command implementations.
pub mod commands;

/// Output format options shared across commands.
pub mod format;

use anyhow::Result;

use crate::config::Config;
use crate::git::SystemGit;
use crate::restore::Restorer;
use crate::storage::Store;
use crate::summarize::{assistant_from_settings, SessionAssistant};
use crate::team::{team_store_from_settings, TeamMessage, TeamStore};

pub use format::OutputFormat;

/// Everything a command needs, wired from `config.json` once per run.
pub struct App {
    pub store: Store,
    pub config: Config,
    pub git: SystemGit,
    pub assistant: Box<dyn SessionAssistant>,
    pub team: Box<dyn TeamStore>,
}

impl App {
    /// Opens the default store and builds the collaborators it configures.
    pub fn load() -> Result<Self> {
        let store = Store::open_default()?;
        let config = Config::load(&store);
        let git = SystemGit::current_dir()?.with_timeout(config.settings.git_timeout());
        let assistant = assistant_from_settings(&config.settings);
        let team = team_store_from_settings(&config.backboard);

        Ok(Self {
            store,
            config,
            git,
            assistant,
            team,
        })
    }

    /// A restorer using this run's git probe, assistant and settings.
    pub fn restorer(&self) -> Restorer<'_> {
        Restorer::new(&self.git, self.assistant.as_ref())
            .with_stale_threshold(self.config.settings.stale_threshold_days)
            .with_git_timeout(self.config.settings.git_timeout())
    }

    /// Sends `message` to `thread_id` if sharing is set up.
    ///
    /// Returns whether the message was delivered. Failures are logged and
    /// never abort the command.
    pub fn share(&self, thread_id: Option<&str>, message: &TeamMessage) -> bool {
        if !self.team.is_enabled() {
            return false;
        }
        let Some(thread_id) = thread_id.filter(|t| !t.trim().is_empty()) else {
            tracing::debug!("No thread id configured, not sharing");
            return false;
        };

        match self.team.store(thread_id, message) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("Failed to share with team: {e}");
                false
            }
        }
    }
}
