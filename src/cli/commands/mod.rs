//! CLI commands for Flow Guardian.
//!
//! Each submodule implements a single CLI command with its argument
//! parsing and execution logic.

/// Shell completion scripts.
pub mod completions;

/// Configuration viewing and management.
pub mod config;

/// List saved sessions.
pub mod history;

/// Record a learning.
pub mod learn;

/// Search learnings.
pub mod recall;

/// Rebuild the session index.
pub mod reindex;

/// Restore a saved session.
pub mod resume;

/// Capture and save the current context.
pub mod save;

/// Show storage, session and integration status.
pub mod status;

/// Search team learnings.
pub mod team;
