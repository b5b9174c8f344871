//! Reindex command - rebuild the session index from session files.

use anyhow::{Context, Result};
use colored::Colorize;

use crate::storage::Store;

/// Executes the reindex command.
pub fn run() -> Result<()> {
    let store = Store::open_default()?;
    let (added, removed) = store
        .rebuild_index()
        .context("Failed to rebuild session index")?;

    if added == 0 && removed == 0 {
        println!("{}", "Session index is up to date.".green());
    } else {
        println!(
            "{} {} added, {} removed",
            "Session index rebuilt:".green(),
            added,
            removed
        );
    }
    println!("  {} sessions indexed", store.stats().sessions_count);

    Ok(())
}
