//! Config command - view and edit `config.json`.
//!
//! Keys are dotted paths such as `settings.stale_threshold_days`. Values
//! given to `set` are parsed as JSON when possible and stored as strings
//! otherwise.

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use serde_json::Value;

use crate::config::parse_value;
use crate::storage::Store;

/// Arguments for the config command.
#[derive(clap::Args)]
#[command(after_help = "EXAMPLES:\n    \
    flow config                                  Show configuration\n    \
    flow config get settings.stale_threshold_days\n    \
    flow config set settings.stale_threshold_days 14\n    \
    flow config set settings.ai_provider cerebras\n    \
    flow config set user.name \"Dana\"")]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<ConfigCommand>,
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show,
    /// Get a configuration value
    Get { key: String },
    /// Set a configuration value
    Set { key: String, value: String },
}

pub fn run(args: Args) -> Result<()> {
    let store = Store::open_default()?;
    match args.command {
        Some(ConfigCommand::Show) | None => show_config(&store),
        Some(ConfigCommand::Get { key }) => get_config(&store, &key),
        Some(ConfigCommand::Set { key, value }) => set_config(&store, &key, &value),
    }
}

fn show_config(store: &Store) -> Result<()> {
    println!("{}", "Flow Guardian Configuration".bold());
    println!(
        "  {}  {}",
        "File:".dimmed(),
        store.config_path().display()
    );
    println!();

    let mut config = store.config();
    mask_secrets(&mut config);
    println!("{}", serde_json::to_string_pretty(&config)?);

    Ok(())
}

fn get_config(store: &Store, key: &str) -> Result<()> {
    match store.config_value(key) {
        Some(Value::String(s)) => println!("{s}"),
        Some(value) => println!("{}", serde_json::to_string_pretty(&value)?),
        None => println!("{}", format!("Config key '{key}' not set").yellow()),
    }
    Ok(())
}

fn set_config(store: &Store, key: &str, value: &str) -> Result<()> {
    let value = parse_value(value);
    store
        .set_config(key, value.clone())
        .with_context(|| format!("Failed to set '{key}'"))?;

    let shown = if is_secret(key) {
        mask(value.as_str().unwrap_or_default())
    } else {
        value.to_string()
    };
    println!("{} {} = {}", "Set".green(), key.cyan(), shown);
    Ok(())
}

fn is_secret(key: &str) -> bool {
    key.rsplit('.').next().is_some_and(|leaf| leaf.ends_with("api_key"))
}

/// Replaces every `*api_key` string in `config` with a masked form.
fn mask_secrets(config: &mut Value) {
    if let Value::Object(map) = config {
        for (key, value) in map.iter_mut() {
            match value {
                Value::String(s) if is_secret(key) => *s = mask(s),
                Value::Object(_) => mask_secrets(value),
                _ => {}
            }
        }
    }
}

fn mask(secret: &str) -> String {
    let prefix: String = secret.chars().take(4).collect();
    if secret.chars().count() <= 4 {
        "****".to_string()
    } else {
        format!("{prefix}****")
    }
}
