use anyhow::{bail, Context, Result};
use clap::Subcommand;
use regsync_core::config::{self, ConfigStore};
use regsync_core::error::ConfigError;
use serde_json::{Map, Value};
use std::path::Path;

// ---------------------------------------------------------------------------
// Subcommand types
// ---------------------------------------------------------------------------

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Print one value
    Get { key: String },

    /// Set one value, creating the file if needed
    Set { key: String, value: String },

    /// Print the whole configuration as JSON
    Show,
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub fn run(path: &Path, subcmd: ConfigSubcommand) -> Result<()> {
    match subcmd {
        ConfigSubcommand::Get { key } => get(path, &key),
        ConfigSubcommand::Set { key, value } => set(path, &key, &value),
        ConfigSubcommand::Show => show(path),
    }
}

fn get(path: &Path, key: &str) -> Result<()> {
    let store = super::load_store(path)?;
    match store.get(key) {
        Some(Value::String(s)) => println!("{s}"),
        Some(other) => println!("{other}"),
        None => bail!("'{key}' is not set in {}", path.display()),
    }
    Ok(())
}

fn set(path: &Path, key: &str, raw: &str) -> Result<()> {
    let key = key.trim();
    if key.is_empty() {
        bail!("key must not be empty");
    }
    let value = parse_value(key, raw)?;

    let store = match ConfigStore::load(path) {
        Ok(store) => store,
        Err(ConfigError::NotFound(_)) => ConfigStore::create(path, Map::new())
            .with_context(|| format!("cannot create {}", path.display()))?,
        Err(e) => return Err(e.into()),
    };
    store.set(key, value)?;
    println!("{key} updated in {}", path.display());
    Ok(())
}

fn show(path: &Path) -> Result<()> {
    let store = super::load_store(path)?;
    println!("{}", serde_json::to_string_pretty(&store.snapshot())?);
    Ok(())
}

/// Numeric keys are validated and stored as numbers; everything else is
/// stored verbatim as a string.
fn parse_value(key: &str, raw: &str) -> Result<Value> {
    match key {
        config::INTERVAL_MINUTES | config::PAGE_SIZE => {
            let n: u64 = raw
                .trim()
                .parse()
                .with_context(|| format!("{key} must be a whole number, got '{raw}'"))?;
            if n == 0 {
                bail!("{key} must be at least 1");
            }
            Ok(Value::from(n))
        }
        _ => Ok(Value::String(raw.to_string())),
    }
}
