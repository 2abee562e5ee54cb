pub mod config;
pub mod run;
pub mod serve;

use anyhow::Context;
use regsync_core::config::{ConfigStore, DEFAULT_LOG_DIR};
use std::path::{Path, PathBuf};

pub fn load_store(path: &Path) -> anyhow::Result<ConfigStore> {
    ConfigStore::load(path).with_context(|| format!("cannot load configuration from {}", path.display()))
}

/// Where daily log files go. Falls back to the default directory when the
/// configuration cannot be read yet; the command itself reports that error.
pub fn log_dir_for(config: &Path) -> PathBuf {
    ConfigStore::load(config)
        .map(|store| store.log_dir())
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_LOG_DIR))
}
