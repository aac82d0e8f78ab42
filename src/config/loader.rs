// src/config/loader.rs

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::Result;

/// Read and deserialize a TOML file. No semantic checks.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)?;
    let raw: RawConfigFile = toml::from_str(&text)?;
    debug!(
        path = %path.display(),
        accounts = raw.accounts.len(),
        "config file parsed"
    );
    Ok(raw)
}

/// [`load_from_path`] followed by validation (accounts, swipe budgets,
/// resolution, friend ids).
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    ConfigFile::try_from(load_from_path(path)?)
}
