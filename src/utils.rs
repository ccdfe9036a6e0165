//! Shared helpers for the certrunner binary.
//!
//! File readers for the two configuration formats in play (JSON job
//! configs, TOML connection configs) and a small shell-quoting helper
//! used wherever remote command lines are assembled from paths.

use anyhow::{Context, Result};
use log::error;
use serde::de::DeserializeOwned;
use std::{fs, path::Path};

/// Reads a TOML file into an arbitrary struct.
pub fn read_toml_from_file<T>(path: &Path) -> Result<T>
where
    T: DeserializeOwned,
{
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let config: T = match toml::de::from_str(&content) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to parse TOML file {}: {e}", path.display());
            return Err(e.into());
        }
    };
    Ok(config)
}

/// Reads a JSON file into an arbitrary struct.
pub fn read_json_from_file<T>(path: &Path) -> Result<T>
where
    T: DeserializeOwned,
{
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("failed to parse JSON file {}", path.display()))
}

/// Single-quotes a string for use in a remote shell command line.
///
/// Embedded single quotes are closed, escaped and reopened, so the
/// result is safe to splice into a `sh -c` style command.
pub fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}
