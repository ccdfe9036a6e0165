//! Represents the SSH connection settings for the device under test.
//!
//! Freshly provisioned DUTs come up with a fixed default account, so
//! the defaults here work for most lab hardware; a TOML file can
//! override them per fleet. The retry budget and delay govern only
//! connection establishment, which is expected to flake while a DUT is
//! still booting.

use crate::shell::RetryPolicy;
use crate::utils;
use anyhow::Result;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    pub username: String,
    pub password: String,
    pub port: u16,
    pub max_attempts: u32,
    #[serde(with = "humantime_serde")]
    pub delay: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            username: "ubuntu".to_string(),
            password: "ubuntu".to_string(),
            port: 22,
            max_attempts: 10,
            delay: Duration::from_secs(10),
        }
    }
}

impl ConnectionConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        utils::read_toml_from_file(path)
    }

    /// The retry policy for establishing the shell connection.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            delay: self.delay,
        }
    }
}
