//! The declarative job config.
//!
//! A small JSON document naming the suite and test to run plus the
//! asset groups it needs. Loaded once at process start and never
//! mutated; a missing or malformed file aborts the run before any
//! network I/O happens.

use crate::utils;
use anyhow::Result;
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
pub struct JobConfig {
    /// Suite directory the test file lives in.
    pub suite: String,
    /// Test file within the suite.
    pub test: String,
    /// Template groups to bundle (directories under the templates root).
    pub templates: Vec<String>,
    /// Resource files to bundle (under the resources root).
    pub resources: Vec<String>,
    /// Image URL substituted into the job spec template, when present.
    #[serde(rename = "iso-url")]
    pub iso_url: Option<String>,
}

impl JobConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        utils::read_json_from_file(path)
    }
}
