//! Asset bundling for a test job.
//!
//! Resolves the template and resource names declared in a job config to
//! concrete files and loads their byte contents, keyed by base name.
//! This is deliberately the first thing a run does: a missing declared
//! asset fails the job before any remote connection is attempted.

use crate::config::WorkspaceLayout;
use anyhow::{Context, Result, bail};
use log::{debug, warn};
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

/// Base name to raw byte content, for every file a job needs remotely.
///
/// A template and a resource sharing a base name would collide here;
/// the naming convention in the workspace keeps them disjoint.
pub type AssetBundle = BTreeMap<String, Vec<u8>>;

/// Every regular file in each declared template group, non-recursive.
pub fn collect_template_files(layout: &WorkspaceLayout, names: &[String]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for name in names {
        let dir = layout.template_dir(name);
        if !dir.is_dir() {
            bail!("template directory not found: {}", dir.display());
        }
        let mut group: Vec<PathBuf> = fs::read_dir(&dir)
            .with_context(|| format!("failed to list template directory {}", dir.display()))?
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
            .map(|entry| entry.path())
            .collect();
        group.sort();
        debug!("template group {name}: {} file(s)", group.len());
        files.extend(group);
    }
    Ok(files)
}

/// The declared resource files, each checked for existence.
pub fn collect_resource_files(layout: &WorkspaceLayout, names: &[String]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for name in names {
        let path = layout.resource_file(name);
        if !path.is_file() {
            bail!("resource not found: {}", path.display());
        }
        files.push(path);
    }
    Ok(files)
}

/// Loads the gathered files into a bundle, byte for byte.
pub fn gather(files: &[PathBuf]) -> Result<AssetBundle> {
    let mut bundle = AssetBundle::new();
    for path in files {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .with_context(|| format!("asset has no usable file name: {}", path.display()))?
            .to_string();
        let content =
            fs::read(path).with_context(|| format!("failed to read asset {}", path.display()))?;
        if bundle.insert(name.clone(), content).is_some() {
            warn!("duplicate asset base name {name}, later file wins");
        }
    }
    Ok(bundle)
}
