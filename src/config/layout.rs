//! Workspace layout resolution.
//!
//! Maps the names declared in a job config to concrete paths under a
//! single workspace root, resolved once at startup and passed into
//! every component that touches the filesystem.

use crate::config::job_config::JobConfig;
use std::path::{Path, PathBuf};

/// Job spec templates for full-disk-encryption tests live in their own
/// subdirectory.
const TPM_FDE: &str = "tpm-fde";

#[derive(Debug, Clone)]
pub struct WorkspaceLayout {
    root: PathBuf,
}

impl WorkspaceLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        WorkspaceLayout { root: root.into() }
    }

    /// The test file for the configured suite.
    pub fn suite_file(&self, cfg: &JobConfig) -> PathBuf {
        self.root
            .join("robot")
            .join("suites")
            .join(&cfg.suite)
            .join(&cfg.test)
    }

    /// The directory holding one named template group.
    pub fn template_dir(&self, name: &str) -> PathBuf {
        self.root.join("robot").join("templates").join(name)
    }

    /// One named resource file.
    pub fn resource_file(&self, name: &str) -> PathBuf {
        self.root.join("robot").join("resources").join(name)
    }

    /// The job spec template for a machine. Tests whose name mentions
    /// tpm-fde use the template variant prepared for encrypted installs.
    pub fn job_spec_template(&self, machine_id: &str, cfg: &JobConfig) -> PathBuf {
        let definitions = self.root.join("testflinger-definitions");
        let file = format!("{machine_id}.template.yaml");
        if cfg.test.contains(TPM_FDE) {
            definitions.join(TPM_FDE).join(file)
        } else {
            definitions.join(file)
        }
    }

    /// A path relative to the workspace root, as it appears in the
    /// attachment manifest. Paths outside the root are passed through.
    pub fn relative(&self, path: &Path) -> PathBuf {
        path.strip_prefix(&self.root)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| path.to_path_buf())
    }
}
