//! Job specification rendering for queued submissions.
//!
//! A queued job is described by a per-machine template (queue target
//! and provisioning parameters) plus a generated `test_data` section:
//! the attachment manifest and the command script the provisioned
//! agent runs. The section is built as data and serialized once at the
//! end, so rendering identical inputs yields byte-identical documents.

use crate::assets;
use crate::config::{JobConfig, WorkspaceLayout};
use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;

/// Placeholder token the per-machine templates carry for the image URL.
pub const URL_PLACEHOLDER: &str = "<url>";

/// Entry-point script the agent invokes; attached alongside the test
/// assets and re-run remotely with the same relative path.
pub const ENTRY_POINT: &str = "scripts/call-job";

/// One attachment: a local file and where the agent should place it.
///
/// The two sides are always identical. The entry point re-derives the
/// same paths relative to its own working directory, so any divergence
/// here breaks the remote run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Attachment {
    pub local: String,
    pub agent: String,
}

impl Attachment {
    fn identity(path: &str) -> Self {
        Attachment {
            local: path.to_string(),
            agent: path.to_string(),
        }
    }
}

#[derive(Serialize)]
struct TestData<'a> {
    attachments: &'a [Attachment],
    test_cmds: String,
}

#[derive(Serialize)]
struct TestDataSection<'a> {
    test_data: TestData<'a>,
}

/// A complete job specification, assembled as data and serialized by
/// [`JobSpec::render`].
#[derive(Debug, Clone)]
pub struct JobSpec {
    template_text: String,
    attachments: Vec<Attachment>,
    commands: Vec<String>,
}

impl JobSpec {
    /// Starts a spec from a per-machine template, substituting the
    /// image URL for the placeholder token when one is given.
    pub fn new(template_text: &str, iso_url: Option<&str>) -> Self {
        let template_text = match iso_url {
            Some(url) => template_text.replace(URL_PLACEHOLDER, url),
            None => template_text.to_string(),
        };
        JobSpec {
            template_text,
            attachments: Vec::new(),
            commands: Vec::new(),
        }
    }

    /// Appends one identity-mapped attachment.
    pub fn attach(&mut self, path: &str) {
        self.attachments.push(Attachment::identity(path));
    }

    pub fn push_command(&mut self, command: impl Into<String>) {
        self.commands.push(command.into());
    }

    pub fn attachments(&self) -> &[Attachment] {
        &self.attachments
    }

    /// Serializes the template plus the generated `test_data` section.
    pub fn render(&self) -> Result<String> {
        let section = TestDataSection {
            test_data: TestData {
                attachments: &self.attachments,
                test_cmds: format!("{}\n", self.commands.join("\n")),
            },
        };
        let yaml = serde_yaml::to_string(&section)
            .context("failed to serialize the test_data section")?;
        Ok(format!("{}\n{yaml}", self.template_text))
    }
}

/// Builds the full spec for a job: template text, the attachment
/// manifest derived from the job's assets, and the fixed agent command
/// script.
pub fn build(
    layout: &WorkspaceLayout,
    cfg: &JobConfig,
    job_config_path: &Path,
    template_text: &str,
    iso_url: Option<&str>,
) -> Result<JobSpec> {
    let mut spec = JobSpec::new(template_text, iso_url);

    let suite = layout.relative(&layout.suite_file(cfg));
    spec.attach(&suite.to_string_lossy());
    spec.attach(ENTRY_POINT);
    spec.attach(&job_config_path.to_string_lossy());
    for file in assets::collect_template_files(layout, &cfg.templates)? {
        spec.attach(&layout.relative(&file).to_string_lossy());
    }
    for file in assets::collect_resource_files(layout, &cfg.resources)? {
        spec.attach(&layout.relative(&file).to_string_lossy());
    }

    spec.push_command("set -e");
    spec.push_command("mkdir -p artifacts/logs/");
    spec.push_command("cd attachments/test/");
    spec.push_command("echo You can view the stream of the test here:");
    spec.push_command("echo \"http://${ZAPPER_IP}:60010/stream\"");
    // The entry-point script supplies the mode flag itself.
    spec.push_command(format!(
        "./{ENTRY_POINT} --job-config {} --client-ip $ZAPPER_IP --output-dir ../../artifacts/ --dut-ip $DEVICE_IP",
        job_config_path.display()
    ));

    Ok(spec)
}
