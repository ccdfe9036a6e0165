//! Orchestration of the two execution modes.
//!
//! Direct mode talks straight to the execution service on a reachable
//! client host and collects diagnostics from the DUT afterwards.
//! Queued mode renders a job spec and hands the whole job to the queue
//! service. Both return the suite's boolean verdict; everything that
//! is not a clean verdict surfaces as an error.

use crate::assets;
use crate::config::{CliArgs, ConnectionConfig, JobConfig, WorkspaceLayout};
use crate::executor::{ExecutionRequest, ExecutorClient};
use crate::jobspec;
use crate::logs;
use crate::shell::ShellSession;
use crate::submit::{self, SubmissionState};
use anyhow::{Context, Result};
use log::{debug, info, warn};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::Path;
use std::process::Command;

/// Robot variables every suite receives in direct mode.
fn default_variables() -> BTreeMap<String, String> {
    BTreeMap::from([
        (
            "KVM_RESOURCES".to_string(),
            "snippets/common/common_kvm.resource".to_string(),
        ),
        (
            "USB_RESOURCES".to_string(),
            "resources/usb_disk.resource".to_string(),
        ),
    ])
}

fn report_file_name(cfg: &JobConfig) -> String {
    let stem = Path::new(&cfg.test)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("report");
    format!("{stem}.html")
}

/// Runs the suite over the execution service and writes the HTML
/// report locally. With a DUT address, also collects diagnostic logs
/// once the verdict is recorded.
pub fn run_direct(
    args: &CliArgs,
    cfg: &JobConfig,
    layout: &WorkspaceLayout,
    conn: &ConnectionConfig,
) -> Result<bool> {
    let client_ip = args
        .client_ip
        .as_deref()
        .context("--client-ip is required in direct mode")?;

    // Cheap local validation first: a missing declared asset must fail
    // the job before any connection is attempted.
    let mut files = assets::collect_template_files(layout, &cfg.templates)?;
    files.extend(assets::collect_resource_files(layout, &cfg.resources)?);
    let bundle = assets::gather(&files)?;
    let suite_file = layout.suite_file(cfg);
    let script = fs::read(&suite_file)
        .with_context(|| format!("failed to read suite file {}", suite_file.display()))?;
    fs::create_dir_all(&args.output_dir)
        .with_context(|| format!("failed to create {}", args.output_dir.display()))?;

    let mut client = ExecutorClient::connect(client_ip)?;
    info!(
        "Running suite {}/{} with {} bundled asset(s)",
        cfg.suite,
        cfg.test,
        bundle.len()
    );
    let result = client.run(&ExecutionRequest {
        script,
        assets: bundle,
        variables: default_variables(),
    })?;

    let report_path = args.output_dir.join(report_file_name(cfg));
    fs::write(&report_path, &result.report_html)
        .with_context(|| format!("failed to write {}", report_path.display()))?;
    info!(
        "Suite {}: report written to {}",
        if result.passed { "passed" } else { "failed" },
        report_path.display()
    );

    if let Some(dut_ip) = args.dut_ip.as_deref() {
        let session = ShellSession::connect(dut_ip, conn, &conn.retry_policy())?;
        if let Err(e) = logs::collect(&session, &conn.password, &args.output_dir) {
            warn!("Diagnostic log collection failed, continuing: {e:#}");
        }
    }

    if args.open_report {
        open_report(&report_path);
    }

    Ok(result.passed)
}

/// Renders the job spec, submits it to the queue service and follows
/// the submission stream through to artifact retrieval.
pub fn run_queued(args: &CliArgs, cfg: &JobConfig, layout: &WorkspaceLayout) -> Result<bool> {
    let machine_id = args
        .machine_id
        .as_deref()
        .context("--machine-id is required in queued mode")?;
    let iso_url = args.iso_url.as_deref().or(cfg.iso_url.as_deref());

    let template_path = layout.job_spec_template(machine_id, cfg);
    let template_text = fs::read_to_string(&template_path).with_context(|| {
        format!("failed to read job spec template {}", template_path.display())
    })?;
    let spec = jobspec::build(layout, cfg, &args.job_config, &template_text, iso_url)?;
    let rendered = spec.render()?;
    debug!("Rendered job spec:\n{rendered}");

    let mut state = SubmissionState::default();
    {
        // The submit tool resolves attachment paths relative to its
        // working directory, so the spec file lives there too. Scoped
        // so the file is gone on every exit path.
        let spec_file = write_spec_file(&rendered)?;
        if let Err(e) = submit::stream_submission(spec_file.path(), &mut state) {
            // The tool can exit non-zero for reasons unrelated to the
            // verdict; whatever the stream already told us stands.
            warn!("Submission failed: {e:#}");
        }
    }

    match state.job_id.as_deref() {
        Some(job_id) => submit::gather_artifacts(job_id),
        None => warn!("No job id observed in the submission stream, skipping artifact retrieval"),
    }
    if state.verdict.is_none() {
        warn!("Stream ended without a result marker, reporting failure");
    }
    Ok(state.passed())
}

fn write_spec_file(rendered: &str) -> Result<tempfile::NamedTempFile> {
    let mut file = tempfile::Builder::new()
        .prefix("certrunner-job-")
        .suffix(".yaml")
        .tempfile_in(".")
        .context("failed to create the job spec temp file")?;
    file.write_all(rendered.as_bytes())
        .and_then(|()| file.flush())
        .context("failed to write the job spec temp file")?;
    Ok(file)
}

fn open_report(path: &Path) {
    if let Err(e) = Command::new("xdg-open").arg(path).spawn() {
        warn!("Failed to open {}: {e}", path.display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_name_comes_from_the_test_stem() {
        let cfg = JobConfig {
            suite: "install".to_string(),
            test: "desktop-install.robot".to_string(),
            templates: vec![],
            resources: vec![],
            iso_url: None,
        };
        assert_eq!(report_file_name(&cfg), "desktop-install.html");
    }

    #[test]
    fn default_variables_cover_the_shared_resources() {
        let vars = default_variables();
        assert_eq!(
            vars.get("USB_RESOURCES").map(String::as_str),
            Some("resources/usb_disk.resource")
        );
        assert_eq!(
            vars.get("KVM_RESOURCES").map(String::as_str),
            Some("snippets/common/common_kvm.resource")
        );
    }
}
