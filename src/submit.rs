//! Queue submission and result-stream processing.
//!
//! The queue service's submission tool runs as a child process for the
//! full duration of a hardware test cycle, printing line-oriented
//! progress. We consume that stream live, echoing every line for the
//! operator and folding it through a small reducer that accumulates
//! the job identifier and the pass/fail verdict the entry-point script
//! prints. Later markers override earlier ones.
//!
//! Artifact retrieval afterwards is best effort, like diagnostic log
//! collection: failures are logged and never change the verdict.

use anyhow::{Context, Result, bail};
use log::{error, info, warn};
use regex::Regex;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::OnceLock;

/// The queue service's command line tool.
pub const SUBMIT_TOOL: &str = "testflinger";

/// Fixed-name archive the artifact fetch drops in the working directory.
pub const ARTIFACT_ARCHIVE: &str = "artifacts.tgz";

const PASS_MARKER: &str = "RESULT=PASS";
const FAIL_MARKER: &str = "RESULT=FAIL";

fn job_id_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"job_id:\s*(\S+)").unwrap())
}

/// Aggregate verdict printed by the entry-point script.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Pass,
    Fail,
}

/// What the stream has told us so far. Both fields are last-write-wins
/// across the whole stream.
#[derive(Debug, Default)]
pub struct SubmissionState {
    pub job_id: Option<String>,
    pub verdict: Option<Verdict>,
}

impl SubmissionState {
    /// Folds one output line into the state. The three classifications
    /// are independent; a single line may match more than one.
    pub fn observe(&mut self, line: &str) {
        if let Some(captures) = job_id_pattern().captures(line) {
            let id = captures[1].trim().to_string();
            info!("Queue service assigned job id {id}");
            self.job_id = Some(id);
        }
        if line.contains(PASS_MARKER) {
            self.verdict = Some(Verdict::Pass);
        } else if line.contains(FAIL_MARKER) {
            self.verdict = Some(Verdict::Fail);
        }
    }

    pub fn passed(&self) -> bool {
        self.verdict == Some(Verdict::Pass)
    }
}

/// Submits a rendered job spec and processes the tool's output stream.
///
/// A non-zero exit from the tool is an error, but whatever job id and
/// verdict were observed before it remain valid in `state`; the tool
/// can exit non-zero for reasons unrelated to the test verdict.
pub fn stream_submission(spec_file: &Path, state: &mut SubmissionState) -> Result<()> {
    let mut command = Command::new(SUBMIT_TOOL);
    command.arg("submit").arg("-p").arg(spec_file);
    stream_command(command, state)
}

/// Runs `command` with piped stdout, echoing each line verbatim and
/// feeding it to the reducer. Blocks until the child closes its output
/// and exits; there is deliberately no extra timeout on the read.
fn stream_command(mut command: Command, state: &mut SubmissionState) -> Result<()> {
    info!("Running submission command: {command:?}");
    let mut child = command
        .stdout(Stdio::piped())
        .spawn()
        .with_context(|| format!("failed to run {SUBMIT_TOOL}, is it installed?"))?;

    let stdout = child
        .stdout
        .take()
        .context("submission tool has no stdout")?;
    for line in BufReader::new(stdout).lines() {
        let line = line.context("failed to read submission output")?;
        println!("{line}");
        state.observe(&line);
    }

    let status = child.wait().context("failed to wait for the submission tool")?;
    if !status.success() {
        bail!("submission tool exited with {status}");
    }
    Ok(())
}

/// Fetches and unpacks the artifacts for a completed job. Both steps
/// are independently fallible and only logged on failure; by this
/// point the verdict is already recorded.
pub fn gather_artifacts(job_id: &str) {
    info!("Gathering artifacts for job {job_id}");
    match Command::new(SUBMIT_TOOL).arg("artifacts").arg(job_id).output() {
        Ok(output) if output.status.success() => {
            info!("Artifacts fetched: {}", String::from_utf8_lossy(&output.stdout).trim());
        }
        Ok(output) => {
            error!(
                "Artifact fetch failed with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Err(e) => {
            error!("Failed to run the artifact fetch: {e}");
        }
    }

    match Command::new("tar").arg("-xf").arg(ARTIFACT_ARCHIVE).output() {
        Ok(output) if output.status.success() => {
            info!("Unpacked {ARTIFACT_ARCHIVE} into the artifacts directory");
        }
        Ok(output) => {
            warn!(
                "Failed to unpack {ARTIFACT_ARCHIVE}: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Err(e) => {
            warn!("Failed to run tar: {e}");
        }
    }
}
