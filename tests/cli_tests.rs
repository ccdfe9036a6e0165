use assert_cmd::Command;
use predicates::str::contains;
use std::fs;
use tempfile::tempdir;

fn write_job_config(dir: &std::path::Path) -> std::path::PathBuf {
    let path = dir.join("job.json");
    fs::write(
        &path,
        r#"{
            "suite": "install",
            "test": "desktop-install.robot",
            "templates": ["basic"],
            "resources": ["usb_disk.resource"]
        }"#,
    )
    .unwrap();
    path
}

#[test]
fn help_lists_both_execution_modes() {
    let mut cmd = Command::cargo_bin("certrunner").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(contains("--direct"))
        .stdout(contains("--queued"))
        .stdout(contains("--job-config"));
}

#[test]
fn refuses_to_run_without_a_mode_flag() {
    let dir = tempdir().unwrap();
    let job_config = write_job_config(dir.path());

    let mut cmd = Command::cargo_bin("certrunner").unwrap();
    cmd.arg("--job-config")
        .arg(&job_config)
        .assert()
        .failure()
        .stderr(contains("execution mode"));
}

#[test]
fn mode_flags_are_mutually_exclusive() {
    let dir = tempdir().unwrap();
    let job_config = write_job_config(dir.path());

    let mut cmd = Command::cargo_bin("certrunner").unwrap();
    cmd.args(["--direct", "--queued"])
        .arg("--job-config")
        .arg(&job_config)
        .assert()
        .failure()
        .stderr(contains("cannot be used with"));
}

#[test]
fn missing_job_config_is_fatal() {
    let mut cmd = Command::cargo_bin("certrunner").unwrap();
    cmd.args(["--direct", "--client-ip", "127.0.0.1"])
        .arg("--job-config")
        .arg("/nonexistent/job.json")
        .assert()
        .failure()
        .stderr(contains("failed to read"));
}

#[test]
fn direct_mode_fails_fast_on_missing_assets() {
    // The declared template directory does not exist, so the run must
    // abort during local validation, before dialing the client host.
    let dir = tempdir().unwrap();
    let job_config = write_job_config(dir.path());

    let mut cmd = Command::cargo_bin("certrunner").unwrap();
    cmd.args(["--direct", "--client-ip", "127.0.0.1"])
        .arg("--job-config")
        .arg(&job_config)
        .arg("--root-dir")
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(contains("template directory not found"));
}

#[test]
fn direct_mode_requires_a_client_address() {
    let dir = tempdir().unwrap();
    let job_config = write_job_config(dir.path());

    let mut cmd = Command::cargo_bin("certrunner").unwrap();
    cmd.arg("--direct")
        .arg("--job-config")
        .arg(&job_config)
        .arg("--root-dir")
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(contains("--client-ip"));
}

#[test]
fn queued_mode_requires_a_machine_id() {
    let dir = tempdir().unwrap();
    let job_config = write_job_config(dir.path());

    let mut cmd = Command::cargo_bin("certrunner").unwrap();
    cmd.arg("--queued")
        .arg("--job-config")
        .arg(&job_config)
        .arg("--root-dir")
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(contains("--machine-id"));
}
