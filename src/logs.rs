//! Diagnostic log collection from the device under test.
//!
//! After a direct-mode run has recorded its verdict, we pull a copy of
//! the DUT's system logs for post-mortem analysis. Most files under
//! the log directory are root-owned, so they are first staged into a
//! world-readable scratch directory with a non-interactive sudo (the
//! lab default account has a known password), transferred, and the
//! scratch directory removed again.
//!
//! Collection is strictly best effort: any failure here is logged by
//! the orchestrator and never changes the job outcome.

use crate::shell::RemoteShell;
use crate::utils::shell_quote;
use anyhow::{Context, Result};
use log::{debug, info};
use std::fs;
use std::path::Path;

/// Remote directory whose regular files get collected.
pub const REMOTE_LOG_DIR: &str = "/var/log";

/// Scratch directory the logs are staged into before transfer.
pub const REMOTE_SCRATCH_DIR: &str = "/tmp/certrunner-logs";

/// Local file name for the boot-scoped journal snippet.
pub const JOURNAL_SNIPPET: &str = "journalctl-b-0.log";

/// Collects every file under [`REMOTE_LOG_DIR`] plus a boot-scoped
/// journal snippet into `output_dir`. Steps run in order and none is
/// individually retried; the first failure aborts collection.
pub fn collect<S: RemoteShell>(shell: &S, sudo_password: &str, output_dir: &Path) -> Result<()> {
    let files = enumerate_logs(shell)?;
    info!("Found {} log file(s) on the DUT", files.len());

    if !files.is_empty() {
        stage_logs(shell, sudo_password, &files)?;
        transfer_logs(shell, &files, &output_dir.join("logs"))?;
        cleanup_scratch(shell, sudo_password)?;
    }

    capture_journal(shell, output_dir)?;
    Ok(())
}

/// Every regular file under the remote log directory, non-empty lines
/// of a directory walk.
fn enumerate_logs<S: RemoteShell>(shell: &S) -> Result<Vec<String>> {
    let listing = shell
        .exec(&format!("find {REMOTE_LOG_DIR} -type f"))
        .context("failed to enumerate remote log files")?;
    Ok(listing
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

/// A log file's path relative to the log directory. Keeping the
/// subdirectory structure stops same-named files (nginx/error.log,
/// apache2/error.log) from overwriting each other.
fn relative_name(file: &str) -> &str {
    file.strip_prefix(REMOTE_LOG_DIR)
        .map(|rel| rel.trim_start_matches('/'))
        .filter(|rel| !rel.is_empty())
        .unwrap_or_else(|| file.trim_start_matches('/'))
}

/// Copies each log into the scratch directory with elevated privilege,
/// keeping its relative path, and makes the copies readable for the
/// transfer channel.
fn stage_logs<S: RemoteShell>(shell: &S, sudo_password: &str, files: &[String]) -> Result<()> {
    shell
        .exec(&format!("mkdir -p {REMOTE_SCRATCH_DIR}"))
        .context("failed to create the remote scratch directory")?;
    for file in files {
        let staged = format!("{REMOTE_SCRATCH_DIR}/{}", relative_name(file));
        if let Some(parent) = Path::new(&staged).parent() {
            shell
                .exec(&format!("mkdir -p {}", shell_quote(&parent.to_string_lossy())))
                .with_context(|| format!("failed to create the staging directory for {file}"))?;
        }
        let command = format!(
            "echo {} | sudo -S cp {} {}",
            shell_quote(sudo_password),
            shell_quote(file),
            shell_quote(&staged)
        );
        shell
            .exec(&command)
            .with_context(|| format!("failed to stage {file}"))?;
    }
    shell
        .exec(&format!(
            "echo {} | sudo -S chmod -R a+r {REMOTE_SCRATCH_DIR}",
            shell_quote(sudo_password)
        ))
        .context("failed to make staged logs readable")?;
    Ok(())
}

/// Downloads every staged file into the local log directory, with the
/// same relative paths they had on the DUT.
fn transfer_logs<S: RemoteShell>(shell: &S, files: &[String], local_dir: &Path) -> Result<()> {
    fs::create_dir_all(local_dir)
        .with_context(|| format!("failed to create {}", local_dir.display()))?;
    for file in files {
        let rel = relative_name(file);
        let staged = format!("{REMOTE_SCRATCH_DIR}/{rel}");
        debug!("Transferring {staged}");
        shell
            .download(Path::new(&staged), &local_dir.join(rel))
            .with_context(|| format!("failed to transfer {staged}"))?;
    }
    Ok(())
}

fn cleanup_scratch<S: RemoteShell>(shell: &S, sudo_password: &str) -> Result<()> {
    shell
        .exec(&format!(
            "echo {} | sudo -S rm -rf {REMOTE_SCRATCH_DIR}",
            shell_quote(sudo_password)
        ))
        .context("failed to remove the remote scratch directory")?;
    Ok(())
}

/// Captures the current boot's journal verbatim.
fn capture_journal<S: RemoteShell>(shell: &S, output_dir: &Path) -> Result<()> {
    let journal = shell
        .exec("journalctl -b 0")
        .context("failed to capture the journal snippet")?;
    let path = output_dir.join(JOURNAL_SNIPPET);
    fs::write(&path, journal)
        .with_context(|| format!("failed to write {}", path.display()))?;
    info!("Journal snippet written to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;
    use std::cell::RefCell;
    use std::collections::BTreeMap;

    /// Scripted stand-in for the SSH session: canned replies per
    /// command prefix, plus a record of everything asked of it.
    #[derive(Default)]
    struct FakeShell {
        replies: BTreeMap<&'static str, String>,
        commands: RefCell<Vec<String>>,
        downloads: RefCell<Vec<(String, String)>>,
        fail_downloads: bool,
    }

    impl FakeShell {
        fn with_listing(files: &str) -> Self {
            let mut shell = FakeShell::default();
            shell.replies.insert("find", files.to_string());
            shell
                .replies
                .insert("journalctl", "-- boot 0 --\nkernel: hello\n".to_string());
            shell
        }
    }

    impl RemoteShell for FakeShell {
        fn exec(&self, command: &str) -> Result<String> {
            self.commands.borrow_mut().push(command.to_string());
            for (prefix, reply) in &self.replies {
                if command.starts_with(prefix) {
                    return Ok(reply.clone());
                }
            }
            Ok(String::new())
        }

        fn download(&self, remote: &Path, local: &Path) -> Result<()> {
            if self.fail_downloads {
                bail!("connection reset");
            }
            self.downloads.borrow_mut().push((
                remote.to_string_lossy().into_owned(),
                local.to_string_lossy().into_owned(),
            ));
            std::fs::create_dir_all(local.parent().unwrap())?;
            std::fs::write(local, b"log content")?;
            Ok(())
        }
    }

    #[test]
    fn stages_transfers_and_cleans_up() {
        let shell = FakeShell::with_listing("/var/log/syslog\n/var/log/dmesg\n");
        let out = tempfile::tempdir().unwrap();

        collect(&shell, "ubuntu", out.path()).unwrap();

        let commands = shell.commands.borrow();
        assert!(commands.iter().any(|c| c == "find /var/log -type f"));
        assert!(commands.iter().any(|c| c.contains("mkdir -p /tmp/certrunner-logs")));
        assert!(
            commands
                .iter()
                .any(|c| c.contains("sudo -S cp '/var/log/syslog' '/tmp/certrunner-logs/syslog'"))
        );
        assert!(commands.iter().any(|c| c.contains("sudo -S rm -rf /tmp/certrunner-logs")));

        let downloads = shell.downloads.borrow();
        assert_eq!(downloads.len(), 2);
        assert!(out.path().join("logs/syslog").is_file());
        assert!(out.path().join("logs/dmesg").is_file());
        assert!(out.path().join(JOURNAL_SNIPPET).is_file());
    }

    #[test]
    fn same_named_logs_in_subdirectories_both_survive() {
        let shell =
            FakeShell::with_listing("/var/log/nginx/error.log\n/var/log/apache2/error.log\n");
        let out = tempfile::tempdir().unwrap();

        collect(&shell, "ubuntu", out.path()).unwrap();

        let commands = shell.commands.borrow();
        assert!(commands.iter().any(|c| c.contains("mkdir -p '/tmp/certrunner-logs/nginx'")));
        assert!(commands.iter().any(|c| {
            c.contains("sudo -S cp '/var/log/nginx/error.log' '/tmp/certrunner-logs/nginx/error.log'")
        }));

        assert_eq!(shell.downloads.borrow().len(), 2);
        assert!(out.path().join("logs/nginx/error.log").is_file());
        assert!(out.path().join("logs/apache2/error.log").is_file());
    }

    #[test]
    fn empty_enumeration_still_captures_the_journal() {
        let shell = FakeShell::with_listing("");
        let out = tempfile::tempdir().unwrap();

        collect(&shell, "ubuntu", out.path()).unwrap();

        assert!(shell.downloads.borrow().is_empty());
        let commands = shell.commands.borrow();
        assert!(!commands.iter().any(|c| c.contains("mkdir -p")));
        let journal = std::fs::read_to_string(out.path().join(JOURNAL_SNIPPET)).unwrap();
        assert!(journal.contains("boot 0"));
    }

    #[test]
    fn transfer_failure_aborts_collection() {
        let mut shell = FakeShell::with_listing("/var/log/syslog\n");
        shell.fail_downloads = true;
        let out = tempfile::tempdir().unwrap();

        let err = collect(&shell, "ubuntu", out.path()).unwrap_err();
        assert!(err.to_string().contains("failed to transfer"));
        // Collection stopped before the journal step.
        assert!(!out.path().join(JOURNAL_SNIPPET).exists());
    }

    #[test]
    fn password_is_shell_quoted() {
        let shell = FakeShell::with_listing("/var/log/syslog\n");
        let out = tempfile::tempdir().unwrap();

        collect(&shell, "pa'ss", out.path()).unwrap();

        let commands = shell.commands.borrow();
        assert!(commands.iter().any(|c| c.contains(r"echo 'pa'\''ss' | sudo -S cp")));
    }
}
