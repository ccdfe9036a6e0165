//! Resilient remote-shell client for the device under test.
//!
//! A DUT is often still booting when we first try to reach it, so
//! connection establishment is the one place where flakiness is
//! expected and absorbed: attempts are retried on a fixed budget with a
//! fixed delay. Everything after a successful connection either works
//! or is handled by the caller.
//!
//! Host keys are accepted blindly. The targets are short-lived,
//! freshly provisioned lab machines with no established trust anchor.

use anyhow::{Context, Result, bail};
use log::{debug, info, warn};
use ssh2::Session;
use std::fs::File;
use std::io::Read;
use std::net::TcpStream;
use std::path::Path;
use std::time::Duration;

use crate::config::ConnectionConfig;

/// Budget for connection establishment. Applies only to the shell
/// client; the execution service call fails fast instead.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

/// Runs `connect_fn` until it succeeds or the policy is exhausted,
/// sleeping `policy.delay` between attempts and logging each outcome.
pub fn connect_with_retry<T, F>(mut connect_fn: F, policy: &RetryPolicy, what: &str) -> Result<T>
where
    F: FnMut() -> Result<T>,
{
    for attempt in 1..=policy.max_attempts {
        match connect_fn() {
            Ok(value) => {
                info!("Connected to {what} on attempt {attempt}/{}", policy.max_attempts);
                return Ok(value);
            }
            Err(e) => {
                warn!(
                    "Connection attempt {attempt}/{} to {what} failed: {e:#}",
                    policy.max_attempts
                );
                if attempt < policy.max_attempts {
                    std::thread::sleep(policy.delay);
                }
            }
        }
    }
    bail!(
        "unable to reach {what} after {} attempts",
        policy.max_attempts
    )
}

/// Remote command execution and file transfer, as the log collector
/// needs them. Kept as a trait so the collector can be driven by a
/// fake in tests.
pub trait RemoteShell {
    /// Runs one command to completion and returns its captured stdout.
    /// Stderr is discarded at this layer; diagnostic commands are
    /// expected to succeed, and failures surface as empty or malformed
    /// output caught by the caller.
    fn exec(&self, command: &str) -> Result<String>;

    /// Copies one remote file to a local path.
    fn download(&self, remote: &Path, local: &Path) -> Result<()>;
}

/// An interactive shell session on the DUT.
pub struct ShellSession {
    session: Session,
}

impl ShellSession {
    /// Connects to `addr` with the configured credentials, retrying on
    /// the given policy. Exhausting the policy returns an error the
    /// orchestrator treats as unrecoverable for this run.
    pub fn connect(addr: &str, config: &ConnectionConfig, policy: &RetryPolicy) -> Result<Self> {
        let target = format!("{}@{addr}:{}", config.username, config.port);
        let session = connect_with_retry(
            || Self::establish(addr, config),
            policy,
            &target,
        )?;
        Ok(ShellSession { session })
    }

    fn establish(addr: &str, config: &ConnectionConfig) -> Result<Session> {
        let tcp = TcpStream::connect((addr, config.port))
            .with_context(|| format!("failed to connect to {addr}:{}", config.port))?;
        let mut session = Session::new().context("failed to create SSH session")?;
        session.set_tcp_stream(tcp);
        session.handshake().context("SSH handshake failed")?;
        session
            .userauth_password(&config.username, &config.password)
            .context("SSH password authentication failed")?;
        if !session.authenticated() {
            bail!("SSH authentication failed for {}", config.username);
        }
        debug!("SSH session established to {addr}");
        Ok(session)
    }
}

impl RemoteShell for ShellSession {
    fn exec(&self, command: &str) -> Result<String> {
        debug!("Running remote command: {command}");
        let mut channel = self
            .session
            .channel_session()
            .context("failed to open an SSH channel")?;
        channel
            .exec(command)
            .with_context(|| format!("failed to run remote command: {command}"))?;

        let mut stdout = String::new();
        channel
            .read_to_string(&mut stdout)
            .context("failed to read remote command output")?;
        channel.send_eof().context("failed to close remote stdin")?;
        channel.wait_close().context("failed to close SSH channel")?;

        let exit_status = channel.exit_status()?;
        if exit_status != 0 {
            debug!("Remote command exited with {exit_status}: {command}");
        }
        Ok(stdout)
    }

    fn download(&self, remote: &Path, local: &Path) -> Result<()> {
        debug!("Downloading {} to {}", remote.display(), local.display());
        if let Some(parent) = local.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let (mut remote_file, _stat) = self
            .session
            .scp_recv(remote)
            .with_context(|| format!("failed to open remote file {}", remote.display()))?;
        let mut local_file = File::create(local)
            .with_context(|| format!("failed to create {}", local.display()))?;
        std::io::copy(&mut remote_file, &mut local_file)
            .with_context(|| format!("failed to transfer {}", remote.display()))?;

        remote_file.send_eof()?;
        remote_file.wait_eof()?;
        remote_file.close()?;
        remote_file.wait_close()?;
        Ok(())
    }
}

impl Drop for ShellSession {
    fn drop(&mut self) {
        if let Err(e) = self.session.disconnect(None, "client disconnect", None) {
            debug!("Failed to disconnect SSH session cleanly: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::time::Instant;

    fn policy(max_attempts: u32, delay_ms: u64) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            delay: Duration::from_millis(delay_ms),
        }
    }

    #[test]
    fn stops_after_exactly_max_attempts() {
        let attempts = Cell::new(0u32);
        let result: Result<()> = connect_with_retry(
            || {
                attempts.set(attempts.get() + 1);
                bail!("still booting")
            },
            &policy(4, 1),
            "dut",
        );
        assert!(result.is_err());
        assert_eq!(attempts.get(), 4);
    }

    #[test]
    fn returns_first_success() {
        let attempts = Cell::new(0u32);
        let value = connect_with_retry(
            || {
                attempts.set(attempts.get() + 1);
                if attempts.get() < 3 {
                    bail!("still booting")
                }
                Ok(attempts.get())
            },
            &policy(10, 1),
            "dut",
        )
        .unwrap();
        assert_eq!(value, 3);
        assert_eq!(attempts.get(), 3);
    }

    #[test]
    fn sleeps_between_attempts() {
        let start = Instant::now();
        let result: Result<()> =
            connect_with_retry(|| bail!("no route to host"), &policy(3, 20), "dut");
        assert!(result.is_err());
        // Two sleeps between three attempts.
        assert!(start.elapsed() >= Duration::from_millis(40));
    }

    #[test]
    fn exhaustion_names_the_budget() {
        let err = connect_with_retry::<(), _>(|| bail!("refused"), &policy(2, 1), "dut")
            .unwrap_err();
        assert!(err.to_string().contains("after 2 attempts"));
    }
}
