//! Client for the remote test-execution service.
//!
//! The client host runs an execution service on a well-known port that
//! accepts exactly one kind of call: run this test script with these
//! assets and variables, and hand back the verdict plus an HTML report.
//! The call is synchronous and long-running, so the connection carries
//! an extended read timeout rather than a liveness heartbeat.
//!
//! Wire format: one length-prefixed JSON message per direction (u32
//! big-endian length, then the body). Binary payloads travel base64
//! encoded.

use crate::assets::AssetBundle;
use anyhow::{Context, Result, bail};
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

/// Port the execution service listens on.
pub const EXECUTOR_PORT: u16 = 60000;

/// How long a single run call may block. Installer suites routinely
/// take over half an hour, so this must not be mistaken for a hung
/// connection below it.
pub const SYNC_CALL_TIMEOUT: Duration = Duration::from_secs(2400);

/// Upper bound on a response frame. Reports are HTML documents, orders
/// of magnitude below this; anything larger means a corrupt prefix.
const MAX_FRAME_LEN: usize = 64 * 1024 * 1024;

/// Everything the service needs to run one suite.
pub struct ExecutionRequest {
    /// The test script itself.
    pub script: Vec<u8>,
    /// Supporting files, keyed by base name.
    pub assets: AssetBundle,
    /// Robot variables handed to the suite.
    pub variables: BTreeMap<String, String>,
}

/// Outcome of one run call.
///
/// `passed = false` is a legitimate test failure, not an infrastructure
/// error; those surface as `Err` from [`ExecutorClient::run`].
#[derive(Debug)]
pub struct ExecutionResult {
    pub passed: bool,
    pub report_html: String,
}

#[derive(Serialize)]
struct WireRequest<'a> {
    op: &'static str,
    script: String,
    assets: BTreeMap<&'a str, String>,
    variables: &'a BTreeMap<String, String>,
}

#[derive(Deserialize)]
struct WireResponse {
    status: bool,
    html: String,
}

/// A persistent connection to the execution service.
#[derive(Debug)]
pub struct ExecutorClient {
    stream: TcpStream,
}

impl ExecutorClient {
    /// Connects to the execution service on `host`.
    ///
    /// No retry here: by the time we dial this port an external
    /// provisioning step has already confirmed the host is up, so a
    /// refused connection is an immediate, fatal error.
    pub fn connect(host: &str) -> Result<Self> {
        info!("Connecting to execution service at {host}:{EXECUTOR_PORT}");
        Self::connect_addr((host, EXECUTOR_PORT))
    }

    fn connect_addr(addr: impl ToSocketAddrs) -> Result<Self> {
        let stream = TcpStream::connect(addr)
            .context("failed to connect to the execution service")?;
        stream
            .set_read_timeout(Some(SYNC_CALL_TIMEOUT))
            .context("failed to configure the call timeout")?;
        Ok(ExecutorClient { stream })
    }

    /// Runs one suite to completion. Blocks until the service answers
    /// or the call timeout fires; there is no partial result.
    pub fn run(&mut self, request: &ExecutionRequest) -> Result<ExecutionResult> {
        let wire = WireRequest {
            op: "robot_run",
            script: BASE64.encode(&request.script),
            assets: request
                .assets
                .iter()
                .map(|(name, content)| (name.as_str(), BASE64.encode(content)))
                .collect(),
            variables: &request.variables,
        };
        let body = serde_json::to_vec(&wire).context("failed to encode the run request")?;
        debug!(
            "Dispatching run call: {} asset(s), {} variable(s), {} byte body",
            request.assets.len(),
            request.variables.len(),
            body.len()
        );

        self.write_frame(&body)?;
        let reply = self.read_frame()?;

        let response: WireResponse =
            serde_json::from_slice(&reply).context("malformed response from the execution service")?;
        Ok(ExecutionResult {
            passed: response.status,
            report_html: response.html,
        })
    }

    fn write_frame(&mut self, body: &[u8]) -> Result<()> {
        let len = u32::try_from(body.len()).context("run request too large to frame")?;
        self.stream
            .write_all(&len.to_be_bytes())
            .and_then(|()| self.stream.write_all(body))
            .and_then(|()| self.stream.flush())
            .context("failed to send the run request")
    }

    fn read_frame(&mut self) -> Result<Vec<u8>> {
        let mut len_buf = [0u8; 4];
        self.read_exact_or_timeout(&mut len_buf)?;
        let len = u32::from_be_bytes(len_buf) as usize;
        if len > MAX_FRAME_LEN {
            bail!("execution service sent an oversized frame ({len} bytes)");
        }
        let mut body = vec![0u8; len];
        self.read_exact_or_timeout(&mut body)?;
        Ok(body)
    }

    fn read_exact_or_timeout(&mut self, buf: &mut [u8]) -> Result<()> {
        match self.stream.read_exact(buf) {
            Ok(()) => Ok(()),
            Err(e)
                if e.kind() == std::io::ErrorKind::WouldBlock
                    || e.kind() == std::io::ErrorKind::TimedOut =>
            {
                bail!(
                    "execution service call timed out after {}s",
                    SYNC_CALL_TIMEOUT.as_secs()
                )
            }
            Err(e) => Err(e).context("failed to read from the execution service"),
        }
    }
}
