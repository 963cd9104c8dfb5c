// ABOUTME: Subprocess spawning with output caps, env allowlisting, and group cancellation
// ABOUTME: On cancel the process group gets SIGTERM, a 5s grace wait, then SIGKILL
//
// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2026 the mcpshell authors

use std::env;
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::ToolError;

/// Maximum captured bytes per stream (10 MiB)
const MAX_OUTPUT_BYTES: usize = 10 * 1024 * 1024;

/// Grace window between SIGTERM and SIGKILL on cancellation
const CANCEL_GRACE: Duration = Duration::from_secs(5);

/// Environment keys always forwarded so shells and basic utilities work
const BASELINE_ENV_KEYS: &[&str] = &["HOME", "PATH", "TERM", "USER", "LANG"];

/// A fully materialized command ready to spawn
#[derive(Debug, Clone)]
pub struct CommandSpec {
    /// Program to execute
    pub program: String,
    /// Arguments, already split
    pub args: Vec<String>,
    /// Tool-declared environment keys forwarded in addition to the baseline
    pub env_allowlist: Vec<String>,
}

/// Captured result of a completed subprocess
#[derive(Debug)]
pub struct ProcessOutput {
    /// Captured stdout, lossily decoded
    pub stdout: String,
    /// Captured stderr, lossily decoded
    pub stderr: String,
    /// Exit code (-1 when terminated by signal)
    pub exit_code: i32,
}

/// Read a capped byte stream into a buffer
async fn read_capped<R: AsyncReadExt + Unpin>(stream: Option<R>, limit: usize) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(mut reader) = stream {
        let mut tmp = [0u8; 8192];
        loop {
            match reader.read(&mut tmp).await {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    let remaining = limit.saturating_sub(buf.len());
                    buf.extend_from_slice(&tmp[..n.min(remaining)]);
                    if buf.len() >= limit {
                        break;
                    }
                }
            }
        }
    }
    buf
}

/// Apply the environment allowlist: clear everything, then re-inject the
/// baseline keys plus the tool's declared keys from the host environment
fn apply_env_allowlist(cmd: &mut Command, allowlist: &[String]) {
    cmd.env_clear();
    let mut forwarded = 0usize;
    for key in BASELINE_ENV_KEYS
        .iter()
        .copied()
        .chain(allowlist.iter().map(String::as_str))
    {
        if let Ok(value) = env::var(key) {
            cmd.env(key, value);
            forwarded += 1;
        }
    }
    debug!(forwarded, extra = allowlist.len(), "Applied env allowlist");
}

/// Spawn the command and wait for completion under the cancellation token
///
/// The child is placed in its own process group. Cancellation sends
/// `SIGTERM` to the group, waits out the grace window, then `SIGKILL`s;
/// the call returns `Canceled`. Completion returns captured output with
/// the exit code — non-zero exits are NOT errors at this layer, callers
/// decide how to surface them.
///
/// # Errors
///
/// - `ExecError` when the process cannot be spawned
/// - `Canceled` when the token fires before the child exits
pub async fn run_command(
    spec: &CommandSpec,
    token: &CancellationToken,
) -> Result<ProcessOutput, ToolError> {
    let mut cmd = Command::new(&spec.program);
    cmd.args(&spec.args);
    apply_env_allowlist(&mut cmd, &spec.env_allowlist);
    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());
    #[cfg(unix)]
    cmd.process_group(0);

    let start = Instant::now();

    let mut child = cmd.spawn().map_err(|e| {
        ToolError::exec(format!("failed to start '{}': {e}", spec.program))
    })?;

    let stdout_task = tokio::spawn(read_capped(child.stdout.take(), MAX_OUTPUT_BYTES));
    let stderr_task = tokio::spawn(read_capped(child.stderr.take(), MAX_OUTPUT_BYTES));

    let status = tokio::select! {
        status = child.wait() => {
            status.map_err(|e| ToolError::exec(format!("failed to wait for subprocess: {e}")))?
        }
        () = token.cancelled() => {
            warn!(program = %spec.program, "Cancellation requested, terminating process group");
            terminate(&mut child).await;
            return Err(ToolError::canceled());
        }
    };

    let stdout = stdout_task.await.unwrap_or_default();
    let stderr = stderr_task.await.unwrap_or_default();
    let exit_code = status.code().unwrap_or(-1);

    debug!(
        program = %spec.program,
        exit_code,
        duration_ms = start.elapsed().as_millis() as u64,
        "Subprocess completed"
    );

    Ok(ProcessOutput {
        stdout: String::from_utf8_lossy(&stdout).into_owned(),
        stderr: String::from_utf8_lossy(&stderr).into_owned(),
        exit_code,
    })
}

/// Terminate the child's process group: SIGTERM, grace wait, SIGKILL
async fn terminate(child: &mut Child) {
    #[cfg(unix)]
    {
        use nix::sys::signal::{killpg, Signal};
        use nix::unistd::Pid;

        if let Some(pid) = child.id() {
            let pgid = Pid::from_raw(pid as i32);
            if let Err(e) = killpg(pgid, Signal::SIGTERM) {
                debug!(error = %e, "SIGTERM to process group failed");
            }
            match tokio::time::timeout(CANCEL_GRACE, child.wait()).await {
                Ok(_) => return,
                Err(_) => {
                    warn!("Grace window elapsed, sending SIGKILL to process group");
                    let _ = killpg(pgid, Signal::SIGKILL);
                }
            }
        }
        let _ = child.wait().await;
    }
    #[cfg(not(unix))]
    {
        let _ = child.kill().await;
        let _ = child.wait().await;
    }
}
