//! Child processes with timeouts and bounded output capture.

use std::io::Read;
use std::process::{Command, Stdio};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, instrument, warn};
use wait_timeout::ChildExt;

/// Limits applied to every child command.
#[derive(Debug, Clone, Copy)]
pub struct CaptureLimits {
    /// Maximum time before killing the command.
    pub timeout: Duration,
    /// Maximum bytes to keep from each of stdout/stderr.
    pub output_limit_bytes: usize,
}

/// Captured child process output, flattened to plain data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Captured {
    pub success: bool,
    pub exit_code: Option<i32>,
    pub timed_out: bool,
    pub stdout: String,
    pub stderr: String,
    pub stdout_dropped: usize,
    pub stderr_dropped: usize,
}

impl Captured {
    /// Stdout and stderr combined the way report pages show them: stdout
    /// first, stderr appended on the next line, truncation and timeout
    /// notices last.
    pub fn combined(&self) -> String {
        let mut out = self.stdout.clone();
        if !self.stderr.is_empty() {
            out.push('\n');
            out.push_str(&self.stderr);
        }
        let mut out = out.trim().to_string();
        if self.stdout_dropped > 0 {
            out.push_str(&format!(
                "\n[stdout truncated {} bytes]",
                self.stdout_dropped
            ));
        }
        if self.stderr_dropped > 0 {
            out.push_str(&format!(
                "\n[stderr truncated {} bytes]",
                self.stderr_dropped
            ));
        }
        if self.timed_out {
            out.push_str("\n[command timed out]");
        }
        out
    }
}

/// Run a command to completion, draining output concurrently so a chatty
/// child cannot deadlock on a full pipe.
///
/// Bytes beyond the limit are counted and discarded. On timeout the child is
/// killed and the capture is marked `timed_out` (never `success`).
#[instrument(skip_all, fields(timeout_secs = limits.timeout.as_secs()))]
pub fn capture_command(mut cmd: Command, limits: CaptureLimits) -> Result<Captured> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    debug!("spawning child process");
    let mut child = cmd.spawn().context("spawn command")?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow!("stdout was not piped"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow!("stderr was not piped"))?;

    let limit = limits.output_limit_bytes;
    let stdout_handle = thread::spawn(move || drain_limited(stdout, limit));
    let stderr_handle = thread::spawn(move || drain_limited(stderr, limit));

    let mut timed_out = false;
    let status = match child.wait_timeout(limits.timeout).context("wait for command")? {
        Some(status) => status,
        None => {
            warn!(
                timeout_secs = limits.timeout.as_secs(),
                "command timed out, killing"
            );
            timed_out = true;
            child.kill().context("kill command")?;
            child.wait().context("wait after kill")?
        }
    };

    let (stdout, stdout_dropped) = join_drained(stdout_handle).context("join stdout")?;
    let (stderr, stderr_dropped) = join_drained(stderr_handle).context("join stderr")?;
    if stdout_dropped > 0 || stderr_dropped > 0 {
        warn!(stdout_dropped, stderr_dropped, "output truncated");
    }

    debug!(exit_code = ?status.code(), timed_out, "command finished");
    Ok(Captured {
        success: !timed_out && status.success(),
        exit_code: status.code(),
        timed_out,
        stdout: String::from_utf8_lossy(&stdout).to_string(),
        stderr: String::from_utf8_lossy(&stderr).to_string(),
        stdout_dropped,
        stderr_dropped,
    })
}

fn join_drained(handle: thread::JoinHandle<Result<(Vec<u8>, usize)>>) -> Result<(Vec<u8>, usize)> {
    match handle.join() {
        Ok(result) => result,
        Err(_) => Err(anyhow!("output reader thread panicked")),
    }
}

fn drain_limited<R: Read>(mut reader: R, limit: usize) -> Result<(Vec<u8>, usize)> {
    let mut kept = Vec::new();
    let mut dropped = 0usize;
    let mut chunk = [0u8; 8192];

    loop {
        let n = reader.read(&mut chunk).context("read output")?;
        if n == 0 {
            break;
        }
        let room = limit.saturating_sub(kept.len());
        let keep = n.min(room);
        kept.extend_from_slice(&chunk[..keep]);
        dropped += n - keep;
    }

    Ok((kept, dropped))
}
