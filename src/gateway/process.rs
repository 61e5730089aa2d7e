//! Child process execution with bounded output capture.

use crate::engine::command::CommandLine;
use crate::error::{PartialOutput, SpawnError};
use crate::model::JobEvent;
use std::path::Path;
use std::process::Stdio;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::sync::mpsc::UnboundedSender;

/// Captured result of a finished process.
#[derive(Debug, Clone, Default)]
pub struct ProcessOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
}

/// Shared byte budget for stdout + stderr.
struct CaptureBudget {
    limit: usize,
    used: AtomicUsize,
}

impl CaptureBudget {
    fn new(limit: usize) -> Self {
        Self {
            limit,
            used: AtomicUsize::new(0),
        }
    }

    /// Account for `n` more bytes; false once the limit is crossed.
    fn charge(&self, n: usize) -> bool {
        let before = self.used.fetch_add(n, Ordering::Relaxed);
        before.saturating_add(n) <= self.limit
    }
}

/// Read size per stream; the budget is charged per read.
const CHUNK_SIZE: usize = 8 * 1024;
/// Bytes of each stream kept in capture errors.
const PARTIAL_TAIL: usize = 16 * 1024;

enum PumpError {
    Io(std::io::Error),
    Overflow,
}

/// Forwards complete lines to the event sink. Both '\n' and '\r' end a line so
/// progress bars that redraw in place still reach the output tail.
struct LineSplitter<'a> {
    pending: Vec<u8>,
    is_stderr: bool,
    events: Option<&'a UnboundedSender<JobEvent>>,
}

impl LineSplitter<'_> {
    fn feed(&mut self, bytes: &[u8]) {
        if self.events.is_none() {
            return;
        }
        for &b in bytes {
            if b == b'\n' || b == b'\r' {
                self.flush();
            } else {
                self.pending.push(b);
            }
        }
    }

    fn flush(&mut self) {
        let Some(tx) = self.events else { return };
        let text = String::from_utf8_lossy(&self.pending);
        let text = text.trim_end();
        if !text.is_empty() {
            let _ = tx.send(JobEvent::OutputLine {
                line: text.to_string(),
                stderr: self.is_stderr,
            });
        }
        self.pending.clear();
    }
}

async fn pump<R: AsyncRead + Unpin>(
    mut reader: R,
    is_stderr: bool,
    budget: &CaptureBudget,
    events: Option<&UnboundedSender<JobEvent>>,
    captured: &mut Vec<u8>,
) -> Result<(), PumpError> {
    let mut lines = LineSplitter {
        pending: Vec::new(),
        is_stderr,
        events,
    };
    let mut buf = vec![0u8; CHUNK_SIZE];
    loop {
        let n = reader.read(&mut buf).await.map_err(PumpError::Io)?;
        if n == 0 {
            break;
        }
        if !budget.charge(n) {
            return Err(PumpError::Overflow);
        }
        captured.extend_from_slice(&buf[..n]);
        lines.feed(&buf[..n]);
    }
    lines.flush();
    Ok(())
}

fn tail_text(bytes: &[u8]) -> String {
    let start = bytes.len().saturating_sub(PARTIAL_TAIL);
    String::from_utf8_lossy(&bytes[start..]).into_owned()
}

fn partial(out: &[u8], err: &[u8]) -> PartialOutput {
    PartialOutput {
        stdout: tail_text(out),
        stderr: tail_text(err),
    }
}

/// Run `command` in `cwd`, collecting both streams up to `max_buffer_bytes` combined.
///
/// The child is killed when the limit is crossed or when the returned future is dropped.
pub async fn run_captured(
    command: &CommandLine,
    cwd: &Path,
    max_buffer_bytes: usize,
    events: Option<&UnboundedSender<JobEvent>>,
) -> Result<ProcessOutput, SpawnError> {
    let program = command.flavor.program();
    let mut cmd = Command::new(program);
    #[cfg(windows)]
    {
        // cmd.exe does its own parsing of the /C payload.
        cmd.arg("/C").raw_arg(&command.line);
    }
    #[cfg(not(windows))]
    {
        cmd.args(command.shell_args());
    }
    cmd.current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd.spawn().map_err(|source| SpawnError::Spawn {
        program: program.to_string(),
        source,
    })?;
    tracing::debug!(pid = ?child.id(), "spawned enhancement process");

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| std::io::Error::other("child stdout unavailable"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| std::io::Error::other("child stderr unavailable"))?;

    let budget = CaptureBudget::new(max_buffer_bytes);
    let mut out = Vec::new();
    let mut err = Vec::new();
    let captured = tokio::try_join!(
        pump(stdout, false, &budget, events, &mut out),
        pump(stderr, true, &budget, events, &mut err),
    );

    match captured {
        Ok(_) => {}
        Err(PumpError::Overflow) => {
            tracing::warn!(limit = max_buffer_bytes, "output capture limit exceeded, killing process");
            let _ = child.kill().await;
            return Err(SpawnError::BufferExceeded {
                limit: max_buffer_bytes,
                partial: partial(&out, &err),
            });
        }
        Err(PumpError::Io(source)) => {
            let _ = child.kill().await;
            return Err(SpawnError::Capture {
                source,
                partial: partial(&out, &err),
            });
        }
    }

    let status = child.wait().await?;
    tracing::debug!(?status, "enhancement process exited");

    Ok(ProcessOutput {
        stdout: String::from_utf8_lossy(&out).into_owned(),
        stderr: String::from_utf8_lossy(&err).into_owned(),
        exit_code: status.code(),
    })
}
