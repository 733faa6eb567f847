//! Bounded child-process runner used by the sendmail transport.
//!
//! The child gets its input on stdin, both output pipes are drained on their
//! own threads so a chatty child can't block on a full pipe, and the whole run
//! is capped by a deadline after which the child is killed.

use std::io::{Read, Write};
use std::process::{Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, instrument, warn};
use wait_timeout::ChildExt;

/// Bytes kept from one output stream plus how many were thrown away.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Captured {
    pub bytes: Vec<u8>,
    pub dropped: usize,
}

impl Captured {
    fn read_from<R: Read>(mut reader: R, keep: usize) -> Result<Self> {
        let mut captured = Self::default();
        let mut chunk = [0u8; 4096];
        loop {
            let n = reader.read(&mut chunk).context("read child output")?;
            if n == 0 {
                return Ok(captured);
            }
            let room = keep.saturating_sub(captured.bytes.len()).min(n);
            captured.bytes.extend_from_slice(&chunk[..room]);
            captured.dropped += n - room;
        }
    }
}

#[derive(Debug)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: Captured,
    pub stderr: Captured,
    /// The deadline passed and the child was killed.
    pub timed_out: bool,
}

impl CommandOutput {
    /// Trimmed stderr for error messages, noting any truncation.
    pub fn stderr_text(&self) -> String {
        let text = String::from_utf8_lossy(&self.stderr.bytes).trim().to_string();
        match self.stderr.dropped {
            0 => text,
            dropped => format!("{text} (+{dropped} bytes)"),
        }
    }
}

/// Run `cmd`, feed it `input`, and wait at most `timeout`.
///
/// Only spawn and wait failures are errors; a non-zero exit or a timeout is
/// reported through the returned [`CommandOutput`].
#[instrument(skip_all, fields(timeout_ms = timeout.as_millis() as u64))]
pub fn run_command_with_timeout(
    mut cmd: Command,
    input: Option<&[u8]>,
    timeout: Duration,
    keep_bytes: usize,
) -> Result<CommandOutput> {
    cmd.stdin(if input.is_some() {
        Stdio::piped()
    } else {
        Stdio::null()
    })
    .stdout(Stdio::piped())
    .stderr(Stdio::piped());

    let mut child = cmd.spawn().context("spawn command")?;
    debug!(pid = child.id(), "child spawned");

    let stdout = drain(child.stdout.take(), keep_bytes)?;
    let stderr = drain(child.stderr.take(), keep_bytes)?;

    if let Some(input) = input {
        let mut pipe = child.stdin.take().context("child stdin missing")?;
        if let Err(err) = pipe.write_all(input) {
            warn!(%err, "child stopped reading stdin");
        }
        // `pipe` drops here, closing stdin.
    }

    let (status, timed_out) = match child.wait_timeout(timeout).context("wait for command")? {
        Some(status) => (status, false),
        None => {
            warn!("deadline passed, killing child");
            child.kill().context("kill command")?;
            (child.wait().context("reap killed command")?, true)
        }
    };

    let output = CommandOutput {
        status,
        stdout: collect(stdout)?,
        stderr: collect(stderr)?,
        timed_out,
    };
    debug!(exit_code = ?output.status.code(), timed_out, "child finished");
    Ok(output)
}

fn drain<R: Read + Send + 'static>(
    pipe: Option<R>,
    keep_bytes: usize,
) -> Result<JoinHandle<Result<Captured>>> {
    let pipe = pipe.ok_or_else(|| anyhow!("child output not piped"))?;
    Ok(thread::spawn(move || Captured::read_from(pipe, keep_bytes)))
}

fn collect(handle: JoinHandle<Result<Captured>>) -> Result<Captured> {
    handle
        .join()
        .map_err(|_| anyhow!("output reader panicked"))?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feeds_stdin_and_captures_stdout() {
        let output = run_command_with_timeout(
            Command::new("cat"),
            Some(b"ho ho ho"),
            Duration::from_secs(5),
            1024,
        )
        .expect("run cat");
        assert!(output.status.success());
        assert!(!output.timed_out);
        assert_eq!(output.stdout.bytes, b"ho ho ho");
    }

    #[test]
    fn kills_child_after_deadline() {
        let mut cmd = Command::new("sleep");
        cmd.arg("5");
        let output =
            run_command_with_timeout(cmd, None, Duration::from_millis(100), 1024).expect("run");
        assert!(output.timed_out);
        assert!(!output.status.success());
    }

    #[test]
    fn keeps_only_the_first_bytes_of_stderr() {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg("printf 'abcdefghij' >&2; exit 3");
        let output = run_command_with_timeout(cmd, None, Duration::from_secs(5), 4).expect("run");
        assert_eq!(output.status.code(), Some(3));
        assert_eq!(output.stderr.bytes, b"abcd");
        assert_eq!(output.stderr_text(), "abcd (+6 bytes)");
    }

    #[test]
    fn spawn_failure_is_an_error() {
        let result = run_command_with_timeout(
            Command::new("/nonexistent/santa-helper"),
            None,
            Duration::from_secs(1),
            16,
        );
        assert!(result.is_err());
    }
}
