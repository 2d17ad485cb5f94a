//! Child process execution with tail-bounded output capture.
//!
//! Terraform reports its verdict at the end of a run, so when a stream outgrows
//! the limit it is the front that gets dropped.

use std::collections::VecDeque;
use std::io::Read;
use std::process::{Command, ExitStatus, Stdio};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, error, instrument, warn};
use wait_timeout::ChildExt;

const READ_CHUNK_BYTES: usize = 8192;

/// The retained end of one output stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamTail {
    pub bytes: Vec<u8>,
    /// Bytes discarded from the front to stay within the limit.
    pub dropped: usize,
}

impl StreamTail {
    /// Lossy text of the retained bytes.
    ///
    /// When the front was dropped the text opens with a one-line notice, and
    /// the first line is skipped if it was cut, so only whole lines remain.
    pub fn into_text(self, stream: &str) -> String {
        if self.dropped == 0 {
            return String::from_utf8_lossy(&self.bytes).into_owned();
        }
        let cut = self
            .bytes
            .iter()
            .position(|&b| b == b'\n')
            .map_or(0, |pos| pos + 1);
        format!(
            "[{stream}: earlier {} bytes dropped]\n{}",
            self.dropped + cut,
            String::from_utf8_lossy(&self.bytes[cut..])
        )
    }
}

/// Exit status and the captured tails of a finished child.
#[derive(Debug)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: StreamTail,
    pub stderr: StreamTail,
    pub timed_out: bool,
}

/// Run a command, draining both pipes on reader threads so neither can block
/// the child.
///
/// At most `output_limit_bytes` per stream are held in memory; older bytes are
/// discarded as new ones arrive. With `timeout: None` the call waits for as
/// long as the child runs.
#[instrument(skip_all, fields(timeout_secs = timeout.map(|t| t.as_secs()), output_limit_bytes))]
pub fn run_command(
    mut cmd: Command,
    timeout: Option<Duration>,
    output_limit_bytes: usize,
) -> Result<CommandOutput> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    debug!("spawning child process");
    let mut child = cmd.spawn().map_err(|err| {
        error!(err = %err, "failed to spawn command");
        anyhow::Error::new(err).context("spawn command")
    })?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow!("stdout was not piped"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow!("stderr was not piped"))?;
    let stdout_reader = thread::spawn(move || read_tail(stdout, output_limit_bytes));
    let stderr_reader = thread::spawn(move || read_tail(stderr, output_limit_bytes));

    let (status, timed_out) = match timeout {
        None => (child.wait().context("wait for command")?, false),
        Some(limit) => match child.wait_timeout(limit).context("wait for command")? {
            Some(status) => (status, false),
            None => {
                warn!(timeout_secs = limit.as_secs(), "command timed out, killing");
                child.kill().context("kill command")?;
                (child.wait().context("wait command after kill")?, true)
            }
        },
    };

    let stdout = collect(stdout_reader).context("collect stdout")?;
    let stderr = collect(stderr_reader).context("collect stderr")?;
    if stdout.dropped > 0 || stderr.dropped > 0 {
        warn!(
            stdout_dropped = stdout.dropped,
            stderr_dropped = stderr.dropped,
            "kept only the end of the output"
        );
    }

    debug!(exit_code = ?status.code(), timed_out, "command finished");
    Ok(CommandOutput {
        status,
        stdout,
        stderr,
        timed_out,
    })
}

fn collect(reader: thread::JoinHandle<Result<StreamTail>>) -> Result<StreamTail> {
    reader
        .join()
        .map_err(|_| anyhow!("output reader thread panicked"))?
}

/// Read `reader` to the end, keeping only its last `limit` bytes.
fn read_tail<R: Read>(mut reader: R, limit: usize) -> Result<StreamTail> {
    let mut kept: VecDeque<u8> = VecDeque::with_capacity(limit.min(16 * READ_CHUNK_BYTES));
    let mut dropped = 0usize;
    let mut chunk = [0u8; READ_CHUNK_BYTES];

    loop {
        let n = reader.read(&mut chunk).context("read output")?;
        if n == 0 {
            break;
        }
        kept.extend(&chunk[..n]);
        let excess = kept.len().saturating_sub(limit);
        if excess > 0 {
            kept.drain(..excess);
            dropped += excess;
        }
    }

    Ok(StreamTail {
        bytes: kept.into(),
        dropped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tail_reader_keeps_the_last_bytes() {
        let tail = read_tail(&b"abcdefghij"[..], 4).expect("read");
        assert_eq!(tail.bytes, b"ghij");
        assert_eq!(tail.dropped, 6);
    }

    #[test]
    fn tail_reader_keeps_everything_under_the_limit() {
        let tail = read_tail(&b"Apply complete!\n"[..], 1000).expect("read");
        assert_eq!(tail.dropped, 0);
        assert_eq!(tail.into_text("apply stdout"), "Apply complete!\n");
    }

    #[test]
    fn tail_spanning_many_chunks_ends_with_the_last_line() {
        let mut input = "Still creating...\n".repeat(2000);
        input.push_str("Apply complete! Resources: 1 added.\n");
        let tail = read_tail(input.as_bytes(), 100).expect("read");
        assert_eq!(tail.bytes.len(), 100);
        assert_eq!(tail.dropped, input.len() - 100);
        assert!(tail.bytes.ends_with(b"Apply complete! Resources: 1 added.\n"));
    }

    #[test]
    fn notice_leads_and_cut_line_is_skipped() {
        let tail = read_tail(&b"one\ntwo\nthree\n"[..], 8).expect("read");
        assert_eq!(tail.bytes, b"o\nthree\n");
        assert_eq!(
            tail.into_text("plan stdout"),
            "[plan stdout: earlier 8 bytes dropped]\nthree\n"
        );
    }

    #[cfg(unix)]
    fn sh(script: &str) -> Command {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(script);
        cmd
    }

    #[cfg(unix)]
    #[test]
    fn captures_both_streams_and_status() {
        let output = run_command(sh("echo out; echo err >&2; exit 3"), None, 1000).expect("run");
        assert_eq!(output.status.code(), Some(3));
        assert_eq!(output.stdout.into_text("stdout"), "out\n");
        assert_eq!(output.stderr.into_text("stderr"), "err\n");
        assert!(!output.timed_out);
    }

    #[cfg(unix)]
    #[test]
    fn child_output_over_the_limit_keeps_its_tail() {
        let output = run_command(sh("printf 'abcdefghij'"), None, 4).expect("run");
        assert_eq!(output.stdout.bytes, b"ghij");
        assert_eq!(output.stdout.dropped, 6);
        assert_eq!(output.stderr, StreamTail::default());
    }

    #[cfg(unix)]
    #[test]
    fn kills_child_after_timeout() {
        let output =
            run_command(sh("exec sleep 5"), Some(Duration::from_millis(100)), 1000).expect("run");
        assert!(output.timed_out);
        assert_eq!(output.status.code(), None);
    }

    #[test]
    fn spawn_failure_is_an_error() {
        let err = run_command(
            Command::new("/nonexistent/infra-runner-test-binary"),
            None,
            1000,
        )
        .unwrap_err();
        assert!(err.to_string().contains("spawn command"));
    }
}
