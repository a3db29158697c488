//! Run an external program with a byte buffer piped to its stdin.

use std::io;
use std::process::{Output, Stdio};

use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

/// Spawn `command`, write `input` to its stdin, close stdin, and wait for exit.
///
/// Stdin is written concurrently with collecting stdout so a child that
/// produces output before reading all of its input cannot deadlock us.
/// A child that exits without draining stdin is not an error here; its
/// exit status decides.
pub async fn run_with_stdin(mut command: Command, input: &[u8]) -> io::Result<Output> {
    let mut child = command
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()?;

    let mut stdin = child
        .stdin
        .take()
        .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "child stdin unavailable"))?;

    let writer = async move {
        let result = stdin.write_all(input).await;
        drop(stdin);
        result
    };

    let (written, output) = tokio::join!(writer, child.wait_with_output());
    if let Err(e) = written {
        if e.kind() == io::ErrorKind::BrokenPipe {
            debug!("child closed stdin early");
        } else {
            return Err(e);
        }
    }
    output
}

/// Short description of a failed exit for log lines.
pub fn describe_failure(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stderr = stderr.trim();
    if stderr.is_empty() {
        format!("exited with {}", output.status)
    } else {
        format!("exited with {}: {stderr}", output.status)
    }
}
