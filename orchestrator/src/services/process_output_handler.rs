//! Helper to handle child process stdout/stderr output
//!
//! Children either inherit the orchestrator's stdout/stderr, or have their
//! output piped and drained line by line into debug events so that a full
//! pipe never blocks them.

use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Child;
use shared::{ProcessId, process_debug};

/// Configure stdio for a child process
pub fn configure_child_stdio(
    cmd: &mut tokio::process::Command,
    inherit_output: bool,
    label: &str,
) {
    if inherit_output {
        cmd.stdout(Stdio::inherit())
           .stderr(Stdio::inherit())
           .stdin(Stdio::null());

        process_debug!(
            ProcessId::current(),
            "🔗 {} output will be forwarded to parent stdout/stderr",
            label
        );
    } else {
        cmd.stdout(Stdio::piped())
           .stderr(Stdio::piped())
           .stdin(Stdio::null());

        process_debug!(
            ProcessId::current(),
            "📥 {} output will be captured into debug logs",
            label
        );
    }
}

fn drain_lines<T>(stream: T, label: String, channel: &'static str)
where
    T: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(stream).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            process_debug!(ProcessId::current(), "[{} {}] {}", label, channel, line);
        }
    });
}

/// If output was piped, spawn tasks that consume it
pub fn spawn_output_consumers(mut child: Child, label: String) -> Child {
    if let Some(stdout) = child.stdout.take() {
        drain_lines(stdout, label.clone(), "stdout");
    }

    if let Some(stderr) = child.stderr.take() {
        drain_lines(stderr, label, "stderr");
    }

    child
}
