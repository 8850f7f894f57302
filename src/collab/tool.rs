//! Child-process execution for the nmap-backed collaborators.

use std::io::ErrorKind;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;

/// Why a tool run produced no report.
#[derive(Debug)]
pub(crate) enum ToolFailure {
    TimedOut,
    NotFound,
    Spawn(std::io::Error),
    Exit { status: ExitStatus, stderr: String },
}

/// `stderr` prefixed with ": ", or nothing when it is blank.
pub(crate) fn stderr_suffix(stderr: &str) -> String {
    if stderr.is_empty() {
        String::new()
    } else {
        format!(": {stderr}")
    }
}

/// Run `cmd` to completion within `limit` and return its stdout.
///
/// The child is killed if the limit expires.
pub(crate) async fn run(mut cmd: Command, limit: Duration) -> Result<String, ToolFailure> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let output = match timeout(limit, cmd.output()).await {
        Err(_) => return Err(ToolFailure::TimedOut),
        Ok(Err(e)) if e.kind() == ErrorKind::NotFound => return Err(ToolFailure::NotFound),
        Ok(Err(e)) => return Err(ToolFailure::Spawn(e)),
        Ok(Ok(output)) => output,
    };

    if !output.status.success() {
        return Err(ToolFailure::Exit {
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_stdout_is_captured() {
        let mut cmd = Command::new("echo");
        cmd.arg("report");
        let stdout = run(cmd, Duration::from_secs(5)).await.unwrap();
        assert_eq!(stdout.trim(), "report");
    }

    #[tokio::test]
    async fn test_failures_are_classified() {
        let missing = run(Command::new("/nonexistent/bin/tool"), Duration::from_secs(5)).await;
        assert!(matches!(missing, Err(ToolFailure::NotFound)));

        let mut failing = Command::new("sh");
        failing.args(["-c", "echo denied >&2; exit 1"]);
        match run(failing, Duration::from_secs(5)).await {
            Err(ToolFailure::Exit { status, stderr }) => {
                assert_eq!(status.code(), Some(1));
                assert_eq!(stderr_suffix(&stderr), ": denied");
            }
            other => panic!("unexpected result {other:?}"),
        }

        let mut slow = Command::new("sleep");
        slow.arg("5");
        let slow = run(slow, Duration::from_millis(100)).await;
        assert!(matches!(slow, Err(ToolFailure::TimedOut)));
    }
}
