//! Child-process execution
//!
//! Stages talk to external tools only through [`ToolRunner`], so tests can
//! swap in [`super::MockToolRunner`] and count invocations.

use super::external::{ToolInvocation, ToolOutput, ToolSpec, KILLED_BY_SIGNAL};
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Instant;
use tokio::process::Command;
use tracing::{debug, error, info, warn};

#[async_trait]
pub trait ToolRunner: Send + Sync {
    /// Locate the binary for `spec`
    fn resolve(&self, spec: &ToolSpec) -> Option<PathBuf> {
        spec.resolve()
    }

    /// Run to completion, failure or timeout
    ///
    /// Never returns an error: spawn failures and timeouts are reported
    /// through the exit code of the returned [`ToolOutput`].
    async fn run(&self, invocation: &ToolInvocation) -> ToolOutput;
}

/// Runs invocations as real child processes
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessRunner;

#[async_trait]
impl ToolRunner for ProcessRunner {
    async fn run(&self, invocation: &ToolInvocation) -> ToolOutput {
        let start = Instant::now();
        info!(tool = %invocation.description, "Running");
        debug!(command = %invocation.command_line(), cwd = %invocation.cwd.display(), "Spawning");

        let mut command = Command::new(&invocation.program);
        command
            .args(&invocation.args)
            .current_dir(&invocation.cwd)
            .envs(&invocation.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                error!(tool = %invocation.description, error = %e, "Failed to start");
                return ToolOutput::spawn_failed(format!(
                    "Failed to start {}: {}",
                    invocation.program.display(),
                    e
                ));
            }
        };

        // Dropping the wait future on timeout drops the child, which kills it
        let output =
            match tokio::time::timeout(invocation.timeout, child.wait_with_output()).await {
                Ok(Ok(output)) => output,
                Ok(Err(e)) => {
                    error!(tool = %invocation.description, error = %e, "Failed to collect output");
                    return ToolOutput::spawn_failed(format!(
                        "Failed to collect output of {}: {}",
                        invocation.program.display(),
                        e
                    ));
                }
                Err(_) => {
                    error!(
                        tool = %invocation.description,
                        timeout_secs = invocation.timeout.as_secs(),
                        "Timed out"
                    );
                    return ToolOutput::timed_out_after(invocation.timeout);
                }
            };

        let result = ToolOutput {
            exit_code: exit_code(output.status),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        let duration_ms = start.elapsed().as_millis();
        if result.success() {
            info!(tool = %invocation.description, duration_ms, "Success");
        } else {
            warn!(
                tool = %invocation.description,
                exit_code = result.exit_code,
                duration_ms,
                "Failed"
            );
        }
        result
    }
}

fn exit_code(status: ExitStatus) -> i32 {
    status.code().unwrap_or(KILLED_BY_SIGNAL)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::tools::external::{SPAWN_FAILED, TIMED_OUT};
    use std::time::Duration;
    use tempfile::TempDir;

    fn sh(script: &str, cwd: &std::path::Path) -> ToolInvocation {
        ToolInvocation::new("shell", "/bin/sh", cwd).args(["-c", script])
    }

    #[tokio::test]
    async fn test_captures_stdout_and_stderr() {
        let dir = TempDir::new().unwrap();
        let out = ProcessRunner
            .run(&sh("echo hello; echo oops >&2", dir.path()))
            .await;
        assert!(out.success());
        assert_eq!(out.stdout.trim(), "hello");
        assert_eq!(out.stderr.trim(), "oops");
    }

    #[tokio::test]
    async fn test_nonzero_exit() {
        let dir = TempDir::new().unwrap();
        let out = ProcessRunner.run(&sh("exit 3", dir.path())).await;
        assert_eq!(out.exit_code, 3);
        assert!(!out.timed_out());
    }

    #[tokio::test]
    async fn test_timeout_is_distinct() {
        let dir = TempDir::new().unwrap();
        let inv = sh("sleep 5", dir.path()).timeout(Duration::from_millis(200));
        let start = Instant::now();
        let out = ProcessRunner.run(&inv).await;
        assert!(out.timed_out());
        assert_eq!(out.exit_code, TIMED_OUT);
        assert!(start.elapsed() < Duration::from_secs(4));
    }

    #[tokio::test]
    async fn test_missing_binary_captured() {
        let dir = TempDir::new().unwrap();
        let inv = ToolInvocation::new("ghost", "/definitely/not/a/binary", dir.path());
        let out = ProcessRunner.run(&inv).await;
        assert_eq!(out.exit_code, SPAWN_FAILED);
        assert!(out.stderr.contains("Failed to start"));
    }

    #[tokio::test]
    async fn test_env_overlay_and_cwd() {
        let dir = TempDir::new().unwrap();
        let inv = sh("echo \"$REPRO_TEST_VAR\"; pwd", dir.path()).env("REPRO_TEST_VAR", "overlay");
        let out = ProcessRunner.run(&inv).await;
        let mut lines = out.stdout.lines();
        assert_eq!(lines.next(), Some("overlay"));
        let cwd = std::path::PathBuf::from(lines.next().unwrap());
        assert_eq!(
            cwd.canonicalize().unwrap(),
            dir.path().canonicalize().unwrap()
        );
    }
}
