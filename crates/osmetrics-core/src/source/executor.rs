//! Running shell commands on the local host.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::trace;

use crate::error::ExecutionError;

/// Captured outcome of one command run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    /// `-1` when the process was terminated by a signal.
    pub exit_code: i32,
    /// `None` when the command wrote nothing.
    pub stdout: Option<String>,
    pub stderr: Option<String>,
}

impl ExecutionResult {
    pub fn new(exit_code: i32, stdout: Option<String>, stderr: Option<String>) -> Self {
        Self {
            exit_code,
            stdout,
            stderr,
        }
    }

    /// Exit code 0 with the given stdout.
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self::new(0, non_empty(stdout.into()), None)
    }

    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() { None } else { Some(s) }
}

/// Runs a command line and captures its output.
///
/// Failing to start the command is an error; a command that starts and exits
/// non-zero is not, the caller decides what the exit code means.
#[async_trait]
pub trait NativeExecutor: Send + Sync {
    async fn execute(&self, command: &str) -> Result<ExecutionResult, ExecutionError>;
}

/// Runs commands through `sh -c` as child processes.
///
/// The child is killed if the returned future is dropped, so an enclosing
/// timeout does not leave strays behind.
#[derive(Debug, Clone)]
pub struct ProcessExecutor {
    shell: String,
}

impl Default for ProcessExecutor {
    fn default() -> Self {
        Self {
            shell: "sh".to_string(),
        }
    }
}

impl ProcessExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses `shell` instead of `sh`. It must accept `-c <command line>`.
    pub fn with_shell(shell: impl Into<String>) -> Self {
        Self {
            shell: shell.into(),
        }
    }
}

#[async_trait]
impl NativeExecutor for ProcessExecutor {
    async fn execute(&self, command: &str) -> Result<ExecutionResult, ExecutionError> {
        trace!(command, "executing");
        let output = Command::new(&self.shell)
            .arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| ExecutionError::Spawn {
                command: command.to_string(),
                source,
            })?;

        Ok(ExecutionResult {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: non_empty(String::from_utf8_lossy(&output.stdout).into_owned()),
            stderr: non_empty(String::from_utf8_lossy(&output.stderr).into_owned()),
        })
    }
}
