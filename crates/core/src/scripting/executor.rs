//! The process-execution seam used by the invoker.

use std::time::Duration;

/// One run of a child process.
#[derive(Debug, Clone)]
pub struct ProcessInput {
    /// Arguments after the program name, passed without a shell.
    pub args: Vec<String>,
    /// Kill the child once this much wall-clock time has passed.
    pub timeout: Duration,
}

/// What a child process left behind when it exited on its own.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessOutput {
    pub stdout: String,
    pub stderr: String,
    /// `-1` when the process was terminated by a signal.
    pub exit_code: i32,
    pub duration_ms: u64,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Reasons a process produced no exit status.
#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    #[error("Process timed out after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },

    /// Spawning failed, or waiting on the child failed.
    #[error("I/O error: {0}")]
    IoError(#[source] std::io::Error),
}

/// Runs a program to completion or timeout.
pub trait ProcessExecutor: Send + Sync {
    fn execute(
        &self,
        program: &str,
        input: ProcessInput,
    ) -> impl std::future::Future<Output = Result<ProcessOutput, ScriptError>> + Send;
}

/// Spawns real child processes through [`super::subprocess::run_command`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemExecutor;

impl ProcessExecutor for SystemExecutor {
    async fn execute(
        &self,
        program: &str,
        input: ProcessInput,
    ) -> Result<ProcessOutput, ScriptError> {
        let mut cmd = tokio::process::Command::new(program);
        super::subprocess::run_command(&mut cmd, input).await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_message_includes_elapsed_time() {
        let err = ScriptError::Timeout { elapsed_ms: 120_000 };
        assert_eq!(err.to_string(), "Process timed out after 120000ms");
    }

    #[test]
    fn io_error_keeps_its_source() {
        let err = ScriptError::IoError(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "python3 not found",
        ));
        assert!(err.to_string().contains("python3 not found"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn only_exit_code_zero_is_success() {
        let mut output = ProcessOutput {
            stdout: String::new(),
            stderr: String::new(),
            exit_code: 0,
            duration_ms: 3,
        };
        assert!(output.success());
        output.exit_code = -1;
        assert!(!output.success());
    }
}
