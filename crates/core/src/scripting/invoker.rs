//! Runs the measurement computation and classifies its outcome.

use crate::error::CoreError;
use crate::invocation::InvocationSpec;
use crate::measurement::{failure_message, parse_computation_output, ComputationOutput, ComputationReport};
use crate::types::RequestId;

use super::executor::{ProcessExecutor, ProcessInput, ScriptError, SystemExecutor};

/// Request labels attached to invocation logs.
#[derive(Debug, Clone)]
pub struct InvocationContext {
    pub request_id: RequestId,
    pub device_platform: Option<String>,
    pub image_source: Option<String>,
}

/// Launches one computation per call. No retries.
#[derive(Debug, Clone, Default)]
pub struct MeasurementInvoker<E = SystemExecutor> {
    executor: E,
}

impl MeasurementInvoker<SystemExecutor> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<E: ProcessExecutor> MeasurementInvoker<E> {
    pub fn with_executor(executor: E) -> Self {
        Self { executor }
    }

    /// Run `spec` once under its timeout.
    ///
    /// Exit 0 with a contract-conforming document is success. Exit 0 with
    /// anything else is [`CoreError::ResultParseError`]. A non-zero exit,
    /// timeout, launch failure or an explicit `success: false` document is
    /// [`CoreError::ComputationFailed`].
    pub async fn invoke(
        &self,
        spec: &InvocationSpec,
        context: &InvocationContext,
    ) -> Result<ComputationOutput, CoreError> {
        let method = spec.get(crate::invocation::ARG_CALIBRATION).unwrap_or_default();

        tracing::info!(
            request_id = %context.request_id,
            program = %spec.program,
            method,
            args = ?spec.redacted_argv(),
            device_platform = context.device_platform.as_deref().unwrap_or("unknown"),
            image_source = context.image_source.as_deref().unwrap_or("unknown"),
            timeout_secs = spec.timeout.as_secs(),
            "Invoking measurement computation",
        );

        let input = ProcessInput {
            args: spec.argv(),
            timeout: spec.timeout,
        };

        let output = match self.executor.execute(&spec.program, input).await {
            Ok(output) => output,
            Err(ScriptError::Timeout { elapsed_ms }) => {
                tracing::error!(
                    request_id = %context.request_id,
                    elapsed_ms,
                    "Measurement computation timed out",
                );
                return Err(CoreError::ComputationFailed {
                    reason: format!("timed out after {}s", spec.timeout.as_secs()),
                    exit_code: None,
                    stderr: String::new(),
                });
            }
            Err(ScriptError::IoError(err)) => {
                tracing::error!(
                    request_id = %context.request_id,
                    program = %spec.program,
                    error = %err,
                    "Failed to launch measurement computation",
                );
                return Err(CoreError::ComputationFailed {
                    reason: format!("failed to launch {}: {err}", spec.program),
                    exit_code: None,
                    stderr: String::new(),
                });
            }
        };

        tracing::debug!(
            request_id = %context.request_id,
            exit_code = output.exit_code,
            duration_ms = output.duration_ms,
            "Measurement computation finished",
        );

        if !output.success() {
            let reason = failure_message(&output.stdout)
                .unwrap_or_else(|| format!("exit code {}", output.exit_code));
            tracing::error!(
                request_id = %context.request_id,
                exit_code = output.exit_code,
                reason = %reason,
                stderr = %output.stderr,
                "Measurement computation failed",
            );
            return Err(CoreError::ComputationFailed {
                reason,
                exit_code: Some(output.exit_code),
                stderr: output.stderr,
            });
        }

        match parse_computation_output(&output.stdout) {
            Ok(ComputationReport::Completed(result)) => Ok(result),
            Ok(ComputationReport::Failed { error }) => {
                tracing::error!(
                    request_id = %context.request_id,
                    reason = %error,
                    stderr = %output.stderr,
                    "Measurement computation reported failure",
                );
                Err(CoreError::ComputationFailed {
                    reason: error,
                    exit_code: Some(output.exit_code),
                    stderr: output.stderr,
                })
            }
            Err(err) => {
                tracing::error!(
                    request_id = %context.request_id,
                    error = %err,
                    stdout = %output.stdout,
                    stderr = %output.stderr,
                    "Measurement computation output rejected",
                );
                Err(err)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
