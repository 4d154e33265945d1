//! End-to-end processing of one measurement request.

use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::artifacts::RequestArtifacts;
use crate::calibration::{resolve, CalibrationParams, ResolvedCalibration};
use crate::config::MeasurementConfig;
use crate::error::CoreError;
use crate::invocation::{build_invocation, InvocationPaths};
use crate::measurement::ComputationOutput;
use crate::request::MeasurementRequest;
use crate::response::{assemble_failure, assemble_success, MeasurementEnvelope};
use crate::scripting::invoker::InvocationContext;
use crate::scripting::{MeasurementInvoker, ProcessExecutor, SystemExecutor};
use crate::types::RequestId;
use crate::validation::validate_request;

/// Output image extension written by the computation.
const OUTPUT_EXTENSION: &str = "jpg";

struct Completed {
    output: ComputationOutput,
    resolved: ResolvedCalibration,
    image_file: String,
}

/// Validates, resolves, invokes and assembles. Cheap to share behind an `Arc`.
#[derive(Debug)]
pub struct MeasurementService<E = SystemExecutor> {
    config: MeasurementConfig,
    invoker: MeasurementInvoker<E>,
}

impl MeasurementService<SystemExecutor> {
    pub fn new(config: MeasurementConfig) -> Self {
        Self::with_executor(config, SystemExecutor)
    }
}

impl<E: ProcessExecutor> MeasurementService<E> {
    pub fn with_executor(config: MeasurementConfig, executor: E) -> Self {
        Self {
            config,
            invoker: MeasurementInvoker::with_executor(executor),
        }
    }

    pub fn config(&self) -> &MeasurementConfig {
        &self.config
    }

    /// New scratch directory under the configured work dir.
    pub async fn create_artifacts(&self) -> Result<RequestArtifacts, CoreError> {
        RequestArtifacts::create(&self.config.work_dir).await.map_err(|e| {
            CoreError::Internal(format!(
                "failed to create work directory under {}: {e}",
                self.config.work_dir.display()
            ))
        })
    }

    /// Process `request` to a single envelope.
    ///
    /// `artifacts` must already hold the uploaded image that
    /// `request.image` points at. It is not consumed; the caller drops it
    /// once the response is built.
    pub async fn process(
        &self,
        request_id: RequestId,
        request: &MeasurementRequest,
        artifacts: &RequestArtifacts,
    ) -> MeasurementEnvelope {
        let started = Instant::now();

        match self.run(&request_id, request, artifacts).await {
            Ok(done) => {
                tracing::info!(
                    request_id = %request_id,
                    method = %done.resolved.method(),
                    fallback = done.resolved.fallback_reason.is_some(),
                    measurements = done.output.measurements.len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Measurement completed",
                );
                let image_url = self.config.image_url(&done.image_file);
                MeasurementEnvelope::Success(assemble_success(
                    request_id,
                    done.output,
                    &done.resolved,
                    image_url,
                    started.elapsed(),
                ))
            }
            Err(err) => {
                if err.is_client_error() {
                    tracing::info!(request_id = %request_id, error = %err, "Measurement request rejected");
                } else {
                    tracing::error!(request_id = %request_id, error = %err, "Measurement failed");
                }
                MeasurementEnvelope::Failure(assemble_failure(request_id, &err, self.config.debug))
            }
        }
    }

    async fn run(
        &self,
        request_id: &RequestId,
        request: &MeasurementRequest,
        artifacts: &RequestArtifacts,
    ) -> Result<Completed, CoreError> {
        let validated = validate_request(request)?;
        let resolved = resolve(&validated)?;

        tracing::debug!(
            request_id = %request_id,
            method = %resolved.method(),
            fallback_reason = resolved.fallback_reason.as_deref().unwrap_or(""),
            "Calibration resolved",
        );

        let depth_map = match &resolved.params {
            CalibrationParams::Spatial { depth_map, .. } => {
                Some(artifacts.persist_depth_map(depth_map).await?)
            }
            _ => None,
        };

        let image_file = format!("{}.{OUTPUT_EXTENSION}", artifacts.id());
        let output_path = self.prepare_output(&image_file).await?;

        let paths = InvocationPaths {
            input: validated.image.clone(),
            output: output_path.clone(),
            depth_map,
        };
        let spec = build_invocation(&resolved, &paths, &self.config.computation)?;

        let context = InvocationContext {
            request_id: request_id.clone(),
            device_platform: validated.device_platform.clone(),
            image_source: validated.image_source.clone(),
        };

        match self.invoker.invoke(&spec, &context).await {
            Ok(output) => Ok(Completed {
                output,
                resolved,
                image_file,
            }),
            Err(err) => {
                remove_output(&output_path).await;
                Err(err)
            }
        }
    }

    async fn prepare_output(&self, file_name: &str) -> Result<PathBuf, CoreError> {
        tokio::fs::create_dir_all(&self.config.output_dir)
            .await
            .map_err(|e| {
                CoreError::Internal(format!(
                    "failed to create output directory {}: {e}",
                    self.config.output_dir.display()
                ))
            })?;
        Ok(self.config.output_dir.join(file_name))
    }
}

async fn remove_output(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => tracing::debug!(path = %path.display(), "Removed partial output image"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = %path.display(), error = %e, "Failed to remove output image"),
    }
}
