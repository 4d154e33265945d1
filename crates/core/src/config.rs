//! Orchestration settings.
//!
//! Loaded by the host binary (see `bodyscan-api`'s `ServerConfig`) and
//! handed to [`MeasurementService`](crate::service::MeasurementService).

use std::path::PathBuf;
use std::time::Duration;

/// Hard limit for one run of the measurement computation. Sized for the
/// depth-backed path and applied to every method.
pub const COMPUTATION_TIMEOUT: Duration = Duration::from_secs(120);

/// How to launch the external measurement computation.
#[derive(Debug, Clone)]
pub struct ComputationConfig {
    /// Interpreter or executable (default: `python3`).
    pub program: String,
    /// Script passed as the first argument, if any.
    pub script_path: Option<PathBuf>,
    /// Wall-clock limit before the child is killed.
    pub timeout: Duration,
}

impl Default for ComputationConfig {
    fn default() -> Self {
        Self {
            program: "python3".to_string(),
            script_path: Some(PathBuf::from("python/wrapper.py")),
            timeout: COMPUTATION_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MeasurementConfig {
    pub computation: ComputationConfig,
    /// Root under which per-request artifact directories are created.
    pub work_dir: PathBuf,
    /// Where processed output images are written and retained.
    pub output_dir: PathBuf,
    /// URL prefix under which `output_dir` is served.
    pub public_image_base_url: String,
    /// Include computation diagnostics in failure envelopes.
    pub debug: bool,
}

impl Default for MeasurementConfig {
    fn default() -> Self {
        Self {
            computation: ComputationConfig::default(),
            work_dir: PathBuf::from("storage/tmp"),
            output_dir: PathBuf::from("storage/processed"),
            public_image_base_url: "/storage/processed".to_string(),
            debug: false,
        }
    }
}

impl MeasurementConfig {
    /// Public URL for a file name inside `output_dir`.
    pub fn image_url(&self, file_name: &str) -> String {
        format!(
            "{}/{}",
            self.public_image_base_url.trim_end_matches('/'),
            file_name
        )
    }
}
