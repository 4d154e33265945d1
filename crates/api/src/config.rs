use std::path::PathBuf;
use std::time::Duration;

use bodyscan_core::config::{ComputationConfig, MeasurementConfig, COMPUTATION_TIMEOUT};

/// Process-wide settings for the HTTP host.
///
/// Defaults target a local checkout; every field can be overridden from the
/// environment (see [`ServerConfig::from_env`]).
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Interface to bind.
    pub host: String,
    pub port: u16,
    /// Browser origins allowed by CORS.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `150`). Must exceed the
    /// computation timeout.
    pub request_timeout_secs: u64,
    /// Maximum accepted request body in bytes (default: 10 MiB).
    pub max_upload_bytes: usize,
    /// Orchestration settings handed to the core service.
    pub measurement: MeasurementConfig,
}

impl ServerConfig {
    /// Read the environment, falling back to these defaults.
    ///
    /// | Env Var                   | Default                 |
    /// |---------------------------|-------------------------|
    /// | `HOST`                    | `0.0.0.0`               |
    /// | `PORT`                    | `3000`                  |
    /// | `CORS_ORIGINS`            | `http://localhost:5173` |
    /// | `REQUEST_TIMEOUT_SECS`    | `150`                   |
    /// | `MAX_UPLOAD_BYTES`        | `10485760`              |
    /// | `MEASUREMENT_PYTHON_BIN`  | `python3`               |
    /// | `MEASUREMENT_SCRIPT_PATH` | `python/wrapper.py`     |
    /// | `MEASUREMENT_WORK_DIR`    | `storage/tmp`           |
    /// | `MEASUREMENT_OUTPUT_DIR`  | `storage/processed`     |
    /// | `PUBLIC_IMAGE_BASE_URL`   | `/storage/processed`    |
    /// | `MEASUREMENT_DEBUG`       | `false`                 |
    pub fn from_env() -> Self {
        let host = env_or("HOST", "0.0.0.0");
        let port: u16 = env_parsed("PORT", 3000);
        let cors_origins = env_or("CORS_ORIGINS", "http://localhost:5173")
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .map(String::from)
            .collect();
        let request_timeout_secs: u64 = env_parsed("REQUEST_TIMEOUT_SECS", 150);
        let max_upload_bytes: usize = env_parsed("MAX_UPLOAD_BYTES", 10 * 1024 * 1024);

        let program = env_or("MEASUREMENT_PYTHON_BIN", "python3");
        let script_path = env_or("MEASUREMENT_SCRIPT_PATH", "python/wrapper.py");
        let work_dir = env_or("MEASUREMENT_WORK_DIR", "storage/tmp");
        let output_dir = env_or("MEASUREMENT_OUTPUT_DIR", "storage/processed");
        let public_image_base_url = env_or("PUBLIC_IMAGE_BASE_URL", "/storage/processed");
        let debug = std::env::var("MEASUREMENT_DEBUG").is_ok_and(|v| parse_flag(&v));

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            max_upload_bytes,
            measurement: MeasurementConfig {
                computation: ComputationConfig {
                    program,
                    script_path: (!script_path.is_empty()).then(|| PathBuf::from(script_path)),
                    timeout: COMPUTATION_TIMEOUT,
                },
                work_dir: PathBuf::from(work_dir),
                output_dir: PathBuf::from(output_dir),
                public_image_base_url,
                debug,
            },
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_parsed<T>(name: &str, default: T) -> T
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .unwrap_or_else(|e| panic!("{name} has an invalid value '{raw}': {e}")),
        Err(_) => default,
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
