use std::sync::Arc;

use bodyscan_core::service::MeasurementService;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc`).
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Measurement orchestration.
    pub service: Arc<MeasurementService>,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        let service = MeasurementService::new(config.measurement.clone());
        Self {
            config: Arc::new(config),
            service: Arc::new(service),
        }
    }
}
