use axum::extract::State;
use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

/// Health check response payload.
#[derive(Serialize)]
pub struct HealthResponse {
    /// Overall service status.
    pub status: &'static str,
    /// Crate version from Cargo.toml.
    pub version: &'static str,
    /// Whether the configured computation script exists on disk.
    pub computation_available: bool,
}

/// GET /health -- liveness plus a cheap check that the computation is installed.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let computation_available = match &state.config.measurement.computation.script_path {
        Some(path) => tokio::fs::try_exists(path).await.unwrap_or(false),
        None => true,
    };

    let status = if computation_available { "ok" } else { "degraded" };

    Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        computation_available,
    })
}

/// Mount health check routes (intended for root-level, NOT under `/api/v1`).
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
