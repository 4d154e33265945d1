//! Route definitions for body measurement requests.

use axum::routing::post;
use axum::Router;

use crate::handlers::measurements;
use crate::state::AppState;

/// ```text
/// POST   /measurements              -> create_measurement
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route("/measurements", post(measurements::create_measurement))
}
