pub mod health;
pub mod measurements;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /measurements                                    POST multipart upload
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new().merge(measurements::router())
}
