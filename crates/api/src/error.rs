use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use bodyscan_core::error::CoreError;
use bodyscan_core::response::{assemble_failure, FailureEnvelope, FailureKind};
use bodyscan_core::types::RequestId;
use serde_json::json;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`CoreError`] for domain errors and adds upload-specific variants.
/// Implements [`IntoResponse`] to produce consistent JSON error responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `bodyscan_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The request body exceeded the configured upload limit.
    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    /// The uploaded file is not a supported image format.
    #[error("Unsupported media type: {0}")]
    UnsupportedMediaType(String),

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// An internal error with a human-readable message.
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

/// HTTP status for a failure envelope.
pub fn status_for(kind: FailureKind) -> StatusCode {
    match kind {
        FailureKind::Validation => StatusCode::BAD_REQUEST,
        FailureKind::ResultParse => StatusCode::UNPROCESSABLE_ENTITY,
        FailureKind::Computation | FailureKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Render a failure envelope with its mapped status.
pub fn failure_response(envelope: FailureEnvelope) -> Response {
    (status_for(envelope.kind), axum::Json(envelope)).into_response()
}

impl AppError {
    /// Render as a failure envelope carrying `request_id`.
    pub fn into_response_with_id(self, request_id: RequestId) -> Response {
        let (status, message) = match self {
            AppError::Core(core) => return failure_response(assemble_failure(request_id, &core, false)),
            AppError::PayloadTooLarge(msg) => (StatusCode::PAYLOAD_TOO_LARGE, msg),
            AppError::UnsupportedMediaType(msg) => (StatusCode::UNSUPPORTED_MEDIA_TYPE, msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::InternalError(msg) => {
                tracing::error!(request_id = %request_id, error = %msg, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = json!({
            "success": false,
            "message": message,
            "request_id": request_id,
        });

        (status, axum::Json(body)).into_response()
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        self.into_response_with_id(RequestId::generate())
    }
}
