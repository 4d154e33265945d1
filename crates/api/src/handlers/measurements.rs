//! Handler for `POST /api/v1/measurements`.

use axum::extract::multipart::{Field, MultipartError, MultipartRejection};
use axum::extract::{Multipart, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use bodyscan_core::artifacts::RequestArtifacts;
use bodyscan_core::request::{MeasurementRequest, FIELD_IMAGE};
use bodyscan_core::response::MeasurementEnvelope;
use bodyscan_core::types::RequestId;
use image::ImageFormat;

use crate::error::{failure_response, AppError, AppResult};
use crate::router::REQUEST_ID_HEADER;
use crate::state::AppState;

/// POST /api/v1/measurements
///
/// Accept a multipart upload with an `image` file plus optional text
/// fields, run the measurement, and return the envelope. The uploaded
/// image lives only for the duration of the request.
pub async fn create_measurement(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response {
    let request_id = request_id_from(&headers);

    match measure(&state, request_id.clone(), multipart).await {
        Ok(response) => response,
        Err(err) => {
            tracing::info!(request_id = %request_id, error = %err, "Measurement upload rejected");
            err.into_response_with_id(request_id)
        }
    }
}

async fn measure(
    state: &AppState,
    request_id: RequestId,
    multipart: Result<Multipart, MultipartRejection>,
) -> AppResult<Response> {
    let mut multipart = multipart.map_err(|rejection| {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            AppError::PayloadTooLarge(rejection.body_text())
        } else {
            AppError::BadRequest(rejection.body_text())
        }
    })?;

    let artifacts = state.service.create_artifacts().await?;
    let request = read_upload(&mut multipart, &artifacts).await?;

    let envelope = state.service.process(request_id, &request, &artifacts).await;

    Ok(match envelope {
        MeasurementEnvelope::Success(success) => (StatusCode::OK, Json(success)).into_response(),
        MeasurementEnvelope::Failure(failure) => failure_response(failure),
    })
}

/// Stream the multipart body into a [`MeasurementRequest`], storing the
/// image inside `artifacts`. Unknown text fields are ignored.
async fn read_upload(
    multipart: &mut Multipart,
    artifacts: &RequestArtifacts,
) -> AppResult<MeasurementRequest> {
    let mut request = MeasurementRequest::default();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };

        if name == FIELD_IMAGE {
            request.image = store_image(field, artifacts).await?;
            continue;
        }

        let value = field.text().await.map_err(multipart_error)?;
        if !request.set_field(&name, value) {
            tracing::debug!(field = %name, "Ignoring unknown multipart field");
        }
    }

    Ok(request)
}

/// Persist the uploaded image after checking its magic bytes. An empty part
/// is treated as absent so validation reports the missing image.
async fn store_image(
    field: Field<'_>,
    artifacts: &RequestArtifacts,
) -> AppResult<Option<std::path::PathBuf>> {
    let data = field.bytes().await.map_err(multipart_error)?;
    if data.is_empty() {
        return Ok(None);
    }

    let extension = match image::guess_format(&data) {
        Ok(ImageFormat::Jpeg) => "jpg",
        Ok(ImageFormat::Png) => "png",
        Ok(ImageFormat::WebP) => "webp",
        _ => {
            return Err(AppError::UnsupportedMediaType(
                "The image must be a JPEG, PNG or WebP file.".to_string(),
            ))
        }
    };

    let path = artifacts
        .write(&format!("input.{extension}"), &data)
        .await
        .map_err(|e| AppError::InternalError(format!("Failed to store upload: {e}")))?;
    Ok(Some(path))
}

fn multipart_error(err: MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(err.body_text())
    } else {
        AppError::BadRequest(err.body_text())
    }
}

fn request_id_from(headers: &HeaderMap) -> RequestId {
    headers
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(RequestId::new)
        .unwrap_or_else(RequestId::generate)
}
