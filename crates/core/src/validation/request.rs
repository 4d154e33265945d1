//! Structural and range rules for [`MeasurementRequest`] fields.

use std::path::PathBuf;

use crate::calibration::reference::{accepted_reference_values, ReferenceChoice};
use crate::calibration::CalibrationMethod;
use crate::depth_map::{parse_depth_map, DepthMap, DepthMapError};
use crate::error::CoreError;
use crate::request::*;

use super::errors::FieldErrors;

/// Inclusive bounds for `person_height`, in centimeters.
pub const MIN_PERSON_HEIGHT_CM: f64 = 50.0;
pub const MAX_PERSON_HEIGHT_CM: f64 = 250.0;

/// Outcome of parsing `depth_map_data` during validation.
///
/// A payload that is not JSON at all is rejected outright. A JSON payload
/// describing an unusable grid is carried as `Invalid`: the resolver may
/// still fall back to another method.
#[derive(Debug, Clone, PartialEq)]
pub enum DepthPayload {
    Parsed(DepthMap),
    Invalid(DepthMapError),
}

/// Typed view of a request whose fields have all passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedRequest {
    pub image: PathBuf,
    pub calibration_method: Option<CalibrationMethod>,
    pub person_height_cm: Option<f64>,
    pub reference_object: Option<ReferenceChoice>,
    pub reference_width_cm: Option<f64>,
    pub reference_height_cm: Option<f64>,
    pub calibration_factor: Option<f64>,
    pub has_lidar: bool,
    pub depth: Option<DepthPayload>,
    pub camera_intrinsics: Option<String>,
    pub device_platform: Option<String>,
    pub image_source: Option<String>,
}

impl ValidatedRequest {
    /// The parsed depth map, if the payload was present and well-formed.
    pub fn usable_depth(&self) -> Option<&DepthMap> {
        match &self.depth {
            Some(DepthPayload::Parsed(map)) => Some(map),
            _ => None,
        }
    }

    /// The parse failure, if the payload was present but malformed.
    pub fn depth_error(&self) -> Option<&DepthMapError> {
        match &self.depth {
            Some(DepthPayload::Invalid(err)) => Some(err),
            _ => None,
        }
    }
}

/// Validate every field of `request`, accumulating all violations.
///
/// Blank values are treated as absent. Never touches the filesystem and
/// never invokes the computation, so re-validating the same request always
/// yields the same result.
pub fn validate_request(request: &MeasurementRequest) -> Result<ValidatedRequest, FieldErrors> {
    let mut errors = FieldErrors::new();

    let image = request
        .image
        .as_ref()
        .filter(|p| !p.as_os_str().is_empty())
        .cloned();
    if image.is_none() {
        errors.add(FIELD_IMAGE, "The image field is required.");
    }

    let calibration_method = present(&request.calibration_method).and_then(|raw| {
        raw.parse::<CalibrationMethod>()
            .map_err(|_| {
                errors.add(
                    FIELD_CALIBRATION_METHOD,
                    "The calibration method must be one of: reference, height, spatial, direct.",
                )
            })
            .ok()
    });

    let person_height_cm =
        number(&mut errors, FIELD_PERSON_HEIGHT, &request.person_height).and_then(|h| {
            if (MIN_PERSON_HEIGHT_CM..=MAX_PERSON_HEIGHT_CM).contains(&h) {
                Some(h)
            } else {
                errors.add(
                    FIELD_PERSON_HEIGHT,
                    format!(
                        "The person height must be between {MIN_PERSON_HEIGHT_CM} and {MAX_PERSON_HEIGHT_CM} cm."
                    ),
                );
                None
            }
        });

    let reference_object = present(&request.reference_object).and_then(|raw| {
        raw.parse::<ReferenceChoice>()
            .map_err(|_| {
                errors.add(
                    FIELD_REFERENCE_OBJECT,
                    format!(
                        "The reference object must be one of: {}.",
                        accepted_reference_values()
                    ),
                )
            })
            .ok()
    });

    let reference_width_cm = positive(&mut errors, FIELD_REFERENCE_WIDTH, &request.reference_width);
    let reference_height_cm =
        positive(&mut errors, FIELD_REFERENCE_HEIGHT, &request.reference_height);
    let calibration_factor =
        positive(&mut errors, FIELD_CALIBRATION_FACTOR, &request.calibration_factor);

    let has_lidar = match present(&request.has_lidar) {
        None => false,
        Some(raw) => parse_bool(raw).unwrap_or_else(|| {
            errors.add(FIELD_HAS_LIDAR, "The has lidar field must be true or false.");
            false
        }),
    };

    let depth = present(&request.depth_map_data).and_then(|raw| match parse_depth_map(raw) {
        Ok(map) => Some(DepthPayload::Parsed(map)),
        Err(err) if err.is_syntactic() => {
            if let Some(fields) = CoreError::from(err).field_errors() {
                errors.merge(fields);
            }
            None
        }
        Err(err) => Some(DepthPayload::Invalid(err)),
    });

    let camera_intrinsics = present(&request.camera_intrinsics).and_then(|raw| {
        match serde_json::from_str::<serde_json::Value>(raw) {
            Ok(_) => Some(raw.to_string()),
            Err(_) => {
                errors.add(
                    FIELD_CAMERA_INTRINSICS,
                    "The camera intrinsics must be valid JSON.",
                );
                None
            }
        }
    });

    let validated = ValidatedRequest {
        image: image.unwrap_or_default(),
        calibration_method,
        person_height_cm,
        reference_object,
        reference_width_cm,
        reference_height_cm,
        calibration_factor,
        has_lidar,
        depth,
        camera_intrinsics,
        device_platform: present(&request.device_platform).map(str::to_string),
        image_source: present(&request.image_source).map(str::to_string),
    };

    errors.into_result(validated)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Trimmed value, or `None` when absent or blank.
fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn number(errors: &mut FieldErrors, field: &str, value: &Option<String>) -> Option<f64> {
    let raw = present(value)?;
    match raw.parse::<f64>() {
        Ok(n) if n.is_finite() => Some(n),
        _ => {
            errors.add(field, format!("The {} must be a number.", label(field)));
            None
        }
    }
}

fn positive(errors: &mut FieldErrors, field: &str, value: &Option<String>) -> Option<f64> {
    let n = number(errors, field, value)?;
    if n > 0.0 {
        Some(n)
    } else {
        errors.add(field, format!("The {} must be greater than 0.", label(field)));
        None
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn label(field: &str) -> String {
    field.replace('_', " ")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
