//! Uniform response envelopes.
//!
//! Every request ends in exactly one [`MeasurementEnvelope`]. Failure
//! envelopes never carry raw computation diagnostics unless debug mode is on.

use std::time::Duration;

use serde::Serialize;

use crate::calibration::{CalibrationParams, ResolvedCalibration};
use crate::error::CoreError;
use crate::measurement::{CalibrationMetadata, ComputationOutput, MeasurementSet, ReferenceMetadata};
use crate::types::RequestId;
use crate::validation::FieldErrors;

pub const VALIDATION_MESSAGE: &str = "The given data was invalid.";
pub const PROCESSING_MESSAGE: &str = "Error processing image";
pub const INTERNAL_MESSAGE: &str = "An internal error occurred";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SuccessEnvelope {
    pub success: bool,
    pub measurements: MeasurementSet,
    pub calibration: CalibrationMetadata,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_reason: Option<String>,
    pub image_url: String,
    pub request_id: RequestId,
    /// Wall-clock seconds from request intake to response.
    pub processing_time: f64,
}

/// Category of failure, used by the HTTP host to choose a status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Validation,
    ResultParse,
    Computation,
    Internal,
}

/// Raw diagnostics, only populated in debug mode.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailureDebug {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub stderr: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailureEnvelope {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<FieldErrors>,
    pub request_id: RequestId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug: Option<FailureDebug>,
    #[serde(skip)]
    pub kind: FailureKind,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MeasurementEnvelope {
    Success(SuccessEnvelope),
    Failure(FailureEnvelope),
}

impl MeasurementEnvelope {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn request_id(&self) -> &RequestId {
        match self {
            Self::Success(s) => &s.request_id,
            Self::Failure(f) => &f.request_id,
        }
    }
}

/// Build the success envelope.
///
/// The reported method is always the resolved one. When calibration used a
/// reference object and the computation did not echo it, the resolved
/// object's dimensions are filled in. The resolver's fallback reason wins
/// over one reported by the computation.
pub fn assemble_success(
    request_id: RequestId,
    output: ComputationOutput,
    resolved: &ResolvedCalibration,
    image_url: String,
    elapsed: Duration,
) -> SuccessEnvelope {
    let mut calibration = output.calibration;
    let method = resolved.method();
    if calibration.method != method {
        tracing::warn!(
            request_id = %request_id,
            resolved = %method,
            reported = %calibration.method,
            "Computation reported a different calibration method",
        );
        calibration.method = method;
    }
    if calibration.reference.is_none() {
        if let CalibrationParams::Reference(spec) = &resolved.params {
            let (width, height) = spec.dimensions();
            calibration.reference = Some(ReferenceMetadata {
                kind: spec.label().to_string(),
                width,
                height,
            });
        }
    }

    SuccessEnvelope {
        success: true,
        measurements: output.measurements,
        calibration,
        fallback_reason: resolved
            .fallback_reason
            .clone()
            .or(output.fallback_reason),
        image_url,
        request_id,
        processing_time: round_millis(elapsed),
    }
}

/// Build the failure envelope for `error`.
///
/// Field errors are only exposed for validation failures. Diagnostics go
/// into `debug` only when `debug` is true.
pub fn assemble_failure(request_id: RequestId, error: &CoreError, debug: bool) -> FailureEnvelope {
    let (kind, message, errors) = match error {
        CoreError::Validation(_) | CoreError::InvalidDepthFormat(_) => (
            FailureKind::Validation,
            VALIDATION_MESSAGE,
            error.field_errors(),
        ),
        CoreError::ResultParseError(_) => (FailureKind::ResultParse, PROCESSING_MESSAGE, None),
        CoreError::ComputationFailed { .. } => (FailureKind::Computation, PROCESSING_MESSAGE, None),
        CoreError::Internal(_) => (FailureKind::Internal, INTERNAL_MESSAGE, None),
    };

    let debug = (debug && kind != FailureKind::Validation).then(|| match error {
        CoreError::ComputationFailed {
            reason,
            exit_code,
            stderr,
        } => FailureDebug {
            error: reason.clone(),
            exit_code: *exit_code,
            stderr: stderr.clone(),
        },
        other => FailureDebug {
            error: other.to_string(),
            exit_code: None,
            stderr: String::new(),
        },
    });

    FailureEnvelope {
        success: false,
        message: message.to_string(),
        errors,
        request_id,
        debug,
        kind,
    }
}

fn round_millis(elapsed: Duration) -> f64 {
    (elapsed.as_secs_f64() * 1000.0).round() / 1000.0
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
