//! The computation's stdout contract.
//!
//! The computation prints one JSON document:
//!
//! ```json
//! {"success": true,
//!  "measurements": {"chest": 96.5, "waist": 81.2},
//!  "calibration": {"method": "height", "factor": 0.21, "confidence": 0.85,
//!                  "unit": "cm/pixel"}}
//! ```
//!
//! or `{"success": false, "error": "..."}`.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::calibration::CalibrationMethod;
use crate::error::CoreError;

pub const DEFAULT_UNIT: &str = "cm/pixel";

/// Body measurements the computation may report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeasurementName {
    Chest,
    Waist,
    Hips,
    Inseam,
    ShoulderWidth,
    SleeveLength,
    Neck,
}

impl MeasurementName {
    pub const ALL: [MeasurementName; 7] = [
        Self::Chest,
        Self::Waist,
        Self::Hips,
        Self::Inseam,
        Self::ShoulderWidth,
        Self::SleeveLength,
        Self::Neck,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Chest => "chest",
            Self::Waist => "waist",
            Self::Hips => "hips",
            Self::Inseam => "inseam",
            Self::ShoulderWidth => "shoulder_width",
            Self::SleeveLength => "sleeve_length",
            Self::Neck => "neck",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|name| name.as_str() == key)
    }
}

impl fmt::Display for MeasurementName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Partial map of measurement name to centimeters.
pub type MeasurementSet = BTreeMap<MeasurementName, f64>;

/// Real-world size of the reference object used for calibration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceMetadata {
    #[serde(rename = "type")]
    pub kind: String,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalibrationMetadata {
    pub method: CalibrationMethod,
    /// Centimeters per pixel; always positive.
    pub factor: f64,
    /// In `[0, 1]`.
    pub confidence: f64,
    pub unit: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<ReferenceMetadata>,
}

/// A successful, contract-conforming computation result.
#[derive(Debug, Clone, PartialEq)]
pub struct ComputationOutput {
    pub measurements: MeasurementSet,
    pub calibration: CalibrationMetadata,
    /// Set when the computation itself abandoned its preferred calibration.
    pub fallback_reason: Option<String>,
}

/// What the computation reported on stdout.
#[derive(Debug, Clone, PartialEq)]
pub enum ComputationReport {
    Completed(ComputationOutput),
    /// The computation ran but declared failure.
    Failed { error: String },
}

#[derive(Deserialize)]
struct RawOutput {
    success: Option<bool>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    measurements: Option<Map<String, Value>>,
    #[serde(default)]
    calibration: Option<RawCalibration>,
}

#[derive(Deserialize)]
struct RawCalibration {
    method: String,
    factor: f64,
    confidence: f64,
    #[serde(default)]
    unit: Option<String>,
    #[serde(default)]
    reference: Option<ReferenceMetadata>,
    #[serde(default)]
    fallback_reason: Option<String>,
}

/// Parse the computation's stdout against the result contract.
///
/// Unknown measurement names are dropped. A non-positive factor or a
/// confidence outside `[0, 1]` is a contract violation.
pub fn parse_computation_output(stdout: &str) -> Result<ComputationReport, CoreError> {
    let raw = decode_document(stdout)?;

    match raw.success {
        Some(true) => {}
        Some(false) => {
            return Ok(ComputationReport::Failed {
                error: raw
                    .error
                    .unwrap_or_else(|| "computation reported failure".to_string()),
            });
        }
        None => return Err(parse_error("missing success flag")),
    }

    let measurements = parse_measurements(
        raw.measurements
            .ok_or_else(|| parse_error("missing measurements"))?,
    )?;
    let mut raw_calibration = raw
        .calibration
        .ok_or_else(|| parse_error("missing calibration"))?;
    let fallback_reason = raw_calibration
        .fallback_reason
        .take()
        .filter(|reason| !reason.trim().is_empty());
    let calibration = parse_calibration(raw_calibration)?;

    Ok(ComputationReport::Completed(ComputationOutput {
        measurements,
        calibration,
        fallback_reason,
    }))
}

/// The `error` field of a `{"success": false}` document, if stdout holds one.
pub fn failure_message(stdout: &str) -> Option<String> {
    let raw = decode_document(stdout).ok()?;
    match raw.success {
        Some(false) => raw.error,
        _ => None,
    }
}

/// Decode the whole output, or failing that its last non-empty line, so
/// stray progress output before the JSON document is tolerated.
fn decode_document(stdout: &str) -> Result<RawOutput, CoreError> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return Err(parse_error("empty output"));
    }
    match serde_json::from_str(trimmed) {
        Ok(raw) => Ok(raw),
        Err(err) => trimmed
            .lines()
            .rev()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .and_then(|line| serde_json::from_str(line).ok())
            .ok_or_else(|| parse_error(&format!("invalid JSON: {err}"))),
    }
}

fn parse_measurements(raw: Map<String, Value>) -> Result<MeasurementSet, CoreError> {
    let mut set = MeasurementSet::new();
    for (key, value) in raw {
        let Some(name) = MeasurementName::from_key(&key) else {
            tracing::debug!(key = %key, "Dropping unknown measurement");
            continue;
        };
        let cm = value
            .as_f64()
            .filter(|v| v.is_finite())
            .ok_or_else(|| parse_error(&format!("measurement '{key}' is not a number")))?;
        set.insert(name, cm);
    }
    Ok(set)
}

fn parse_calibration(raw: RawCalibration) -> Result<CalibrationMetadata, CoreError> {
    let method = raw
        .method
        .parse::<CalibrationMethod>()
        .map_err(|e| parse_error(&e))?;

    if !(raw.factor.is_finite() && raw.factor > 0.0) {
        return Err(parse_error(&format!(
            "calibration factor must be positive, got {}",
            raw.factor
        )));
    }
    if !(0.0..=1.0).contains(&raw.confidence) {
        return Err(parse_error(&format!(
            "confidence must be within [0, 1], got {}",
            raw.confidence
        )));
    }

    Ok(CalibrationMetadata {
        method,
        factor: raw.factor,
        confidence: raw.confidence,
        unit: raw
            .unit
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| DEFAULT_UNIT.to_string()),
        reference: raw.reference,
    })
}

fn parse_error(reason: &str) -> CoreError {
    CoreError::ResultParseError(reason.to_string())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn completed(stdout: &str) -> ComputationOutput {
        match parse_computation_output(stdout).expect("parse") {
            ComputationReport::Completed(output) => output,
            other => panic!("expected completed output, got {other:?}"),
        }
    }

    #[test]
    fn parses_full_document() {
        let output = completed(
            r#"{"success":true,
                "measurements":{"chest":96.5,"waist":81.2,"shoulder_width":44.0},
                "calibration":{"method":"reference","factor":0.0742,"confidence":0.92,
                               "unit":"cm/pixel",
                               "reference":{"type":"a4_paper","width":21.0,"height":29.7}}}"#,
        );
        assert_eq!(output.measurements.len(), 3);
        assert_eq!(output.measurements[&MeasurementName::ShoulderWidth], 44.0);
        assert_eq!(output.calibration.method, CalibrationMethod::Reference);
        assert_eq!(
            output.calibration.reference,
            Some(ReferenceMetadata {
                kind: "a4_paper".into(),
                width: 21.0,
                height: 29.7,
            })
        );
    }

    #[test]
    fn computation_side_fallback_reason_is_kept() {
        let output = completed(
            r#"{"success":true,"measurements":{"chest":90},
                "calibration":{"method":"height","factor":0.2,"confidence":0.7,
                               "fallback_reason":"Spatial calibration failed: No LiDAR data available"}}"#,
        );
        assert_eq!(
            output.fallback_reason.as_deref(),
            Some("Spatial calibration failed: No LiDAR data available")
        );

        let output = completed(
            r#"{"success":true,"measurements":{},
                "calibration":{"method":"height","factor":0.2,"confidence":0.7,"fallback_reason":""}}"#,
        );
        assert!(output.fallback_reason.is_none());
    }

    #[test]
    fn unknown_measurements_are_dropped() {
        let output = completed(
            r#"{"success":true,"measurements":{"chest":90,"thigh":55},
                "calibration":{"method":"height","factor":0.2,"confidence":0.8}}"#,
        );
        assert_eq!(
            output.measurements.keys().copied().collect::<Vec<_>>(),
            [MeasurementName::Chest]
        );
    }

    #[test]
    fn unit_defaults_when_absent() {
        let output = completed(
            r#"{"success":true,"measurements":{},
                "calibration":{"method":"direct","factor":0.1,"confidence":1.0}}"#,
        );
        assert_eq!(output.calibration.unit, DEFAULT_UNIT);
        assert!(output.measurements.is_empty());
    }

    #[test]
    fn tolerates_log_lines_before_document() {
        let output = completed(
            "loading model...\n{\"success\":true,\"measurements\":{\"neck\":38.0},\
             \"calibration\":{\"method\":\"height\",\"factor\":0.2,\"confidence\":0.5}}\n",
        );
        assert_eq!(output.measurements[&MeasurementName::Neck], 38.0);
    }

    #[test]
    fn success_false_is_reported_as_failure() {
        let report =
            parse_computation_output(r#"{"success":false,"error":"No person detected"}"#).unwrap();
        assert_eq!(
            report,
            ComputationReport::Failed {
                error: "No person detected".into()
            }
        );
        assert_eq!(
            failure_message(r#"{"success":false,"error":"No person detected"}"#).as_deref(),
            Some("No person detected")
        );
    }

    #[test]
    fn rejects_non_positive_factor() {
        let result = parse_computation_output(
            r#"{"success":true,"measurements":{},
                "calibration":{"method":"height","factor":0,"confidence":0.5}}"#,
        );
        assert_matches!(result, Err(CoreError::ResultParseError(ref m)) if m.contains("factor"));
    }

    #[test]
    fn rejects_confidence_out_of_range() {
        let result = parse_computation_output(
            r#"{"success":true,"measurements":{},
                "calibration":{"method":"height","factor":0.2,"confidence":1.5}}"#,
        );
        assert_matches!(result, Err(CoreError::ResultParseError(ref m)) if m.contains("confidence"));
    }

    #[test]
    fn rejects_garbage_and_empty_output() {
        assert_matches!(
            parse_computation_output("Segmentation fault"),
            Err(CoreError::ResultParseError(_))
        );
        assert_matches!(
            parse_computation_output("   \n"),
            Err(CoreError::ResultParseError(_))
        );
    }

    #[test]
    fn rejects_missing_sections() {
        assert_matches!(
            parse_computation_output(r#"{"success":true,"measurements":{}}"#),
            Err(CoreError::ResultParseError(ref m)) if m == "missing calibration"
        );
        assert_matches!(
            parse_computation_output(r#"{"measurements":{}}"#),
            Err(CoreError::ResultParseError(ref m)) if m == "missing success flag"
        );
    }

    #[test]
    fn rejects_non_numeric_known_measurement() {
        let result = parse_computation_output(
            r#"{"success":true,"measurements":{"chest":"big"},
                "calibration":{"method":"height","factor":0.2,"confidence":0.5}}"#,
        );
        assert_matches!(result, Err(CoreError::ResultParseError(_)));
    }

    #[test]
    fn measurement_set_serializes_with_snake_case_keys() {
        let mut set = MeasurementSet::new();
        set.insert(MeasurementName::SleeveLength, 61.0);
        assert_eq!(
            serde_json::to_string(&set).unwrap(),
            r#"{"sleeve_length":61.0}"#
        );
    }
}
