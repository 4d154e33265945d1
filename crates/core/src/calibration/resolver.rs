//! Calibration method resolution.
//!
//! The precedence chain, first match wins:
//!
//! 1. explicit `calibration_method` (spatial is checked for usable depth data)
//! 2. `calibration_factor` -> direct
//! 3. `has_lidar` with a parseable `depth_map_data` -> spatial
//! 4. `person_height` -> height
//! 5. `reference_object` -> reference
//! 6. reference
//!
//! A spatial request without usable depth data falls back to height when a
//! person height is available and to reference otherwise. That is the only
//! automatic substitution.

use crate::error::CoreError;
use crate::request::{
    FIELD_CALIBRATION_FACTOR, FIELD_DEPTH_MAP_DATA, FIELD_PERSON_HEIGHT, FIELD_REFERENCE_HEIGHT,
    FIELD_REFERENCE_OBJECT, FIELD_REFERENCE_WIDTH,
};
use crate::validation::{FieldErrors, ValidatedRequest};

use super::reference::ReferenceChoice;
use super::{CalibrationMethod, CalibrationParams, ReferenceSpec, ResolvedCalibration};

pub const SPATIAL_FALLBACK_REASON: &str = "Spatial calibration failed: no usable depth data";

/// Method chosen by the precedence chain, before parameters are checked.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MethodSelection {
    pub method: CalibrationMethod,
    pub fell_back: bool,
}

/// Run the precedence chain over a validated request.
pub fn select_method(request: &ValidatedRequest) -> MethodSelection {
    let chosen = |method| MethodSelection {
        method,
        fell_back: false,
    };

    if let Some(method) = request.calibration_method {
        if method == CalibrationMethod::Spatial && request.usable_depth().is_none() {
            return spatial_fallback(request);
        }
        return chosen(method);
    }

    if request.calibration_factor.is_some() {
        return chosen(CalibrationMethod::Direct);
    }

    if request.has_lidar && request.depth.is_some() {
        if request.usable_depth().is_some() {
            return chosen(CalibrationMethod::Spatial);
        }
        // Depth data was sent for a LiDAR capture but cannot be used.
        return spatial_fallback(request);
    }

    if request.person_height_cm.is_some() {
        return chosen(CalibrationMethod::Height);
    }

    // Rule 5 and the terminal default agree; a missing reference object is
    // reported when the reference parameters are built.
    chosen(CalibrationMethod::Reference)
}

fn spatial_fallback(request: &ValidatedRequest) -> MethodSelection {
    let method = if request.person_height_cm.is_some() {
        CalibrationMethod::Height
    } else {
        CalibrationMethod::Reference
    };
    MethodSelection {
        method,
        fell_back: true,
    }
}

/// Resolve the calibration method and build its typed parameters.
///
/// Fails with field errors when the chosen method lacks a required
/// parameter. If that happens after a spatial fallback, the depth payload's
/// structural error is included too.
pub fn resolve(request: &ValidatedRequest) -> Result<ResolvedCalibration, FieldErrors> {
    let selection = select_method(request);

    let params = build_params(selection.method, request).map_err(|mut errors| {
        if selection.fell_back {
            if let Some(depth_fields) = request
                .depth_error()
                .and_then(|err| CoreError::from(err.clone()).field_errors())
            {
                errors.merge(depth_fields);
            }
        }
        errors
    })?;

    if selection.fell_back {
        tracing::warn!(
            resolved = %params.method(),
            depth_error = ?request.depth_error().map(ToString::to_string),
            "Spatial calibration unavailable, falling back"
        );
    }

    Ok(ResolvedCalibration {
        params,
        fallback_reason: selection
            .fell_back
            .then(|| SPATIAL_FALLBACK_REASON.to_string()),
    })
}

fn build_params(
    method: CalibrationMethod,
    request: &ValidatedRequest,
) -> Result<CalibrationParams, FieldErrors> {
    match method {
        CalibrationMethod::Direct => request
            .calibration_factor
            .map(|factor| CalibrationParams::Direct { factor })
            .ok_or_else(|| {
                FieldErrors::single(
                    FIELD_CALIBRATION_FACTOR,
                    "The calibration factor is required for direct calibration.",
                )
            }),
        CalibrationMethod::Height => request
            .person_height_cm
            .map(|person_height_cm| CalibrationParams::Height { person_height_cm })
            .ok_or_else(|| {
                FieldErrors::single(
                    FIELD_PERSON_HEIGHT,
                    "The person height is required for height calibration.",
                )
            }),
        CalibrationMethod::Spatial => request
            .usable_depth()
            .map(|depth_map| CalibrationParams::Spatial {
                depth_map: depth_map.clone(),
                camera_intrinsics: request.camera_intrinsics.clone(),
            })
            .ok_or_else(|| {
                FieldErrors::single(
                    FIELD_DEPTH_MAP_DATA,
                    "Usable depth map data is required for spatial calibration.",
                )
            }),
        CalibrationMethod::Reference => reference_spec(request).map(CalibrationParams::Reference),
    }
}

fn reference_spec(request: &ValidatedRequest) -> Result<ReferenceSpec, FieldErrors> {
    let custom_pair = request
        .reference_width_cm
        .zip(request.reference_height_cm)
        .map(|(width_cm, height_cm)| ReferenceSpec::Custom {
            width_cm,
            height_cm,
        });

    match request.reference_object {
        Some(ReferenceChoice::Known(obj)) => Ok(ReferenceSpec::Known(obj)),
        Some(ReferenceChoice::Custom) => custom_pair.ok_or_else(|| {
            let mut errors = FieldErrors::new();
            if request.reference_width_cm.is_none() {
                errors.add(
                    FIELD_REFERENCE_WIDTH,
                    "The reference width is required for a custom reference object.",
                );
            }
            if request.reference_height_cm.is_none() {
                errors.add(
                    FIELD_REFERENCE_HEIGHT,
                    "The reference height is required for a custom reference object.",
                );
            }
            errors
        }),
        None => custom_pair.ok_or_else(|| {
            FieldErrors::single(
                FIELD_REFERENCE_OBJECT,
                "A reference object (or reference width and height) is required for reference calibration.",
            )
        }),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::calibration::ReferenceObject;
    use crate::request::MeasurementRequest;
    use crate::validation::validate_request;

    fn depth_payload(width: u32, height: u32, len: usize) -> String {
        serde_json::json!({ "width": width, "height": height, "data": vec![2.0_f32; len] })
            .to_string()
    }

    fn validated(fields: &[(&str, &str)]) -> ValidatedRequest {
        let mut req = MeasurementRequest::with_image("/srv/uploads/person.jpg");
        for (name, value) in fields {
            assert!(req.set_field(name, value.to_string()), "unknown field {name}");
        }
        validate_request(&req).expect("request should validate")
    }

    #[test]
    fn reference_object_alone_resolves_to_reference() {
        let resolved = resolve(&validated(&[("reference_object", "credit_card")])).unwrap();
        assert_eq!(
            resolved.params,
            CalibrationParams::Reference(ReferenceSpec::Known(ReferenceObject::CreditCard))
        );
        assert!(resolved.fallback_reason.is_none());
    }

    #[test]
    fn scenario_a_explicit_height() {
        let resolved = resolve(&validated(&[
            ("calibration_method", "height"),
            ("person_height", "175"),
        ]))
        .unwrap();
        assert_eq!(
            resolved.params,
            CalibrationParams::Height {
                person_height_cm: 175.0
            }
        );
        assert!(resolved.fallback_reason.is_none());
    }

    #[test]
    fn scenario_b_explicit_spatial_with_valid_depth() {
        let payload = depth_payload(256, 192, 256 * 192);
        let resolved = resolve(&validated(&[
            ("calibration_method", "spatial"),
            ("has_lidar", "true"),
            ("depth_map_data", payload.as_str()),
        ]))
        .unwrap();
        assert_eq!(resolved.method(), CalibrationMethod::Spatial);
        assert!(resolved.fallback_reason.is_none());
        assert_matches!(
            resolved.params,
            CalibrationParams::Spatial { ref depth_map, camera_intrinsics: None }
                if depth_map.width == 256 && depth_map.height == 192
        );
    }

    #[test]
    fn scenario_c_spatial_without_depth_falls_back_to_height() {
        let resolved = resolve(&validated(&[
            ("calibration_method", "spatial"),
            ("has_lidar", "true"),
            ("person_height", "180"),
        ]))
        .unwrap();
        assert_eq!(
            resolved.params,
            CalibrationParams::Height {
                person_height_cm: 180.0
            }
        );
        assert_eq!(resolved.fallback_reason.as_deref(), Some(SPATIAL_FALLBACK_REASON));
    }

    #[test]
    fn scenario_d_factor_alone_resolves_to_direct() {
        let payload = depth_payload(2, 2, 4);
        let resolved = resolve(&validated(&[
            ("calibration_factor", "0.21"),
            ("person_height", "170"),
            ("reference_object", "a4_paper"),
            ("has_lidar", "true"),
            ("depth_map_data", payload.as_str()),
        ]))
        .unwrap();
        assert_eq!(resolved.params, CalibrationParams::Direct { factor: 0.21 });
    }

    #[test]
    fn explicit_method_is_not_overridden() {
        let resolved = resolve(&validated(&[
            ("calibration_method", "reference"),
            ("reference_object", "a4_paper"),
            ("calibration_factor", "0.5"),
            ("person_height", "170"),
        ]))
        .unwrap();
        assert_eq!(resolved.method(), CalibrationMethod::Reference);
    }

    #[test]
    fn lidar_with_mismatched_depth_falls_back_to_height() {
        let payload = depth_payload(4, 3, 13);
        let resolved = resolve(&validated(&[
            ("has_lidar", "true"),
            ("depth_map_data", payload.as_str()),
            ("person_height", "165"),
        ]))
        .unwrap();
        assert_eq!(resolved.method(), CalibrationMethod::Height);
        assert_eq!(resolved.fallback_reason.as_deref(), Some(SPATIAL_FALLBACK_REASON));
    }

    #[test]
    fn lidar_with_mismatched_depth_and_no_height_falls_back_to_reference() {
        let payload = depth_payload(4, 3, 13);
        let resolved = resolve(&validated(&[
            ("has_lidar", "true"),
            ("depth_map_data", payload.as_str()),
            ("reference_object", "a4_paper"),
        ]))
        .unwrap();
        assert_eq!(resolved.method(), CalibrationMethod::Reference);
        assert_eq!(resolved.fallback_reason.as_deref(), Some(SPATIAL_FALLBACK_REASON));
    }

    #[test]
    fn fallback_to_reference_without_object_reports_depth_error() {
        let payload = depth_payload(4, 3, 13);
        let errors = resolve(&validated(&[
            ("calibration_method", "spatial"),
            ("depth_map_data", payload.as_str()),
        ]))
        .unwrap_err();
        assert!(errors.contains("reference_object"));
        let depth = errors.get("depth_map_data").expect("depth error surfaced");
        assert!(depth[0].contains("expected 12 values, got 13"));
    }

    #[test]
    fn lidar_flag_without_depth_is_not_spatial() {
        let resolved = resolve(&validated(&[("has_lidar", "true"), ("person_height", "170")]))
            .unwrap();
        assert_eq!(resolved.method(), CalibrationMethod::Height);
        assert!(resolved.fallback_reason.is_none());
    }

    #[test]
    fn depth_without_lidar_flag_is_not_spatial() {
        let payload = depth_payload(2, 2, 4);
        let resolved = resolve(&validated(&[
            ("depth_map_data", payload.as_str()),
            ("person_height", "170"),
        ]))
        .unwrap();
        assert_eq!(resolved.method(), CalibrationMethod::Height);
    }

    #[test]
    fn implicit_spatial_forwards_camera_intrinsics() {
        let payload = depth_payload(2, 2, 4);
        let intrinsics = r#"{"fx":500,"fy":500,"cx":1,"cy":1}"#;
        let resolved = resolve(&validated(&[
            ("has_lidar", "1"),
            ("depth_map_data", payload.as_str()),
            ("camera_intrinsics", intrinsics),
        ]))
        .unwrap();
        assert_matches!(
            resolved.params,
            CalibrationParams::Spatial { camera_intrinsics: Some(ref raw), .. } if raw == intrinsics
        );
    }

    #[test]
    fn terminal_default_without_object_is_a_reference_error() {
        let errors = resolve(&validated(&[])).unwrap_err();
        assert_eq!(errors.fields().collect::<Vec<_>>(), ["reference_object"]);
    }

    #[test]
    fn width_height_pair_without_object_is_custom_reference() {
        let resolved = resolve(&validated(&[
            ("reference_width", "10"),
            ("reference_height", "4.5"),
        ]))
        .unwrap();
        assert_eq!(
            resolved.params,
            CalibrationParams::Reference(ReferenceSpec::Custom {
                width_cm: 10.0,
                height_cm: 4.5
            })
        );
    }

    #[test]
    fn custom_object_requires_both_dimensions() {
        let errors = resolve(&validated(&[
            ("reference_object", "custom"),
            ("reference_width", "10"),
        ]))
        .unwrap_err();
        assert_eq!(errors.fields().collect::<Vec<_>>(), ["reference_height"]);
    }

    #[test]
    fn explicit_direct_without_factor_is_an_error() {
        let errors = resolve(&validated(&[("calibration_method", "direct")])).unwrap_err();
        assert!(errors.contains("calibration_factor"));
    }

    #[test]
    fn explicit_height_without_height_does_not_fall_back() {
        let errors = resolve(&validated(&[
            ("calibration_method", "height"),
            ("reference_object", "a4_paper"),
        ]))
        .unwrap_err();
        assert!(errors.contains("person_height"));
    }
}
