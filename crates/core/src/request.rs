//! Inbound measurement request as received from the transport layer.
//!
//! Every optional field is the raw form value. Typing happens in
//! [`crate::validation`], which produces a [`ValidatedRequest`](crate::validation::ValidatedRequest).

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub const FIELD_IMAGE: &str = "image";
pub const FIELD_CALIBRATION_METHOD: &str = "calibration_method";
pub const FIELD_PERSON_HEIGHT: &str = "person_height";
pub const FIELD_REFERENCE_OBJECT: &str = "reference_object";
pub const FIELD_REFERENCE_WIDTH: &str = "reference_width";
pub const FIELD_REFERENCE_HEIGHT: &str = "reference_height";
pub const FIELD_CALIBRATION_FACTOR: &str = "calibration_factor";
pub const FIELD_HAS_LIDAR: &str = "has_lidar";
pub const FIELD_DEPTH_MAP_DATA: &str = "depth_map_data";
pub const FIELD_CAMERA_INTRINSICS: &str = "camera_intrinsics";
pub const FIELD_DEVICE_PLATFORM: &str = "device_platform";
pub const FIELD_IMAGE_SOURCE: &str = "image_source";

/// One measurement request. Immutable once handed to the service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MeasurementRequest {
    /// Location of the stored input image.
    pub image: Option<PathBuf>,
    pub calibration_method: Option<String>,
    pub person_height: Option<String>,
    pub reference_object: Option<String>,
    pub reference_width: Option<String>,
    pub reference_height: Option<String>,
    pub calibration_factor: Option<String>,
    pub has_lidar: Option<String>,
    pub depth_map_data: Option<String>,
    pub camera_intrinsics: Option<String>,
    pub device_platform: Option<String>,
    pub image_source: Option<String>,
}

impl MeasurementRequest {
    pub fn with_image(image: impl Into<PathBuf>) -> Self {
        Self {
            image: Some(image.into()),
            ..Self::default()
        }
    }

    /// Assign a text form field by name. Returns `false` for unknown names
    /// so the caller can decide whether to ignore them.
    pub fn set_field(&mut self, name: &str, value: String) -> bool {
        let slot = match name {
            FIELD_CALIBRATION_METHOD => &mut self.calibration_method,
            FIELD_PERSON_HEIGHT => &mut self.person_height,
            FIELD_REFERENCE_OBJECT => &mut self.reference_object,
            FIELD_REFERENCE_WIDTH => &mut self.reference_width,
            FIELD_REFERENCE_HEIGHT => &mut self.reference_height,
            FIELD_CALIBRATION_FACTOR => &mut self.calibration_factor,
            FIELD_HAS_LIDAR => &mut self.has_lidar,
            FIELD_DEPTH_MAP_DATA => &mut self.depth_map_data,
            FIELD_CAMERA_INTRINSICS => &mut self.camera_intrinsics,
            FIELD_DEVICE_PLATFORM => &mut self.device_platform,
            FIELD_IMAGE_SOURCE => &mut self.image_source,
            _ => return false,
        };
        *slot = Some(value);
        true
    }
}
