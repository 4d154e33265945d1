//! Calibration methods and their typed parameter sets.
//!
//! [`CalibrationParams`] is built exactly once, by [`resolver::resolve`].
//! Downstream stages match on it and never re-read raw request fields.

pub mod reference;
pub mod resolver;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::depth_map::DepthMap;

pub use reference::{ReferenceChoice, ReferenceObject};
pub use resolver::{resolve, SPATIAL_FALLBACK_REASON};

/// Strategy used to convert pixels into centimeters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CalibrationMethod {
    Reference,
    Height,
    Spatial,
    Direct,
}

impl CalibrationMethod {
    pub const ALL: [CalibrationMethod; 4] =
        [Self::Reference, Self::Height, Self::Spatial, Self::Direct];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Reference => "reference",
            Self::Height => "height",
            Self::Spatial => "spatial",
            Self::Direct => "direct",
        }
    }
}

impl fmt::Display for CalibrationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CalibrationMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| format!("Unknown calibration method '{s}'"))
    }
}

/// How the reference object's real-world size is known.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ReferenceSpec {
    Known(ReferenceObject),
    Custom { width_cm: f64, height_cm: f64 },
}

impl ReferenceSpec {
    /// `(width, height)` in centimeters.
    pub fn dimensions(&self) -> (f64, f64) {
        match *self {
            Self::Known(obj) => obj.dimensions(),
            Self::Custom {
                width_cm,
                height_cm,
            } => (width_cm, height_cm),
        }
    }

    /// Type label as reported in calibration metadata.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Known(obj) => obj.as_str(),
            Self::Custom { .. } => reference::CUSTOM_REFERENCE,
        }
    }
}

/// Method plus only the parameters that method needs.
#[derive(Debug, Clone, PartialEq)]
pub enum CalibrationParams {
    Reference(ReferenceSpec),
    Height {
        person_height_cm: f64,
    },
    Spatial {
        depth_map: DepthMap,
        /// Raw camera intrinsics payload, forwarded verbatim.
        camera_intrinsics: Option<String>,
    },
    Direct {
        factor: f64,
    },
}

impl CalibrationParams {
    pub fn method(&self) -> CalibrationMethod {
        match self {
            Self::Reference(_) => CalibrationMethod::Reference,
            Self::Height { .. } => CalibrationMethod::Height,
            Self::Spatial { .. } => CalibrationMethod::Spatial,
            Self::Direct { .. } => CalibrationMethod::Direct,
        }
    }
}

/// Outcome of method resolution for one request.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedCalibration {
    pub params: CalibrationParams,
    /// Set only when the requested method could not be honoured.
    pub fallback_reason: Option<String>,
}

impl ResolvedCalibration {
    pub fn method(&self) -> CalibrationMethod {
        self.params.method()
    }
}
