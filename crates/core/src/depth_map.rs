//! Sensor depth-map payload parsing.
//!
//! Wire format (JSON):
//!
//! ```text
//! { "width": 256, "height": 192, "data": [f32, ...], "timestamp": "...",
//!   "intrinsics": { "fx": .., "fy": .., "cx": .., "cy": .. } }
//! ```
//!
//! Only structural checks are made. Depth values themselves are passed
//! through untouched.

use serde::{Deserialize, Serialize};

/// Sensor width used when the payload omits `width`.
pub const DEFAULT_DEPTH_WIDTH: u32 = 256;

/// Sensor height used when the payload omits `height`.
pub const DEFAULT_DEPTH_HEIGHT: u32 = 192;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DepthMapError {
    #[error("depth payload is empty")]
    Empty,

    #[error("depth payload is not valid JSON: {0}")]
    Malformed(String),

    #[error("depth payload has the wrong shape: {0}")]
    Shape(String),

    #[error("depth map {field} must be a positive integer")]
    Dimension { field: &'static str },

    #[error("depth data length mismatch: expected {expected} values, got {actual}")]
    DataLength { expected: usize, actual: usize },

    #[error("depth intrinsics must contain numeric fx, fy, cx and cy")]
    Intrinsics,
}

impl DepthMapError {
    /// True when the payload could not be read as JSON at all, as opposed to
    /// a JSON document that describes an unusable grid.
    pub fn is_syntactic(&self) -> bool {
        matches!(self, Self::Empty | Self::Malformed(_))
    }
}

/// Pinhole camera intrinsics in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraIntrinsics {
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
}

/// A validated depth grid, row-major.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DepthMap {
    pub width: u32,
    pub height: u32,
    pub data: Vec<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intrinsics: Option<CameraIntrinsics>,
}

impl DepthMap {
    /// Number of cells in the grid.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Depth at column `x`, row `y`.
    pub fn get(&self, x: u32, y: u32) -> Option<f32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.data.get((y as usize) * (self.width as usize) + x as usize).copied()
    }
}

// ---------------------------------------------------------------------------
// Wire structures
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RawDepthMap {
    #[serde(default)]
    width: Option<serde_json::Value>,
    #[serde(default)]
    height: Option<serde_json::Value>,
    data: Vec<f32>,
    #[serde(default)]
    timestamp: Option<RawTimestamp>,
    #[serde(default)]
    intrinsics: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawTimestamp {
    Text(String),
    Number(serde_json::Number),
}

impl RawTimestamp {
    fn into_string(self) -> String {
        match self {
            Self::Text(s) => s,
            Self::Number(n) => n.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Parse and structurally validate a raw depth payload.
///
/// `width`/`height` fall back to [`DEFAULT_DEPTH_WIDTH`] x
/// [`DEFAULT_DEPTH_HEIGHT`] only when absent or null. A present value that
/// is not a positive integer is rejected.
pub fn parse_depth_map(payload: &str) -> Result<DepthMap, DepthMapError> {
    let payload = payload.trim();
    if payload.is_empty() {
        return Err(DepthMapError::Empty);
    }

    let raw: RawDepthMap = serde_json::from_str(payload).map_err(|e| {
        if e.is_data() {
            DepthMapError::Shape(e.to_string())
        } else {
            DepthMapError::Malformed(e.to_string())
        }
    })?;

    let width = dimension(raw.width.as_ref(), "width", DEFAULT_DEPTH_WIDTH)?;
    let height = dimension(raw.height.as_ref(), "height", DEFAULT_DEPTH_HEIGHT)?;

    let expected = (width as usize) * (height as usize);
    if raw.data.len() != expected {
        return Err(DepthMapError::DataLength {
            expected,
            actual: raw.data.len(),
        });
    }

    let intrinsics = match raw.intrinsics {
        None | Some(serde_json::Value::Null) => None,
        Some(value) => Some(parse_intrinsics(&value)?),
    };

    Ok(DepthMap {
        width,
        height,
        data: raw.data,
        timestamp: raw.timestamp.map(RawTimestamp::into_string),
        intrinsics,
    })
}

fn dimension(
    value: Option<&serde_json::Value>,
    field: &'static str,
    default: u32,
) -> Result<u32, DepthMapError> {
    match value {
        None | Some(serde_json::Value::Null) => Ok(default),
        Some(v) => v
            .as_u64()
            .filter(|n| *n > 0)
            .and_then(|n| u32::try_from(n).ok())
            .ok_or(DepthMapError::Dimension { field }),
    }
}

/// Accepts `{fx, fy, cx, cy}` or a 3x3 camera matrix
/// `[[fx, 0, cx], [0, fy, cy], [0, 0, 1]]`.
fn parse_intrinsics(value: &serde_json::Value) -> Result<CameraIntrinsics, DepthMapError> {
    if value.is_object() {
        return serde_json::from_value(value.clone()).map_err(|_| DepthMapError::Intrinsics);
    }

    let rows = value.as_array().ok_or(DepthMapError::Intrinsics)?;
    if rows.len() != 3 {
        return Err(DepthMapError::Intrinsics);
    }
    let cell = |r: usize, c: usize| -> Result<f64, DepthMapError> {
        rows[r]
            .as_array()
            .filter(|row| row.len() == 3)
            .and_then(|row| row[c].as_f64())
            .ok_or(DepthMapError::Intrinsics)
    };

    Ok(CameraIntrinsics {
        fx: cell(0, 0)?,
        fy: cell(1, 1)?,
        cx: cell(0, 2)?,
        cy: cell(1, 2)?,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
