//! Conversion of a resolved calibration into a computation invocation.
//!
//! Arguments are always emitted in the joined `--name=value` form, so a
//! value that starts with `--` can never be read as a flag by the script's
//! argument parser. No shell is involved at any point.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::calibration::{CalibrationParams, ReferenceSpec, ResolvedCalibration};
use crate::config::ComputationConfig;
use crate::error::CoreError;

pub const ARG_INPUT: &str = "input";
pub const ARG_OUTPUT: &str = "output";
pub const ARG_CALIBRATION: &str = "calibration";
pub const ARG_REFERENCE_OBJECT: &str = "reference_object";
pub const ARG_REFERENCE_WIDTH: &str = "reference_width";
pub const ARG_REFERENCE_HEIGHT: &str = "reference_height";
pub const ARG_PERSON_HEIGHT: &str = "person_height";
pub const ARG_DEPTH_MAP: &str = "depth_map";
pub const ARG_CAMERA_INTRINSICS: &str = "camera_intrinsics";
pub const ARG_CALIBRATION_FACTOR: &str = "calibration_factor";

/// Replacement text for sensitive values in logs.
pub const REDACTED: &str = "[REDACTED]";

/// Filesystem locations the computation reads from and writes to.
#[derive(Debug, Clone)]
pub struct InvocationPaths {
    pub input: PathBuf,
    pub output: PathBuf,
    /// Persisted depth map; required for spatial calibration.
    pub depth_map: Option<PathBuf>,
}

/// A single named argument.
#[derive(Debug, Clone, PartialEq)]
pub struct InvocationArg {
    pub name: &'static str,
    pub value: String,
    /// Masked in logs.
    pub sensitive: bool,
}

impl InvocationArg {
    fn render(&self) -> String {
        format!("--{}={}", self.name, self.value)
    }

    fn render_redacted(&self) -> String {
        if self.sensitive {
            format!("--{}={REDACTED}", self.name)
        } else {
            self.render()
        }
    }
}

/// Everything needed to launch the computation once.
#[derive(Debug, Clone)]
pub struct InvocationSpec {
    pub program: String,
    pub script: Option<String>,
    pub args: Vec<InvocationArg>,
    pub timeout: Duration,
}

impl InvocationSpec {
    /// Value of the named argument, if it was emitted.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.args
            .iter()
            .find(|arg| arg.name == name)
            .map(|arg| arg.value.as_str())
    }

    /// Argument vector passed to `program`, script first.
    pub fn argv(&self) -> Vec<String> {
        self.script_prefix()
            .chain(self.args.iter().map(InvocationArg::render))
            .collect()
    }

    /// Like [`argv`](Self::argv) with sensitive values masked.
    pub fn redacted_argv(&self) -> Vec<String> {
        self.script_prefix()
            .chain(self.args.iter().map(InvocationArg::render_redacted))
            .collect()
    }

    fn script_prefix(&self) -> impl Iterator<Item = String> + '_ {
        self.script.iter().cloned()
    }
}

#[derive(Default)]
struct ArgList(Vec<InvocationArg>);

impl ArgList {
    fn push(&mut self, name: &'static str, value: String) {
        self.0.push(InvocationArg {
            name,
            value,
            sensitive: false,
        });
    }

    fn push_sensitive(&mut self, name: &'static str, value: String) {
        self.0.push(InvocationArg {
            name,
            value,
            sensitive: true,
        });
    }
}

/// Build the invocation for `resolved`.
///
/// Emits the fixed `input`, `output`, `calibration` prefix followed by the
/// method's own parameters. Optional parameters without a value are left
/// out entirely.
pub fn build_invocation(
    resolved: &ResolvedCalibration,
    paths: &InvocationPaths,
    config: &ComputationConfig,
) -> Result<InvocationSpec, CoreError> {
    let script = config.script_path.as_deref().map(path_value).transpose()?;

    let mut args = ArgList::default();
    args.push(ARG_INPUT, path_value(&paths.input)?);
    args.push(ARG_OUTPUT, path_value(&paths.output)?);
    args.push(ARG_CALIBRATION, resolved.method().as_str().to_string());

    match &resolved.params {
        CalibrationParams::Reference(ReferenceSpec::Known(obj)) => {
            args.push(ARG_REFERENCE_OBJECT, obj.as_str().to_string());
        }
        CalibrationParams::Reference(ReferenceSpec::Custom {
            width_cm,
            height_cm,
        }) => {
            args.push(ARG_REFERENCE_WIDTH, number_value(*width_cm));
            args.push(ARG_REFERENCE_HEIGHT, number_value(*height_cm));
        }
        CalibrationParams::Height { person_height_cm } => {
            args.push_sensitive(ARG_PERSON_HEIGHT, number_value(*person_height_cm));
        }
        CalibrationParams::Spatial {
            camera_intrinsics, ..
        } => {
            let depth_path = paths.depth_map.as_deref().ok_or_else(|| {
                CoreError::Internal("spatial invocation built without a persisted depth map".into())
            })?;
            args.push_sensitive(ARG_DEPTH_MAP, path_value(depth_path)?);
            if let Some(raw) = camera_intrinsics {
                args.push(ARG_CAMERA_INTRINSICS, raw.clone());
            }
        }
        CalibrationParams::Direct { factor } => {
            args.push(ARG_CALIBRATION_FACTOR, number_value(*factor));
        }
    }

    if let Some(arg) = args.0.iter().find(|arg| arg.value.contains('\0')) {
        return Err(CoreError::Validation(crate::validation::FieldErrors::single(
            arg.name,
            "The value contains invalid characters.",
        )));
    }

    Ok(InvocationSpec {
        program: config.program.clone(),
        script,
        args: args.0,
        timeout: config.timeout,
    })
}

/// Paths are handed over verbatim; one that is not valid UTF-8 cannot be.
fn path_value(path: &Path) -> Result<String, CoreError> {
    path.to_str().map(str::to_string).ok_or_else(|| {
        CoreError::Internal(format!("path is not valid UTF-8: {}", path.display()))
    })
}

/// Shortest round-trippable decimal (`175.0` renders as `175`).
fn number_value(n: f64) -> String {
    n.to_string()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
