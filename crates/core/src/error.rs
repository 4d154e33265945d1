use crate::depth_map::DepthMapError;
use crate::request::FIELD_DEPTH_MAP_DATA;
use crate::validation::FieldErrors;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// One or more request fields failed validation.
    #[error("Validation failed: {0}")]
    Validation(FieldErrors),

    /// The sensor depth payload is structurally invalid.
    #[error("Invalid depth format: {0}")]
    InvalidDepthFormat(String),

    /// The external computation exited non-zero, timed out, or could not
    /// be launched.
    #[error("Measurement computation failed: {reason}")]
    ComputationFailed {
        reason: String,
        exit_code: Option<i32>,
        stderr: String,
    },

    /// The external computation succeeded but its output does not satisfy
    /// the result contract.
    #[error("Unparsable computation result: {0}")]
    ResultParseError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<FieldErrors> for CoreError {
    fn from(errors: FieldErrors) -> Self {
        Self::Validation(errors)
    }
}

impl From<DepthMapError> for CoreError {
    fn from(err: DepthMapError) -> Self {
        Self::InvalidDepthFormat(err.to_string())
    }
}

impl CoreError {
    /// True for errors the caller can fix by changing the request.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::InvalidDepthFormat(_))
    }

    /// Field-level view of a client error. A depth format failure is
    /// reported under `depth_map_data`.
    pub fn field_errors(&self) -> Option<FieldErrors> {
        match self {
            Self::Validation(fields) => Some(fields.clone()),
            Self::InvalidDepthFormat(reason) => {
                Some(FieldErrors::single(FIELD_DEPTH_MAP_DATA, reason.clone()))
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_computation_failed_omits_stderr() {
        let err = CoreError::ComputationFailed {
            reason: "exit code 1".to_string(),
            exit_code: Some(1),
            stderr: "Traceback: secret path".to_string(),
        };
        assert_eq!(err.to_string(), "Measurement computation failed: exit code 1");
    }

    #[test]
    fn depth_errors_are_client_errors() {
        let err = CoreError::from(DepthMapError::DataLength {
            expected: 12,
            actual: 13,
        });
        assert!(err.is_client_error());
        assert!(err.to_string().contains("expected 12"));
    }

    #[test]
    fn processing_errors_are_not_client_errors() {
        assert!(!CoreError::ResultParseError("bad json".into()).is_client_error());
        assert!(!CoreError::Internal("boom".into()).is_client_error());
    }
}
