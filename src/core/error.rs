//! Error types for the locator engine.
//!
//! This module provides structured error handling using thiserror, and the
//! exit-code taxonomy the engine reports instead of propagating numerical
//! anomalies across its public boundary (see `ExitCode`).

use thiserror::Error;
use std::path::PathBuf;

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors that can occur while loading inputs, parsing requests, or driving
/// the engine's I/O boundary. Numerical anomalies inside a location run are
/// *not* represented here — they surface as an [`ExitCode`] on the response
/// instead (see [`ExitCode`]'s doc comment for the taxonomy).
#[derive(Error, Debug)]
pub enum EngineError {
    /// IO error during file operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Malformed request, unparseable pick, or missing required field.
    #[error("bad input: {message}")]
    BadInput { message: String },

    /// Auxiliary reference data file not found or unreadable.
    #[error("auxiliary data file not found: {path}")]
    AuxDataNotFound { path: PathBuf },

    /// Malformed zone-key or zone-stat binary file.
    #[error("malformed auxiliary data file {path}: {message}")]
    MalformedAuxData { path: PathBuf, message: String },

    /// Invalid engine configuration.
    #[error("invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// Generic error with context.
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<EngineError>,
    },
}

impl EngineError {
    /// Wrap an error with additional context.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        EngineError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Create a bad-input error.
    pub fn bad_input(message: impl Into<String>) -> Self {
        EngineError::BadInput {
            message: message.into(),
        }
    }

    /// Create an invalid-configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        EngineError::InvalidConfig {
            message: message.into(),
        }
    }
}

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error.
    fn context(self, ctx: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, ctx: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(ctx))
    }
}

/// Exit codes the engine reports on a location response. `PhaseIdChanged` is
/// an internal signal between `Stepper` and `LocationLoop` and is never the
/// final code in a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExitCode {
    Success,
    NearlyConverged,
    DidNotConverge,
    UnstableSolution,
    InsufficientData,
    SingularMatrix,
    EllipsoidFailed,
    BadDepth,
    /// Internal: a `Stepper::make_step` call forced re-identification.
    /// `LocationLoop` consumes this and keeps iterating; it never escapes.
    PhaseIdChanged,
    DidNotMove,
    ErrorsNotComputed,
    LocationFailed,
    UnknownStatus,
}

impl ExitCode {
    /// `true` for any status that represents a usable, if imperfect, solution.
    pub fn is_success_family(self) -> bool {
        matches!(
            self,
            ExitCode::Success | ExitCode::NearlyConverged | ExitCode::DidNotMove
        )
    }

    /// Process exit status (0 success family, 1 otherwise) for the CLI.
    pub fn process_status(self) -> i32 {
        if self.is_success_family() {
            0
        } else {
            1
        }
    }
}

impl std::fmt::Display for ExitCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ExitCode::Success => "SUCCESS",
            ExitCode::NearlyConverged => "NEARLY_CONVERGED",
            ExitCode::DidNotConverge => "DID_NOT_CONVERGE",
            ExitCode::UnstableSolution => "UNSTABLE_SOLUTION",
            ExitCode::InsufficientData => "INSUFFICIENT_DATA",
            ExitCode::SingularMatrix => "SINGULAR_MATRIX",
            ExitCode::EllipsoidFailed => "ELLIPSOID_FAILED",
            ExitCode::BadDepth => "BAD_DEPTH",
            ExitCode::PhaseIdChanged => "PHASEID_CHANGED",
            ExitCode::DidNotMove => "DID_NOT_MOVE",
            ExitCode::ErrorsNotComputed => "ERRORS_NOT_COMPUTED",
            ExitCode::LocationFailed => "LOCATION_FAILED",
            ExitCode::UnknownStatus => "UNKNOWN_STATUS",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bad_input_display() {
        let err = EngineError::bad_input("missing site.lat");
        assert!(err.to_string().contains("missing site.lat"));
    }

    #[test]
    fn with_context_chains() {
        let err = EngineError::bad_input("bad pick").with_context("parsing request");
        assert!(err.to_string().contains("parsing request"));
        assert!(err.to_string().contains("bad pick"));
    }

    #[test]
    fn result_ext_context() {
        let result: Result<()> = Err(EngineError::invalid_config("bad earth model"));
        let wrapped = result.context("loading config");
        assert!(wrapped.unwrap_err().to_string().contains("loading config"));
    }

    #[test]
    fn io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "nope");
        let err: EngineError = io_err.into();
        assert!(matches!(err, EngineError::Io(_)));
    }

    #[test]
    fn exit_code_process_status() {
        assert_eq!(ExitCode::Success.process_status(), 0);
        assert_eq!(ExitCode::NearlyConverged.process_status(), 0);
        assert_eq!(ExitCode::DidNotConverge.process_status(), 1);
        assert_eq!(ExitCode::InsufficientData.process_status(), 1);
    }

    #[test]
    fn exit_code_display_matches_wire_names() {
        assert_eq!(ExitCode::InsufficientData.to_string(), "INSUFFICIENT_DATA");
        assert_eq!(ExitCode::PhaseIdChanged.to_string(), "PHASEID_CHANGED");
    }

    #[test]
    fn exit_code_roundtrips_json() {
        let json = serde_json::to_string(&ExitCode::BadDepth).unwrap();
        assert_eq!(json, "\"BAD_DEPTH\"");
        let back: ExitCode = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ExitCode::BadDepth);
    }
}
