//! Error types for Tilework.
//!
//! Uses thiserror for structured errors with context. Errors are designed to:
//! - Name the operation, port or parameter that caused them
//! - Separate precondition violations from configuration problems
//! - Support error chaining through the umbrella `TileworkError`
//!
//! Recoverable conditions inside an operation (a stale stroke history, an
//! empty stroke remainder) are never reported as errors.

use crate::core::format::PixelFormat;
use crate::core::rect::Rectangle;
use crate::core::types::ValueType;
use thiserror::Error;

/// Top-level error type for Tilework.
///
/// This enum encompasses all error categories and enables automatic
/// conversion between specific error types.
#[derive(Error, Debug)]
pub enum TileworkError {
    #[error("Operation error: {0}")]
    Operation(#[from] OperationError),

    #[error("Parameter error: {0}")]
    Parameter(#[from] ParameterError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Unknown operation '{0}'")]
    UnknownOperation(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

/// Errors raised while an operation processes a region.
///
/// Every variant aborts the processing of the requested region; nothing is
/// written to the output when one of these is returned.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OperationError {
    #[error("Missing buffer on port '{port}'")]
    MissingInput { port: String },

    #[error("Operation '{operation}' does not support {components} color component(s)")]
    UnsupportedChannelCount { operation: String, components: usize },

    #[error("Pixel format mismatch: expected {expected}, got {got}")]
    FormatMismatch { expected: PixelFormat, got: PixelFormat },

    #[error("Data size mismatch: expected {expected} floats, got {got}")]
    SizeMismatch { expected: usize, got: usize },

    #[error("Region {0} is empty")]
    EmptyRegion(Rectangle),

    #[error(transparent)]
    Parameter(#[from] ParameterError),

    #[error("{0}")]
    Other(String),
}

/// Errors from the operation parameter surface.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParameterError {
    #[error("Operation '{operation}' has no parameter '{name}'")]
    Unknown { operation: String, name: String },

    #[error("Parameter '{name}': expected {expected}, got {got}")]
    TypeMismatch {
        name: String,
        expected: ValueType,
        got: ValueType,
    },

    #[error("Parameter '{name}': value {value} is out of range [{min}, {max}]")]
    OutOfRange {
        name: String,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("Parameter '{name}': '{value}' is not one of {choices:?}")]
    InvalidChoice {
        name: String,
        value: String,
        choices: Vec<String>,
    },
}

/// Errors while loading or validating a compute configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

// ============================================================================
// Error Utilities
// ============================================================================

impl OperationError {
    /// Check if this error is a precondition violation on the inputs.
    ///
    /// Precondition violations are the host's responsibility to report; the
    /// region they were raised for is left untouched.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            OperationError::MissingInput { .. }
                | OperationError::UnsupportedChannelCount { .. }
                | OperationError::FormatMismatch { .. }
                | OperationError::SizeMismatch { .. }
        )
    }

    /// Get suggestion for fixing this error.
    pub fn suggested_fix(&self) -> Option<String> {
        match self {
            OperationError::MissingInput { port } => {
                Some(format!("Attach a buffer to the '{}' port", port))
            }
            OperationError::UnsupportedChannelCount { .. } => {
                Some("Convert the input to Y, YA, RGB or RGBA".to_string())
            }
            OperationError::FormatMismatch { expected, .. } => {
                Some(format!("Request the data as {}", expected))
            }
            OperationError::Parameter(error) => error.suggested_fix(),
            _ => None,
        }
    }
}

impl ParameterError {
    /// Name of the parameter this error refers to.
    pub fn parameter(&self) -> &str {
        match self {
            ParameterError::Unknown { name, .. }
            | ParameterError::TypeMismatch { name, .. }
            | ParameterError::OutOfRange { name, .. }
            | ParameterError::InvalidChoice { name, .. } => name,
        }
    }

    /// Get suggestion for fixing this error.
    pub fn suggested_fix(&self) -> Option<String> {
        match self {
            ParameterError::OutOfRange { name, min, max, .. } => {
                Some(format!("Clamp '{}' to [{}, {}]", name, min, max))
            }
            ParameterError::InvalidChoice { name, choices, .. } => {
                Some(format!("Set '{}' to one of: {}", name, choices.join(", ")))
            }
            ParameterError::TypeMismatch { name, expected, .. } => {
                Some(format!("Pass a {} value for '{}'", expected, name))
            }
            ParameterError::Unknown { .. } => None,
        }
    }
}

/// Result type alias for Tilework operations.
pub type TileworkResult<T> = Result<T, TileworkError>;

/// Result type alias for region processing.
pub type OperationResult<T> = Result<T, OperationError>;

/// Result type alias for parameter handling.
pub type ParameterResult<T> = Result<T, ParameterError>;

/// Result type alias for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;
