//! Error types and handling for Monet

/// Result type alias for Monet operations
pub type Result<T> = std::result::Result<T, MonetError>;

/// Error types for the Monet log buffer and image layer
#[derive(Debug, thiserror::Error)]
pub enum MonetError {
    /// I/O related errors (file operations, mmap, etc.)
    #[error("I/O error: {message}")]
    Io {
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    /// Memory mapping or layout failures
    #[error("Memory error: {message}")]
    Memory { message: String },

    /// Invalid parameters or configuration
    #[error("Invalid parameter: {parameter} - {message}")]
    InvalidParameter { parameter: String, message: String },

    /// Alignment requirements not met
    #[error("Alignment error: position {position} not aligned to {alignment}")]
    Alignment { position: i64, alignment: i32 },

    /// Position outside the window accepted by the image
    #[error("Position out of range: requested {requested}, window [{current}, {limit}]")]
    PositionOutOfRange {
        requested: i64,
        current: i64,
        limit: i64,
    },

    /// Log metadata version mismatch
    #[error("Version mismatch: expected {expected}, got {actual}")]
    VersionMismatch { expected: u32, actual: u32 },

    /// Platform-specific errors
    #[error("Platform error: {message}")]
    Platform { message: String },
}

impl MonetError {
    /// Create an I/O error from a standard I/O error
    pub fn from_io(source: std::io::Error, context: &str) -> Self {
        Self::Io {
            message: format!("{}: {}", context, source),
            source: Some(source),
        }
    }

    /// Create a memory error
    pub fn memory(message: impl Into<String>) -> Self {
        Self::Memory {
            message: message.into(),
        }
    }

    /// Create an invalid parameter error
    pub fn invalid_parameter(parameter: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            parameter: parameter.into(),
            message: message.into(),
        }
    }

    /// Create an alignment error
    pub fn alignment(position: i64, alignment: i32) -> Self {
        Self::Alignment {
            position,
            alignment,
        }
    }

    /// Create a position out of range error
    pub fn position_out_of_range(requested: i64, current: i64, limit: i64) -> Self {
        Self::PositionOutOfRange {
            requested,
            current,
            limit,
        }
    }

    /// Create a version mismatch error
    pub fn version_mismatch(expected: u32, actual: u32) -> Self {
        Self::VersionMismatch { expected, actual }
    }

    /// Create a platform error
    pub fn platform(message: impl Into<String>) -> Self {
        Self::Platform {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for MonetError {
    fn from(err: std::io::Error) -> Self {
        Self::from_io(err, "I/O operation failed")
    }
}
