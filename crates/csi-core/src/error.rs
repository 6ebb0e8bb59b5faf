//! Error types for site-init compilation.
//!
//! Every failure aborts the run. The variants group into four kinds
//! (input, capacity, semantic, consistency) so the driver can report a single
//! diagnostic naming the offending cabinet, subnet or xname.

use serde::Serialize;
use thiserror::Error;

/// Main error type for site-init operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Missing or unparsable input record or field
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Unparsable CIDR or address
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Not enough address space, subnets or VLANs
    #[error("Insufficient capacity: {0}")]
    Capacity(String),

    /// Cabinet or chassis configuration that cannot be honoured
    #[error("Invalid cabinet configuration: {0}")]
    InvalidCabinet(String),

    /// Two owners claimed the same name or address
    #[error("Reservation conflict: {0}")]
    ReservationConflict(String),

    /// Structurally invalid hierarchical hardware address
    #[error("Invalid xname: {0}")]
    InvalidXname(String),

    /// Switch that cannot be typed or has no brand/model
    #[error("Invalid switch: {0}")]
    InvalidSwitch(String),

    /// Cross-entity consistency violation found during assembly
    #[error("Consistency violation: {0}")]
    Consistency(String),

    /// Named entity not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Validation error
    #[error("Validation error: {0}")]
    ValidationError(String),
}

/// Specialized result type for site-init operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Missing file or field, unparsable value
    Input,
    /// Address space, subnet or VLAN exhaustion
    Capacity,
    /// Well-formed input that violates a domain rule
    Semantic,
    /// Entities that do not line up after assembly
    Consistency,
}

/// Structured error response for serialization.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ErrorResponse {
    /// Error details
    pub error: ErrorDetail,
}

/// Error detail structure.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ErrorDetail {
    /// Error code for programmatic handling
    pub code: String,
    /// Error classification
    pub kind: ErrorKind,
    /// Human-readable error message
    pub message: String,
}

impl Error {
    /// Returns the error code for this error type.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::InvalidAddress(_) => "INVALID_ADDRESS",
            Self::Capacity(_) => "CAPACITY",
            Self::InvalidCabinet(_) => "INVALID_CABINET",
            Self::ReservationConflict(_) => "RESERVATION_CONFLICT",
            Self::InvalidXname(_) => "INVALID_XNAME",
            Self::InvalidSwitch(_) => "INVALID_SWITCH",
            Self::Consistency(_) => "CONSISTENCY",
            Self::NotFound(_) => "NOT_FOUND",
            Self::ConfigError(_) => "CONFIG_ERROR",
            Self::ValidationError(_) => "VALIDATION_ERROR",
        }
    }

    /// Returns the classification of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput(_)
            | Self::InvalidAddress(_)
            | Self::ConfigError(_)
            | Self::ValidationError(_) => ErrorKind::Input,
            Self::Capacity(_) => ErrorKind::Capacity,
            Self::InvalidCabinet(_)
            | Self::ReservationConflict(_)
            | Self::InvalidXname(_)
            | Self::InvalidSwitch(_) => ErrorKind::Semantic,
            Self::Consistency(_) | Self::NotFound(_) => ErrorKind::Consistency,
        }
    }

    /// Converts the error into an `ErrorResponse`.
    #[must_use]
    pub fn into_error_response(self) -> ErrorResponse {
        ErrorResponse {
            error: ErrorDetail {
                code: self.error_code().to_string(),
                kind: self.kind(),
                message: self.to_string(),
            },
        }
    }
}

// Conversions from external error types
impl From<ipnet::AddrParseError> for Error {
    fn from(err: ipnet::AddrParseError) -> Self {
        Self::InvalidAddress(err.to_string())
    }
}

impl From<std::net::AddrParseError> for Error {
    fn from(err: std::net::AddrParseError) -> Self {
        Self::InvalidAddress(err.to_string())
    }
}

impl From<ipnet::PrefixLenError> for Error {
    fn from(err: ipnet::PrefixLenError) -> Self {
        Self::InvalidAddress(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidInput(err.to_string())
    }
}

impl From<validator::ValidationErrors> for Error {
    fn from(err: validator::ValidationErrors) -> Self {
        Self::ValidationError(err.to_string())
    }
}
