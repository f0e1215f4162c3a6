//! # Error Types
//!
//! Custom error types for the tracker decoder using `thiserror`.
//!
//! Fatal errors abort a decode and carry no record. Per-field validation
//! failures are collected into [`ValidationErrors`] and travel next to the
//! record instead (see [`crate::uplink::Decoded`]).

use std::fmt;

use thiserror::Error;

use crate::gnssng::GnssNgError;
use crate::payload::{Check, CoerceError};
use crate::solver::SolverError;

/// Main error type for the tracker decoder
#[derive(Debug, Error)]
pub enum DecoderError {
    /// Payload is not an even-length hex string
    #[error("invalid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),

    /// Payload is shorter or longer than the port layout allows
    #[error("invalid payload length: {0}")]
    InvalidPayloadLength(#[from] PayloadLengthError),

    /// A mandatory field reaches past the end of the payload
    #[error("field out of bounds: {field} needs bytes {start}..{end} but payload has {size}")]
    FieldOutOfBounds {
        field: &'static str,
        start: usize,
        end: usize,
        size: usize,
    },

    /// A read-to-end field starts at or past the end of the payload
    #[error("field start out of bounds: {field} starts at byte {start} but payload has {size}")]
    FieldStartOutOfBounds {
        field: &'static str,
        start: usize,
        size: usize,
    },

    /// Integer fields wider than 8 bytes cannot be read
    #[error("field too wide: {field} spans {length} bytes, integers hold at most 8")]
    FieldTooWide { field: &'static str, length: usize },

    /// A decoded value does not fit the record field it targets
    #[error("coercion failed: {field}: {source}")]
    Coercion {
        field: &'static str,
        #[source]
        source: CoerceError,
    },

    /// A mandatory TLV section is absent
    #[error("missing tag: {0}")]
    MissingTag(&'static str),

    /// Strict mode turned field validation failures into an error
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationErrors),

    /// The device has no layout or route for this port
    #[error("port not supported: {0}")]
    PortNotSupported(u8),

    /// The tag byte of a tagged payload does not suit the port
    #[error("unexpected tag: 0x{tag:02x} on port {port}: {reason}")]
    UnexpectedTag {
        port: u8,
        tag: u8,
        reason: &'static str,
    },

    /// The port delegates to a position solver but none is configured
    #[error("solver not configured: port {0} needs a position solver")]
    SolverNotConfigured(u8),

    /// A record could not be turned back into a payload
    #[error("encode failed: {0}")]
    Encode(String),

    /// Position solver errors
    #[error("solver error: {0}")]
    Solver(#[from] SolverError),

    /// GNSS-NG capture-time inference errors
    #[error("gnss-ng error: {0}")]
    GnssNg(#[from] GnssNgError),

    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for the tracker decoder
pub type Result<T> = std::result::Result<T, DecoderError>;

/// Payload length outside the bounds of a port layout
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PayloadLengthError {
    #[error("payload too short: expected at least {min} bytes, got {actual}")]
    TooShort { min: usize, actual: usize },

    #[error("payload too long: expected at most {max} bytes, got {actual}")]
    TooLong { max: usize, actual: usize },
}

/// One field whose decoded value violates its declared bounds
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{field}={value} {check}")]
pub struct ValidationFailed {
    pub field: &'static str,
    pub value: String,
    pub check: Check,
}

/// All validation failures of one decode, joined into a single error
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationErrors(Vec<ValidationFailed>);

impl ValidationErrors {
    /// Join collected failures; `None` when nothing failed.
    pub fn join(failures: Vec<ValidationFailed>) -> Option<Self> {
        if failures.is_empty() {
            None
        } else {
            Some(Self(failures))
        }
    }

    pub fn failures(&self) -> &[ValidationFailed] {
        &self.0
    }

    /// Whether a failure was recorded for `field`
    pub fn contains(&self, field: &str) -> bool {
        self.0.iter().any(|f| f.field == field)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, failure) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{failure}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}
