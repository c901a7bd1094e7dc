//! Error types for creation-event decoding

use thiserror::Error;

/// Errors that can occur while decoding a creation event
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Buffer is shorter than the smallest possible creation event
    #[error("Buffer too short: {len} bytes, need at least {min}")]
    TooShort { len: usize, min: usize },

    /// A fixed-size field would read past the end of the buffer
    #[error("Unexpected end of data reading {field} at offset {offset}: need {needed} bytes, {remaining} remaining")]
    UnexpectedEof {
        field: &'static str,
        offset: usize,
        needed: usize,
        remaining: usize,
    },

    /// A length-prefixed string declares more bytes than the buffer holds
    #[error("Invalid length {declared} for {field}: only {remaining} bytes remaining")]
    InvalidStringLength {
        field: &'static str,
        declared: usize,
        remaining: usize,
    },

    /// An address string is not valid base-58 or not 32 bytes long
    #[error("Invalid address: {0}")]
    InvalidAddress(String),
}

/// Result type alias for decoding operations
pub type DecodeResult<T> = Result<T, DecodeError>;
