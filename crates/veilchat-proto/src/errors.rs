//! Protocol error types.

use thiserror::Error;

/// Result alias for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors raised while encoding or decoding wire data.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// The text was not valid JSON, or did not match the expected shape.
    #[error("malformed json: {0}")]
    Json(String),

    /// A frame carried a `type` tag this client does not understand.
    #[error("unknown frame type: {0}")]
    UnknownFrameType(String),

    /// A frame had no `type` tag at all.
    #[error("frame is missing its type tag")]
    MissingFrameType,

    /// A required field was absent.
    #[error("missing field: {0}")]
    MissingField(&'static str),

    /// A binary field was not valid base64.
    #[error("invalid base64 in {field}: {reason}")]
    InvalidBase64 {
        /// Wire name of the offending field.
        field: &'static str,
        /// Decoder message.
        reason: String,
    },

    /// The nonce did not have the AEAD nonce length.
    #[error("invalid nonce length: expected {expected}, got {actual}")]
    InvalidNonceLength {
        /// Required length in bytes.
        expected: usize,
        /// Length that was received.
        actual: usize,
    },

    /// The timestamp was neither RFC 3339 nor a naive ISO-8601 datetime.
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),
}

impl From<serde_json::Error> for ProtocolError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}
