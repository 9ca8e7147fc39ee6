//! Error types for message decryption.

use thiserror::Error;

/// Reasons a sealed message could not be opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DecryptError {
    /// Tag mismatch: wrong key, or ciphertext/nonce was modified.
    #[error("authentication failed")]
    AuthenticationFailed,

    /// Nonce was not the cipher's nonce size.
    #[error("invalid nonce length: expected {expected}, got {actual}")]
    InvalidNonceLength {
        /// Required nonce size.
        expected: usize,
        /// Size that was supplied.
        actual: usize,
    },

    /// Authenticated plaintext was not UTF-8.
    #[error("plaintext is not valid UTF-8")]
    InvalidUtf8,
}
