//! Signing error types.

/// Errors from key handling and signing.
#[derive(Debug, thiserror::Error)]
pub enum SigningError {
    /// Key bytes could not be decoded or have the wrong length.
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// Base64 decoding failed.
    #[error("base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),
}

/// Result type alias for signing operations.
pub type Result<T> = std::result::Result<T, SigningError>;
