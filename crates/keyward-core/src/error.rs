//! Error types for Keyward core

use thiserror::Error;

/// Result type alias using KeywardError
pub type Result<T> = std::result::Result<T, KeywardError>;

/// Errors that can occur in the core types and primitives
#[derive(Error, Debug)]
pub enum KeywardError {
    /// Signature did not verify against the claimed public key
    #[error("Signature verification failed: {0}")]
    SignatureInvalid(String),

    /// Key material could not be used
    #[error("Cryptographic error: {0}")]
    CryptoError(String),

    /// Seed for a derived keypair has the wrong shape
    #[error("Invalid key seed: expected 32 bytes, got {0}")]
    InvalidSeed(usize),

    /// JSON encoding/decoding error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Base64 or UTF-8 decoding error
    #[error("Encoding error: {0}")]
    EncodingError(String),

    /// A block does not link to the last accepted block
    #[error("Chain linkage broken at block {index}: expected last block hash {expected}, got {actual}")]
    LinkageMismatch {
        index: usize,
        expected: String,
        actual: String,
    },

    /// A block was signed by a key that may not perform its operation
    #[error("Unauthorized signer at block {index}: {reason}")]
    UnauthorizedSigner { index: usize, reason: String },

    /// A read payload was delivered where an append block was expected
    #[error("Block {0} carries a read payload")]
    UnexpectedReadBlock(usize),
}

impl From<ed25519_dalek::SignatureError> for KeywardError {
    fn from(err: ed25519_dalek::SignatureError) -> Self {
        KeywardError::CryptoError(err.to_string())
    }
}

impl From<serde_json::Error> for KeywardError {
    fn from(err: serde_json::Error) -> Self {
        KeywardError::SerializationError(err.to_string())
    }
}

impl From<base64::DecodeError> for KeywardError {
    fn from(err: base64::DecodeError) -> Self {
        KeywardError::EncodingError(err.to_string())
    }
}

impl From<std::string::FromUtf8Error> for KeywardError {
    fn from(err: std::string::FromUtf8Error) -> Self {
        KeywardError::EncodingError(err.to_string())
    }
}
