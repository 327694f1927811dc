//! Error types for the crypto layer.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for crypto operations.
pub type CryptoResult<T> = Result<T, CryptoError>;

/// Errors that can occur in cryptographic operations.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Key file missing, unreadable or malformed.
    #[error("failed to load key from {}: {reason}", path.display())]
    KeyLoad { path: PathBuf, reason: String },

    /// Refused to overwrite an existing key file.
    #[error("key file already exists: {}", .0.display())]
    KeyExists(PathBuf),

    /// Bytes do not encode a usable key.
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// Invalid key length.
    #[error("invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    /// Signature bytes malformed or not valid for the message.
    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    /// Encryption failed.
    #[error("encryption failed: {0}")]
    Encryption(String),

    /// Decryption failed (wrong key or tampered data).
    #[error("decryption failed: {0}")]
    Decryption(String),

    /// IO error while writing key files.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
