//! Error types for the sync layer.

use spanningtree_crypto::CryptoError;
use spanningtree_storage::StorageError;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur in sync operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Local key material missing or unreadable.
    #[error("key load error: {0}")]
    KeyLoad(String),

    /// Peer unreachable.
    #[error("network error: {0}")]
    Network(String),

    /// Peer did not answer within the request timeout.
    #[error("operation timed out")]
    Timeout,

    /// Peer answered with a non-success status.
    #[error("peer rejected envelope ({status}): {message}")]
    PeerRejected { status: u16, message: String },

    /// Envelope could not be parsed or authenticated.
    #[error("decryption failed: {0}")]
    Decryption(String),

    /// Signature mismatch, or a missing or malformed bundle field.
    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    /// Envelope claims a sender key that is not in the peer directory.
    #[error("unknown sender: {0}")]
    UnknownSender(String),

    /// Storage error.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Peer directory file could not be read or written.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Crypto failure on the sending side.
    #[error("crypto error: {0}")]
    Crypto(String),

    /// Peer not found.
    #[error("peer not found: {0}")]
    PeerNotFound(String),

    /// No local user matches the peer's email, so nothing can be filtered
    /// for them.
    #[error("no local user for recipient: {0}")]
    UnknownRecipient(String),

    /// The acting identity's role does not allow the action.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// A blocking task panicked or was cancelled.
    #[error("task failed: {0}")]
    TaskFailed(String),
}

impl From<CryptoError> for SyncError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::KeyLoad { .. } | CryptoError::KeyExists(_) => {
                SyncError::KeyLoad(err.to_string())
            }
            CryptoError::Decryption(msg) => SyncError::Decryption(msg),
            CryptoError::InvalidSignature(msg) => SyncError::InvalidSignature(msg),
            other => SyncError::Crypto(other.to_string()),
        }
    }
}

impl SyncError {
    /// True for failures caused by untrusted input; these are answered
    /// with 403 and never touch storage.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            SyncError::Decryption(_) | SyncError::InvalidSignature(_) | SyncError::UnknownSender(_)
        )
    }
}
