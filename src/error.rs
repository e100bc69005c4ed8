//! Durable storage errors

use thiserror::Error;

/// Result type alias using `StorageError`
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors raised by a [`DurableStorage`](crate::storage::DurableStorage) backend
///
/// None of these ever reach a compare store caller: the store logs them and
/// keeps its in-memory selection as the source of truth.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Storage is disabled (privacy mode, revoked permission, ...)
    #[error("Durable storage is unavailable")]
    Unavailable,

    /// Writing the value would exceed the backend quota
    #[error("Storage quota exceeded ({needed} bytes needed, quota is {quota} bytes)")]
    QuotaExceeded { needed: usize, quota: usize },

    /// Stored bytes are not valid UTF-8
    #[error("Stored value is not valid UTF-8: {0}")]
    Encoding(String),

    /// Error from the sled database
    #[error(transparent)]
    Backend(#[from] sled::Error),

    /// I/O error (watch thread spawn, ...)
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quota_message() {
        let err = StorageError::QuotaExceeded {
            needed: 120,
            quota: 64,
        };
        assert_eq!(
            err.to_string(),
            "Storage quota exceeded (120 bytes needed, quota is 64 bytes)"
        );
    }
}
