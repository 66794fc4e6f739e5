//! Error types for the KV gateway

use thiserror::Error;

/// Result type for gateway operations
pub type Result<T> = std::result::Result<T, KvError>;

/// Errors surfaced by [`KvStore`](crate::KvStore) implementations
///
/// `AlreadyExists`, `ItemMissing`, and `PreconditionFailed` are expected
/// outcomes of the lock-free append protocol and are handled locally by the
/// engines. `Throttled` is kept distinct from `Unavailable` so callers can
/// apply backoff to the former and treat the latter as a transport fault.
#[derive(Error, Debug)]
pub enum KvError {
    /// Conditional create failed because the key is already present
    #[error("Item already exists: {0}")]
    AlreadyExists(String),

    /// List-append targeted an item that does not exist
    #[error("Item missing: {0}")]
    ItemMissing(String),

    /// Conditional increment failed: the counter was not at the given floor
    #[error("Precondition failed: {0}")]
    PreconditionFailed(String),

    /// The store rejected the request due to rate limiting
    #[error("Throttled: {0}")]
    Throttled(String),

    /// Transport or availability error
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// The stored item could not be decoded
    #[error("Invalid item: {0}")]
    InvalidItem(String),
}

impl KvError {
    /// Create an already-exists error
    pub fn already_exists(key: impl Into<String>) -> Self {
        Self::AlreadyExists(key.into())
    }

    /// Create an item-missing error
    pub fn item_missing(key: impl Into<String>) -> Self {
        Self::ItemMissing(key.into())
    }

    /// Create a precondition-failed error
    pub fn precondition_failed(msg: impl Into<String>) -> Self {
        Self::PreconditionFailed(msg.into())
    }

    /// Create a throttled error
    pub fn throttled(msg: impl Into<String>) -> Self {
        Self::Throttled(msg.into())
    }

    /// Create an unavailable error
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    /// Create an invalid-item error
    pub fn invalid_item(msg: impl Into<String>) -> Self {
        Self::InvalidItem(msg.into())
    }
}
