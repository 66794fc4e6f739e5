//! Error types for list operations

use scroll_core::KvError;
use thiserror::Error;

/// Result type for list operations
pub type Result<T> = std::result::Result<T, ListError>;

/// Errors visible to list callers
///
/// Expected race outcomes of the lock-free protocol (conditional-create
/// conflicts, lost counter bumps, absent data pages during a walk) never
/// surface here; the engines resolve them silently. Store throttling and
/// transport faults pass through unchanged inside [`ListError::Store`] so
/// callers can drive their own backoff.
#[derive(Error, Debug)]
pub enum ListError {
    /// The append → create-page → retry loop failed after its one retry
    #[error("Failed to create page {page} of list {list_id} after one retry")]
    CreatePageFailed { list_id: String, page: u64 },

    /// The list's summary item does not exist
    #[error("List not found: {0}")]
    ListNotFound(String),

    /// A resume cursor was missing `page_id` or `sequence_id`
    #[error("Invalid cursor: {0}")]
    InvalidCursor(String),

    /// Reserved entry point with no implementation
    #[error("Not implemented: {0}")]
    NotImplemented(&'static str),

    /// Gateway failure surfaced unchanged
    #[error(transparent)]
    Store(#[from] KvError),
}

impl ListError {
    /// Create a create-page-failed error
    pub fn create_page_failed(list_id: impl Into<String>, page: u64) -> Self {
        Self::CreatePageFailed {
            list_id: list_id.into(),
            page,
        }
    }

    /// Create a list-not-found error
    pub fn list_not_found(list_id: impl Into<String>) -> Self {
        Self::ListNotFound(list_id.into())
    }

    /// Create an invalid-cursor error
    pub fn invalid_cursor(msg: impl Into<String>) -> Self {
        Self::InvalidCursor(msg.into())
    }
}
