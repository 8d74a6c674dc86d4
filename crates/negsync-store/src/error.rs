//! Error types for the store module.

use negsync_core::ItemId;
use thiserror::Error;

/// Errors raised by storage operations.
///
/// All of these indicate a caller bug rather than a network condition.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// Insert or seal on a sealed storage.
    #[error("storage is already sealed")]
    AlreadySealed,

    /// Query or unseal on an unsealed storage.
    #[error("storage is not sealed")]
    NotSealed,

    /// Id is not exactly 32 bytes.
    #[error("id must be 32 bytes, got {0}")]
    BadIdSize(usize),

    /// Two equal items found while sealing.
    #[error("duplicate item at timestamp {timestamp}: {id}")]
    DuplicateItem { timestamp: u64, id: ItemId },

    /// Index past the end of storage.
    #[error("index {index} out of range for storage of size {size}")]
    OutOfRange { index: usize, size: usize },

    /// Malformed index range.
    #[error("bad range {begin}..{end} for storage of size {size}")]
    BadRange { begin: usize, end: usize, size: usize },

    /// Timestamp collides with the infinity sentinel.
    #[error("timestamp {0} is reserved")]
    ReservedTimestamp(u64),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StorageError>;
