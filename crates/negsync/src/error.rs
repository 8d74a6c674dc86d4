//! Error types for the negsync facade.

use negsync_core::CodecError;
use negsync_store::StorageError;
use negsync_sync::SyncError;
use thiserror::Error;

/// Errors from any negsync component.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed or unsupported frame.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// Storage error.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Sync error.
    #[error("sync error: {0}")]
    Sync(#[from] SyncError),
}

impl Error {
    /// Whether the failure was caused by bytes received from the peer.
    pub fn is_protocol(&self) -> bool {
        match self {
            Error::Codec(_) => true,
            Error::Storage(_) => false,
            Error::Sync(err) => err.is_protocol(),
        }
    }
}

/// Result type for negsync operations.
pub type Result<T> = std::result::Result<T, Error>;
