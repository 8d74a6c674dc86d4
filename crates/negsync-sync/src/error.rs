//! Error types for the sync module.

use negsync_core::CodecError;
use negsync_store::StorageError;
use thiserror::Error;

/// Errors that can occur during reconciliation and sync sessions.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Malformed or unsupported frame.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// Storage precondition violated.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Frame size limit below the protocol minimum.
    #[error("frame size limit {limit} is below the minimum of {min}")]
    FrameSizeTooSmall { limit: usize, min: usize },

    /// `initiate()` called twice on one engine.
    #[error("reconciliation already initiated")]
    AlreadyInitiated,

    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(String),

    /// Peer sent an error message.
    #[error("peer error: {reason}")]
    PeerError { reason: String },

    /// Control message could not be interpreted.
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// Timeout waiting for peer.
    #[error("timeout: {0}")]
    Timeout(String),

    /// In-process exchange did not finish within the round limit.
    #[error("no convergence after {rounds} rounds")]
    NotConverged { rounds: usize },

    /// Operation on a closed session.
    #[error("session closed")]
    Closed,

    /// Frame payload is not valid hex.
    #[error("hex error: {0}")]
    Hex(#[from] hex::FromHexError),

    /// Control message is not valid JSON.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SyncError {
    /// Whether this error came from the peer's bytes rather than local state.
    pub fn is_protocol(&self) -> bool {
        matches!(
            self,
            SyncError::Codec(_) | SyncError::InvalidMessage(_) | SyncError::Hex(_) | SyncError::Json(_)
        )
    }
}

/// Result type for sync operations.
pub type Result<T> = std::result::Result<T, SyncError>;
