//! Error types for negsync core.

use thiserror::Error;

/// Errors raised while decoding or encoding protocol frames.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("unexpected end of frame")]
    UnexpectedEof,

    #[error("varint does not fit in 64 bits")]
    VarintOverflow,

    #[error("bound id prefix of {0} bytes exceeds 32")]
    BoundIdTooLong(usize),

    #[error("unknown range mode: {0}")]
    UnknownMode(u64),

    #[error("invalid protocol version byte: 0x{0:02x}")]
    InvalidVersionByte(u8),

    #[error("unsupported protocol version requested: 0x{0:02x}")]
    UnsupportedVersionRequested(u8),

    #[error("bound timestamp overflows")]
    TimestampOverflow,

    #[error("id must be 32 bytes, got {0}")]
    BadIdSize(usize),
}

/// Result type for codec operations.
pub type Result<T> = std::result::Result<T, CodecError>;
