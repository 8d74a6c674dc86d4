//! # negsync core
//!
//! Pure primitives for range-based set reconciliation: items, bounds,
//! fingerprints and the binary frame codec.
//!
//! This crate contains no I/O, no storage, no networking.
//!
//! ## Key Types
//!
//! - [`Item`] - A `(timestamp, 32-byte id)` record
//! - [`Bound`] - A range delimiter carrying a possibly truncated id
//! - [`Fingerprint`] - 16-byte summary of every id in a range
//! - [`FrameReader`] / [`FrameWriter`] - Protocol frame codec
//!
//! ## Hashing
//!
//! Fingerprints are finalised through an injected [`RangeHasher`].
//! [`Sha256Hasher`] interoperates with deployed Negentropy peers.

pub mod codec;
pub mod error;
pub mod fingerprint;
pub mod types;

pub use codec::{
    check_version, decode_varint, encode_varint, Checkpoint, FrameReader, FrameWriter, Mode,
    PROTOCOL_VERSION, PROTOCOL_VERSION_RANGE,
};
pub use error::{CodecError, Result};
pub use fingerprint::{
    Accumulator, Blake3Hasher, Fingerprint, RangeHasher, Sha256Hasher, FINGERPRINT_SIZE,
};
pub use types::{Bound, Item, ItemId, ID_SIZE, TIMESTAMP_INFINITY};
