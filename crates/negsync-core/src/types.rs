//! Strong type definitions for negsync.
//!
//! Items are the records being reconciled; bounds delimit the ranges that
//! are compared between peers.

use std::cmp::Ordering;
use std::fmt;

use crate::error::CodecError;

/// Size in bytes of an item identifier.
pub const ID_SIZE: usize = 32;

/// Timestamp reserved for the open upper end of the item universe.
pub const TIMESTAMP_INFINITY: u64 = u64::MAX;

/// A 32-byte item identifier.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ItemId(pub [u8; ID_SIZE]);

impl ItemId {
    /// Create a new ItemId from raw bytes.
    pub const fn from_bytes(bytes: [u8; ID_SIZE]) -> Self {
        Self(bytes)
    }

    /// Create from a slice, which must be exactly 32 bytes long.
    pub fn from_slice(slice: &[u8]) -> Result<Self, CodecError> {
        let arr: [u8; ID_SIZE] = slice
            .try_into()
            .map_err(|_| CodecError::BadIdSize(slice.len()))?;
        Ok(Self(arr))
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; ID_SIZE] {
        &self.0
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex string.
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(s)?;
        if bytes.len() != ID_SIZE {
            return Err(hex::FromHexError::InvalidStringLength);
        }
        let mut arr = [0u8; ID_SIZE];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }

    /// The all-zero id.
    pub const ZERO: Self = Self([0u8; ID_SIZE]);
}

impl fmt::Debug for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ItemId({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl AsRef<[u8]> for ItemId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; ID_SIZE]> for ItemId {
    fn from(bytes: [u8; ID_SIZE]) -> Self {
        Self(bytes)
    }
}

/// A timestamped identifier held in storage.
///
/// Ordered by timestamp, then by id byte-wise. The derived `Ord` relies on
/// the field order below.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Item {
    pub timestamp: u64,
    pub id: ItemId,
}

impl Item {
    pub const fn new(timestamp: u64, id: ItemId) -> Self {
        Self { timestamp, id }
    }
}

/// A range delimiter on the wire.
///
/// A bound carries a timestamp and an id prefix of 0..=32 bytes. Internally
/// the prefix is stored zero-padded inside an [`Item`], which makes "item is
/// ordered before bound" a plain item comparison: an item whose id starts
/// with the prefix is never before the bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Bound {
    item: Item,
    id_len: usize,
}

impl Bound {
    /// A bound with an empty id prefix.
    pub const fn new(timestamp: u64) -> Self {
        Self {
            item: Item::new(timestamp, ItemId::ZERO),
            id_len: 0,
        }
    }

    /// The open upper end of the item universe.
    pub const fn infinity() -> Self {
        Self::new(TIMESTAMP_INFINITY)
    }

    /// A bound carrying the full id of `item`.
    pub const fn from_item(item: &Item) -> Self {
        Self {
            item: *item,
            id_len: ID_SIZE,
        }
    }

    /// A bound with an explicit id prefix.
    pub fn with_prefix(timestamp: u64, prefix: &[u8]) -> Result<Self, CodecError> {
        if prefix.len() > ID_SIZE {
            return Err(CodecError::BoundIdTooLong(prefix.len()));
        }
        let mut id = [0u8; ID_SIZE];
        id[..prefix.len()].copy_from_slice(prefix);
        Ok(Self {
            item: Item::new(timestamp, ItemId(id)),
            id_len: prefix.len(),
        })
    }

    /// The shortest bound that sorts after `prev` and at or before `next`.
    ///
    /// `prev` must be ordered before `next`.
    pub fn minimal(prev: &Item, next: &Item) -> Self {
        if prev.timestamp != next.timestamp {
            return Self::new(next.timestamp);
        }

        let shared = prev
            .id
            .0
            .iter()
            .zip(next.id.0.iter())
            .take_while(|(a, b)| a == b)
            .count();
        let len = (shared + 1).min(ID_SIZE);

        let mut id = [0u8; ID_SIZE];
        id[..len].copy_from_slice(&next.id.0[..len]);
        Self {
            item: Item::new(next.timestamp, ItemId(id)),
            id_len: len,
        }
    }

    pub const fn timestamp(&self) -> u64 {
        self.item.timestamp
    }

    /// The significant id bytes.
    pub fn id_prefix(&self) -> &[u8] {
        &self.item.id.0[..self.id_len]
    }

    pub const fn is_infinity(&self) -> bool {
        self.item.timestamp == TIMESTAMP_INFINITY
    }

    /// Compare an item against this bound.
    pub fn cmp_item(&self, item: &Item) -> Ordering {
        item.cmp(&self.item)
    }

    /// Whether `item` sorts strictly before this bound.
    pub fn is_after(&self, item: &Item) -> bool {
        self.cmp_item(item) == Ordering::Less
    }
}

impl Default for Bound {
    fn default() -> Self {
        Self::new(0)
    }
}
