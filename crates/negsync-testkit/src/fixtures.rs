//! Test fixtures and helpers.
//!
//! Common setup code for engine and session tests.

use std::collections::BTreeSet;

use negsync_core::{Item, ItemId};
use negsync_store::StorageVector;

/// A deterministic 32-byte id derived from `n`.
///
/// Distinct `n` give distinct ids, and nearby `n` differ early in the id.
pub fn test_id(n: u32) -> ItemId {
    let mut bytes = [0u8; 32];
    bytes[..4].copy_from_slice(&n.wrapping_mul(0x9e37_79b9).to_be_bytes());
    bytes[4..8].copy_from_slice(&n.to_be_bytes());
    bytes[31] = 0x01;
    ItemId(bytes)
}

/// A random 32-byte id.
pub fn random_id() -> ItemId {
    use rand::Rng;
    ItemId(rand::thread_rng().gen())
}

/// Item `n` with timestamp `base + n`.
pub fn test_item(base: u64, n: u32) -> Item {
    Item::new(base + n as u64, test_id(n))
}

/// Sealed storage holding items `ns` at timestamps `base + n`.
pub fn storage_with(base: u64, ns: impl IntoIterator<Item = u32>) -> StorageVector {
    let mut storage = StorageVector::new();
    for n in ns {
        storage
            .insert_item(test_item(base, n))
            .expect("timestamp below infinity");
    }
    seal(storage)
}

/// Sealed storage from `(timestamp, byte)` pairs, each id the byte repeated.
pub fn storage_from_pairs(pairs: &[(u64, u8)]) -> StorageVector {
    let mut storage = StorageVector::new();
    for (timestamp, byte) in pairs {
        storage
            .insert_item(Item::new(*timestamp, ItemId([*byte; 32])))
            .expect("timestamp below infinity");
    }
    seal(storage)
}

/// Sealed storage from arbitrary items.
pub fn storage_from_items(items: &[Item]) -> StorageVector {
    StorageVector::from_items(items.iter().copied()).expect("fixture items must be unique")
}

fn seal(mut storage: StorageVector) -> StorageVector {
    storage.seal().expect("fixture items must be unique");
    storage
}

/// Ids of `items` as a set.
pub fn id_set(items: &[Item]) -> BTreeSet<ItemId> {
    items.iter().map(|item| item.id).collect()
}

/// Two overlapping collections with their expected differences.
#[derive(Debug, Clone)]
pub struct PairFixture {
    pub local: Vec<Item>,
    pub remote: Vec<Item>,
}

impl PairFixture {
    /// `shared` items on both sides, plus `only_local` and `only_remote`
    /// items on one side each.
    pub fn new(shared: u32, only_local: u32, only_remote: u32) -> Self {
        let base = 1_700_000_000;
        let shared_items = (0..shared).map(|n| test_item(base, n));
        let local_extra = (shared..shared + only_local).map(|n| test_item(base, n));
        let remote_start = shared + only_local;
        let remote_extra = (remote_start..remote_start + only_remote).map(|n| test_item(base, n));

        let shared_items: Vec<Item> = shared_items.collect();
        Self {
            local: shared_items.iter().copied().chain(local_extra).collect(),
            remote: shared_items.into_iter().chain(remote_extra).collect(),
        }
    }

    pub fn local_storage(&self) -> StorageVector {
        storage_from_items(&self.local)
    }

    pub fn remote_storage(&self) -> StorageVector {
        storage_from_items(&self.remote)
    }

    /// Ids held locally but not remotely.
    pub fn only_local(&self) -> BTreeSet<ItemId> {
        let remote = id_set(&self.remote);
        id_set(&self.local).difference(&remote).copied().collect()
    }

    /// Ids held remotely but not locally.
    pub fn only_remote(&self) -> BTreeSet<ItemId> {
        let local = id_set(&self.local);
        id_set(&self.remote).difference(&local).copied().collect()
    }
}
