//! Vector-backed storage.
//!
//! Items are appended while unsealed; sealing sorts them and rejects
//! duplicates. Queries are only valid on a sealed vector.

use std::fmt;

use negsync_core::{
    Accumulator, Bound, Fingerprint, Item, ItemId, RangeHasher, Sha256Hasher, TIMESTAMP_INFINITY,
};

use crate::error::{Result, StorageError};
use crate::traits::Storage;

/// Sorted in-memory storage with a seal/unseal lifecycle.
pub struct StorageVector {
    items: Vec<Item>,
    sealed: bool,
    hasher: Box<dyn RangeHasher>,
}

impl StorageVector {
    /// Create an empty, unsealed vector fingerprinting with SHA-256.
    pub fn new() -> Self {
        Self::with_hasher(Box::new(Sha256Hasher))
    }

    /// Create an empty, unsealed vector with a custom hasher.
    pub fn with_hasher(hasher: Box<dyn RangeHasher>) -> Self {
        Self {
            items: Vec::new(),
            sealed: false,
            hasher,
        }
    }

    /// Build and seal a vector from `(timestamp, id)` items.
    pub fn from_items(items: impl IntoIterator<Item = Item>) -> Result<Self> {
        let mut storage = Self::new();
        for item in items {
            storage.insert_item(item)?;
        }
        storage.seal()?;
        Ok(storage)
    }

    /// Insert an item given a raw id, which must be 32 bytes.
    pub fn insert(&mut self, timestamp: u64, id: &[u8]) -> Result<()> {
        if self.sealed {
            return Err(StorageError::AlreadySealed);
        }
        let id = ItemId::from_slice(id).map_err(|_| StorageError::BadIdSize(id.len()))?;
        self.insert_item(Item::new(timestamp, id))
    }

    /// Insert an item.
    pub fn insert_item(&mut self, item: Item) -> Result<()> {
        if self.sealed {
            return Err(StorageError::AlreadySealed);
        }
        if item.timestamp == TIMESTAMP_INFINITY {
            return Err(StorageError::ReservedTimestamp(item.timestamp));
        }
        self.items.push(item);
        Ok(())
    }

    /// Sort the items and make the vector queryable.
    pub fn seal(&mut self) -> Result<()> {
        if self.sealed {
            return Err(StorageError::AlreadySealed);
        }

        self.items.sort_unstable();
        if let Some(pair) = self.items.windows(2).find(|w| w[0] == w[1]) {
            return Err(StorageError::DuplicateItem {
                timestamp: pair[0].timestamp,
                id: pair[0].id,
            });
        }

        self.sealed = true;
        tracing::trace!(items = self.items.len(), "storage sealed");
        Ok(())
    }

    /// Reopen the vector for inserts.
    pub fn unseal(&mut self) -> Result<()> {
        if !self.sealed {
            return Err(StorageError::NotSealed);
        }
        self.sealed = false;
        Ok(())
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    /// Sorted items. Requires the sealed state.
    pub fn items(&self) -> Result<&[Item]> {
        self.check_sealed()?;
        Ok(&self.items)
    }

    fn check_sealed(&self) -> Result<()> {
        if self.sealed {
            Ok(())
        } else {
            Err(StorageError::NotSealed)
        }
    }

    fn check_range(&self, begin: usize, end: usize) -> Result<()> {
        if begin > end || end > self.items.len() {
            return Err(StorageError::BadRange {
                begin,
                end,
                size: self.items.len(),
            });
        }
        Ok(())
    }
}

impl Default for StorageVector {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for StorageVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageVector")
            .field("len", &self.items.len())
            .field("sealed", &self.sealed)
            .finish()
    }
}

impl Storage for StorageVector {
    fn size(&self) -> Result<usize> {
        self.check_sealed()?;
        Ok(self.items.len())
    }

    fn get_item(&self, index: usize) -> Result<Item> {
        self.check_sealed()?;
        self.items
            .get(index)
            .copied()
            .ok_or(StorageError::OutOfRange {
                index,
                size: self.items.len(),
            })
    }

    fn iterate(
        &self,
        begin: usize,
        end: usize,
        visitor: &mut dyn FnMut(&Item, usize) -> bool,
    ) -> Result<()> {
        self.check_sealed()?;
        self.check_range(begin, end)?;

        for (offset, item) in self.items[begin..end].iter().enumerate() {
            if !visitor(item, begin + offset) {
                break;
            }
        }
        Ok(())
    }

    fn find_lower_bound(&self, begin: usize, end: usize, bound: &Bound) -> Result<usize> {
        self.check_sealed()?;
        self.check_range(begin, end)?;

        let offset = self.items[begin..end].partition_point(|item| bound.is_after(item));
        Ok(begin + offset)
    }

    fn fingerprint(&self, begin: usize, end: usize) -> Result<Fingerprint> {
        self.check_sealed()?;
        self.check_range(begin, end)?;

        let mut acc = Accumulator::new();
        for item in &self.items[begin..end] {
            acc.add(&item.id);
        }
        Ok(acc.finish((end - begin) as u64, self.hasher.as_ref()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn id(byte: u8) -> [u8; 32] {
        [byte; 32]
    }

    fn sealed(items: &[(u64, u8)]) -> StorageVector {
        StorageVector::from_items(
            items
                .iter()
                .map(|(ts, b)| Item::new(*ts, ItemId(id(*b)))),
        )
        .unwrap()
    }

    #[test]
    fn test_seal_sorts_items() {
        let storage = sealed(&[(300, 1), (100, 3), (200, 2), (100, 1)]);
        let items = storage.items().unwrap();

        assert_eq!(items[0], Item::new(100, ItemId(id(1))));
        assert_eq!(items[1], Item::new(100, ItemId(id(3))));
        assert_eq!(items[2].timestamp, 200);
        assert_eq!(items[3].timestamp, 300);
    }

    #[test]
    fn test_insert_after_seal_fails() {
        let mut storage = StorageVector::new();
        storage.seal().unwrap();
        assert_eq!(storage.insert(1, &id(1)), Err(StorageError::AlreadySealed));
    }

    #[test]
    fn test_seal_twice_fails() {
        let mut storage = StorageVector::new();
        storage.seal().unwrap();
        assert_eq!(storage.seal(), Err(StorageError::AlreadySealed));
    }

    #[test]
    fn test_unseal_requires_sealed() {
        let mut storage = StorageVector::new();
        assert_eq!(storage.unseal(), Err(StorageError::NotSealed));

        storage.seal().unwrap();
        storage.unseal().unwrap();
        storage.insert(5, &id(5)).unwrap();
        assert_eq!(storage.size(), Err(StorageError::NotSealed));

        storage.seal().unwrap();
        assert_eq!(storage.size().unwrap(), 1);
    }

    #[test]
    fn test_bad_id_size() {
        let mut storage = StorageVector::new();
        assert_eq!(storage.insert(1, &[0u8; 31]), Err(StorageError::BadIdSize(31)));
        assert_eq!(storage.insert(1, &[0u8; 33]), Err(StorageError::BadIdSize(33)));
    }

    #[test]
    fn test_reserved_timestamp() {
        let mut storage = StorageVector::new();
        assert_eq!(
            storage.insert(u64::MAX, &id(1)),
            Err(StorageError::ReservedTimestamp(u64::MAX))
        );
    }

    #[test]
    fn test_duplicate_item_rejected() {
        let mut storage = StorageVector::new();
        storage.insert(10, &id(7)).unwrap();
        storage.insert(20, &id(8)).unwrap();
        storage.insert(10, &id(7)).unwrap();

        assert_eq!(
            storage.seal(),
            Err(StorageError::DuplicateItem {
                timestamp: 10,
                id: ItemId(id(7))
            })
        );
    }

    #[test]
    fn test_queries_require_seal() {
        let mut storage = StorageVector::new();
        storage.insert(1, &id(1)).unwrap();

        assert_eq!(storage.size(), Err(StorageError::NotSealed));
        assert_eq!(storage.get_item(0), Err(StorageError::NotSealed));
        assert_eq!(
            storage.find_lower_bound(0, 1, &Bound::infinity()),
            Err(StorageError::NotSealed)
        );
        assert_eq!(storage.fingerprint(0, 1), Err(StorageError::NotSealed));
        assert_eq!(
            storage.iterate(0, 1, &mut |_, _| true),
            Err(StorageError::NotSealed)
        );
    }

    #[test]
    fn test_get_item_out_of_range() {
        let storage = sealed(&[(1, 1)]);
        assert_eq!(
            storage.get_item(1),
            Err(StorageError::OutOfRange { index: 1, size: 1 })
        );
    }

    #[test]
    fn test_iterate_bad_range() {
        let storage = sealed(&[(1, 1), (2, 2)]);
        assert!(matches!(
            storage.iterate(2, 1, &mut |_, _| true),
            Err(StorageError::BadRange { .. })
        ));
        assert!(matches!(
            storage.iterate(0, 3, &mut |_, _| true),
            Err(StorageError::BadRange { .. })
        ));
    }

    #[test]
    fn test_iterate_stops_early() {
        let storage = sealed(&[(1, 1), (2, 2), (3, 3)]);
        let mut seen = Vec::new();
        storage
            .iterate(0, 3, &mut |item, index| {
                seen.push((item.timestamp, index));
                index < 1
            })
            .unwrap();

        assert_eq!(seen, vec![(1, 0), (2, 1)]);
    }

    #[test]
    fn test_find_lower_bound() {
        let storage = sealed(&[(100, 1), (200, 2), (200, 9), (300, 3)]);

        assert_eq!(storage.find_lower_bound(0, 4, &Bound::new(0)).unwrap(), 0);
        assert_eq!(storage.find_lower_bound(0, 4, &Bound::new(200)).unwrap(), 1);
        assert_eq!(
            storage
                .find_lower_bound(0, 4, &Bound::with_prefix(200, &[5]).unwrap())
                .unwrap(),
            2
        );
        assert_eq!(storage.find_lower_bound(0, 4, &Bound::infinity()).unwrap(), 4);
        assert_eq!(storage.find_lower_bound(2, 4, &Bound::new(0)).unwrap(), 2);
    }

    #[test]
    fn test_fingerprint_empty_range() {
        let storage = sealed(&[(1, 1)]);
        let empty = StorageVector::from_items(std::iter::empty()).unwrap();

        assert_eq!(
            storage.fingerprint(1, 1).unwrap(),
            empty.fingerprint(0, 0).unwrap()
        );
    }

    #[test]
    fn test_fingerprint_depends_on_ids() {
        let a = sealed(&[(1, 1), (2, 2)]);
        let b = sealed(&[(1, 1), (2, 3)]);
        assert_ne!(a.fingerprint(0, 2).unwrap(), b.fingerprint(0, 2).unwrap());
        assert_eq!(a.fingerprint(0, 1).unwrap(), b.fingerprint(0, 1).unwrap());
    }

    proptest! {
        #[test]
        fn test_fingerprint_order_independent(
            entries in prop::collection::btree_map(any::<[u8; 32]>(), 0u64..1000, 0..64),
        ) {
            let forward: Vec<Item> = entries.iter().map(|(id, ts)| Item::new(*ts, ItemId(*id))).collect();
            // Same ids under shuffled timestamps sort differently but sum the same.
            let rotated: Vec<Item> = entries
                .keys()
                .zip(entries.values().cycle().skip(1))
                .map(|(id, ts)| Item::new(*ts, ItemId(*id)))
                .collect();

            let a = StorageVector::from_items(forward).unwrap();
            let b = StorageVector::from_items(rotated).unwrap();
            let n = a.size().unwrap();

            prop_assert_eq!(a.fingerprint(0, n).unwrap(), b.fingerprint(0, n).unwrap());
            prop_assert_eq!(a.fingerprint(0, n).unwrap(), a.fingerprint(0, n).unwrap());
        }
    }
}
