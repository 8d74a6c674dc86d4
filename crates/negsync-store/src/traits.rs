//! Storage trait: the sorted, read-only view the reconciliation engine needs.
//!
//! Indices are positions in the sorted item sequence. Every query requires
//! the storage to be in its queryable (sealed) state.

use std::sync::Arc;

use negsync_core::{Bound, Fingerprint, Item};

use crate::error::Result;

/// A sorted collection of items supporting range queries.
pub trait Storage {
    /// Number of items.
    fn size(&self) -> Result<usize>;

    /// The item at `index`.
    fn get_item(&self, index: usize) -> Result<Item>;

    /// Visit items in `[begin, end)` in order.
    ///
    /// The visitor returns `false` to stop early.
    fn iterate(
        &self,
        begin: usize,
        end: usize,
        visitor: &mut dyn FnMut(&Item, usize) -> bool,
    ) -> Result<()>;

    /// First index in `[begin, end)` whose item is not ordered before
    /// `bound`, or `end` if there is none.
    fn find_lower_bound(&self, begin: usize, end: usize, bound: &Bound) -> Result<usize>;

    /// Fingerprint of the items in `[begin, end)`.
    fn fingerprint(&self, begin: usize, end: usize) -> Result<Fingerprint>;
}

macro_rules! forward_storage {
    ($($ty:ty),*) => {$(
        impl<T: Storage + ?Sized> Storage for $ty {
            fn size(&self) -> Result<usize> {
                (**self).size()
            }

            fn get_item(&self, index: usize) -> Result<Item> {
                (**self).get_item(index)
            }

            fn iterate(
                &self,
                begin: usize,
                end: usize,
                visitor: &mut dyn FnMut(&Item, usize) -> bool,
            ) -> Result<()> {
                (**self).iterate(begin, end, visitor)
            }

            fn find_lower_bound(&self, begin: usize, end: usize, bound: &Bound) -> Result<usize> {
                (**self).find_lower_bound(begin, end, bound)
            }

            fn fingerprint(&self, begin: usize, end: usize) -> Result<Fingerprint> {
                (**self).fingerprint(begin, end)
            }
        }
    )*};
}

// Engines may borrow or share a storage owned elsewhere.
forward_storage!(&T, Arc<T>);
