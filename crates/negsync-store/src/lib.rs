//! # negsync store
//!
//! Storage abstraction for negsync. The reconciliation engine reads items
//! through the [`Storage`] trait; [`StorageVector`] is the in-memory
//! implementation.
//!
//! ## Lifecycle
//!
//! ```rust
//! use negsync_store::{Storage, StorageVector};
//!
//! let mut storage = StorageVector::new();
//! storage.insert(1_700_000_000, &[0xab; 32]).unwrap();
//! storage.insert(1_700_000_100, &[0xcd; 32]).unwrap();
//! storage.seal().unwrap();
//!
//! assert_eq!(storage.size().unwrap(), 2);
//! ```
//!
//! ## Design Notes
//!
//! - **Seal once**: inserts are only accepted while unsealed; queries only
//!   while sealed. `unseal()` reopens for inserts and requires a reseal.
//! - **No duplicates**: sealing fails on two equal `(timestamp, id)` items.
//! - **Read-only sessions**: a sealed storage must not change while a
//!   reconciliation session uses it.

pub mod error;
pub mod traits;
pub mod vector;

pub use error::{Result, StorageError};
pub use traits::Storage;
pub use vector::StorageVector;
