//! # negsync
//!
//! Negentropy range-based set reconciliation: two peers holding sets of
//! `(timestamp, id)` items discover exactly which ids each side is missing,
//! exchanging a number of frames logarithmic in the set size.
//!
//! ## Overview
//!
//! - **Storage**: a sealed, sorted [`StorageVector`] of items
//! - **Engine**: [`Negentropy`] turns one incoming frame into one reply
//! - **Sessions**: [`SyncSession`] and [`SyncResponder`] carry frames as
//!   `NEG-OPEN` / `NEG-MSG` / `NEG-CLOSE` / `NEG-ERR` control messages
//!
//! ## Usage
//!
//! ```rust
//! use negsync::{Item, ItemId, Node, SessionConfig};
//!
//! let a = Node::from_items(
//!     [Item::new(100, ItemId([1; 32])), Item::new(200, ItemId([2; 32]))],
//!     SessionConfig::default(),
//! )
//! .unwrap();
//! let b = Node::from_items([Item::new(200, ItemId([2; 32]))], SessionConfig::default()).unwrap();
//!
//! let report = a.reconcile_with(&b).unwrap();
//! assert_eq!(report.local_have, vec![ItemId([1; 32])]);
//! assert!(report.local_need.is_empty());
//! ```
//!
//! ## Re-exports
//!
//! This crate re-exports the component crates for convenience:
//!
//! - `negsync::core` - Items, bounds, fingerprints, and the frame codec
//! - `negsync::store` - The storage trait and `StorageVector`
//! - `negsync::sync` - Engine, sessions, and transports

pub mod error;
pub mod node;

// Re-export component crates
pub use negsync_core as core;
pub use negsync_store as store;
pub use negsync_sync as sync;

// Re-export main types for convenience
pub use error::{Error, Result};
pub use node::Node;

pub use negsync_core::{
    Blake3Hasher, Bound, Fingerprint, Item, ItemId, RangeHasher, Sha256Hasher, PROTOCOL_VERSION,
};
pub use negsync_store::{Storage, StorageVector};
pub use negsync_sync::{
    BoundEncoding, ControlMessage, ConvergenceReport, EngineConfig, MemoryTransport, Negentropy,
    SessionConfig, SubscriptionId, SyncReport, SyncResponder, SyncSession, Transport,
};
