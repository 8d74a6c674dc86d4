//! # negsync testkit
//!
//! Testing utilities for negsync.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Golden vectors**: fingerprints and frames every implementation must reproduce
//! - **Generators**: Proptest strategies for items, bounds, and overlapping sets
//! - **Fixtures**: Deterministic ids and storage builders
//!
//! ## Golden Vectors
//!
//! ```rust
//! use negsync_testkit::vectors::verify_all_vectors;
//!
//! for (name, matches, hex) in verify_all_vectors() {
//!     assert!(matches, "{name}: {hex}");
//! }
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use negsync_testkit::generators::overlapping_sets;
//!
//! proptest! {
//!     #[test]
//!     fn converges((local, remote) in overlapping_sets(200, 50)) {
//!         // ...
//!     }
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! ```rust
//! use negsync_testkit::fixtures::PairFixture;
//!
//! let pair = PairFixture::new(100, 2, 3);
//! assert_eq!(pair.only_remote().len(), 3);
//! ```

pub mod fixtures;
pub mod generators;
pub mod vectors;

pub use fixtures::{storage_from_items, storage_with, test_id, test_item, PairFixture};
pub use generators::{bound, item, item_id, item_set, mixed_density_sets, overlapping_sets};
pub use vectors::{fingerprint_vectors, frame_vectors, verify_all_vectors, FrameVector};
