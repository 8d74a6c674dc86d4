//! # negsync sync
//!
//! Negentropy range-based set reconciliation and the session layer that
//! carries it between peers.
//!
//! ## Overview
//!
//! Two peers each hold a sealed [`Storage`](negsync_store::Storage) of
//! `(timestamp, id)` items. The [`Negentropy`] engine exchanges frames that
//! describe ranges of items by fingerprint; matching ranges are skipped,
//! mismatched ones are split until the differing ids surface. Each side
//! learns which ids it has that the peer lacks (`on_have`) and which it
//! lacks (`on_need`).
//!
//! ## Key Properties
//!
//! - **Deterministic**: each round is a pure function of storage and input
//! - **Bounded frames**: no frame exceeds the configured size limit
//! - **Logarithmic**: rounds grow with `log16` of the collection size
//!
//! ## Usage
//!
//! ```rust
//! use negsync_core::{Item, ItemId};
//! use negsync_store::StorageVector;
//! use negsync_sync::{EngineConfig, Negentropy};
//!
//! let local = StorageVector::from_items([Item::new(100, ItemId([1; 32]))]).unwrap();
//! let remote = StorageVector::from_items([Item::new(200, ItemId([2; 32]))]).unwrap();
//!
//! let mut initiator = Negentropy::new(&local, 60_000).unwrap();
//! let mut responder = Negentropy::with_config(&remote, EngineConfig::default()).unwrap();
//!
//! let mut need = Vec::new();
//! let mut frame = initiator.initiate().unwrap();
//! loop {
//!     let reply = responder.reconcile(&frame, |_| {}, |_| {}).unwrap().unwrap();
//!     match initiator.reconcile(&reply, |_| {}, |id| need.push(id)).unwrap() {
//!         Some(next) => frame = next,
//!         None => break,
//!     }
//! }
//! assert_eq!(need, vec![ItemId([2; 32])]);
//! ```
//!
//! ## Message Flow
//!
//! ```text
//! Initiator                           Responder
//!   |-------- NEG-OPEN (frame) -------->|
//!   |<------- NEG-MSG (frame) ----------|
//!   |-------- NEG-MSG (frame) --------->|
//!   |<------- NEG-MSG (frame) ----------|
//!   |               ...                 |
//!   |-------- NEG-CLOSE --------------->|
//! ```
//!
//! Either side may abort with `NEG-ERR`; the other closes without replying.

pub mod convergence;
pub mod engine;
pub mod error;
pub mod messages;
pub mod responder;
pub mod session;
pub mod transport;

pub use convergence::{fingerprints_match, reconcile_local, ConvergenceReport, MAX_ROUNDS};
pub use engine::{
    BoundEncoding, EngineConfig, Negentropy, BUCKETS, DEFAULT_FRAME_SIZE_LIMIT,
    ID_LIST_THRESHOLD, MIN_FRAME_SIZE_LIMIT,
};
pub use error::{Result, SyncError};
pub use messages::{ControlMessage, SubscriptionId};
pub use responder::{SyncResponder, DEFAULT_IDLE_TIMEOUT};
pub use session::{SessionConfig, SessionState, SessionStatus, SyncReport, SyncSession};
pub use transport::{memory::MemoryTransport, Transport};
