//! Negentropy reconciliation engine.
//!
//! Each call to [`Negentropy::reconcile`] consumes one incoming frame and
//! produces at most one outgoing frame. Ranges whose fingerprints agree are
//! skipped; mismatched ranges are split into 16 buckets until they are small
//! enough to exchange as explicit id lists.
//!
//! ## Roles
//!
//! The side that calls [`Negentropy::initiate`] is the initiator; the other
//! side is the responder. Differences are reported on whichever side receives
//! an id list:
//!
//! - The initiator enumerates small mismatched ranges as id lists.
//! - The responder reports against a received id list, then answers with its
//!   own list when the two differ so the initiator can report too.
//! - The responder never enumerates first. A small mismatched range is sent
//!   back as a single fingerprint, which makes the initiator enumerate it.
//!
//! Every differing range is thus resolved by exactly one id list exchange in
//! each direction, and both sides learn the full difference.

use std::collections::HashSet;

use negsync_core::{Bound, FrameReader, FrameWriter, Item, ItemId, Mode};
use negsync_store::Storage;

use crate::error::{Result, SyncError};

/// Smallest frame size limit a session may be configured with.
pub const MIN_FRAME_SIZE_LIMIT: usize = 4096;

/// Default frame size limit.
pub const DEFAULT_FRAME_SIZE_LIMIT: usize = 60_000;

/// Headroom kept below the limit for the trailing summary entries.
const FRAME_SIZE_SLACK: usize = 200;

/// Fan-out when splitting a mismatched range.
pub const BUCKETS: usize = 16;

/// Ranges with at most this many items are sent as id lists.
pub const ID_LIST_THRESHOLD: usize = 32;

/// How bucket boundaries are written on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BoundEncoding {
    /// Shortest id prefix separating adjacent buckets.
    #[default]
    Minimal,
    /// Always the full 32-byte id of the bucket's first item.
    FullId,
}

/// Configuration for the reconciliation engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Upper bound on the size of any emitted frame, in bytes.
    pub frame_size_limit: usize,
    /// Bound encoding used when splitting ranges.
    pub bound_encoding: BoundEncoding,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            frame_size_limit: DEFAULT_FRAME_SIZE_LIMIT,
            bound_encoding: BoundEncoding::Minimal,
        }
    }
}

impl EngineConfig {
    pub fn with_frame_size_limit(mut self, limit: usize) -> Self {
        self.frame_size_limit = limit;
        self
    }

    pub fn with_bound_encoding(mut self, encoding: BoundEncoding) -> Self {
        self.bound_encoding = encoding;
        self
    }

    /// Check the configuration against protocol minimums.
    pub fn validate(&self) -> Result<()> {
        if self.frame_size_limit < MIN_FRAME_SIZE_LIMIT {
            return Err(SyncError::FrameSizeTooSmall {
                limit: self.frame_size_limit,
                min: MIN_FRAME_SIZE_LIMIT,
            });
        }
        Ok(())
    }
}

/// A reconciliation engine bound to one sealed storage.
///
/// The storage must stay unchanged for the lifetime of a session.
#[derive(Debug)]
pub struct Negentropy<S: Storage> {
    storage: S,
    config: EngineConfig,
    is_initiator: bool,
    /// Ids already passed to a callback. A range summarised by a truncated
    /// frame is enumerated again later, so the same diff can recur.
    reported: HashSet<ItemId>,
}

impl<S: Storage> Negentropy<S> {
    /// Create an engine with the given frame size limit.
    pub fn new(storage: S, frame_size_limit: usize) -> Result<Self> {
        Self::with_config(
            storage,
            EngineConfig::default().with_frame_size_limit(frame_size_limit),
        )
    }

    /// Create an engine from a full configuration.
    pub fn with_config(storage: S, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            storage,
            config,
            is_initiator: false,
            reported: HashSet::new(),
        })
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn is_initiator(&self) -> bool {
        self.is_initiator
    }

    pub fn into_storage(self) -> S {
        self.storage
    }

    /// Produce the first frame of a session, covering all of storage.
    pub fn initiate(&mut self) -> Result<Vec<u8>> {
        if self.is_initiator {
            return Err(SyncError::AlreadyInitiated);
        }

        let size = self.storage.size()?;
        let mut out = FrameWriter::new();
        self.split_range(0, size, &Bound::infinity(), &mut out)?;
        self.is_initiator = true;

        tracing::debug!(items = size, frame_len = out.len(), "initiated reconciliation");
        Ok(out.into_bytes())
    }

    /// Process one incoming frame.
    ///
    /// `on_have` receives ids held locally but missing on the peer;
    /// `on_need` receives ids the peer holds that are missing locally. Both
    /// fire at most once per id over a session.
    ///
    /// Returns the reply frame, or `None` on the initiator once nothing is
    /// left to reconcile. A responder always replies, possibly with a frame
    /// holding only the version byte.
    pub fn reconcile<H, N>(
        &mut self,
        query: &[u8],
        mut on_have: H,
        mut on_need: N,
    ) -> Result<Option<Vec<u8>>>
    where
        H: FnMut(ItemId),
        N: FnMut(ItemId),
    {
        let mut reader = FrameReader::new(query)?;
        let mut out = FrameWriter::new();
        let storage_size = self.storage.size()?;

        let mut prev_bound = Bound::default();
        let mut prev_index = 0;
        let mut skip = false;

        let mut have = Vec::new();
        let mut need = Vec::new();

        while !reader.is_empty() {
            let checkpoint = out.checkpoint();
            let skip_before = skip;
            have.clear();
            need.clear();

            let bound = reader.read_bound()?;
            let mode = reader.read_mode()?;

            let lower = prev_index;
            let upper = self.storage.find_lower_bound(lower, storage_size, &bound)?;

            match mode {
                Mode::Skip => skip = true,

                Mode::Fingerprint => {
                    let theirs = reader.read_fingerprint()?;
                    let ours = self.storage.fingerprint(lower, upper)?;

                    if theirs == ours {
                        skip = true;
                    } else {
                        tracing::trace!(lower, upper, "fingerprint mismatch");
                        flush_skip(&mut out, &mut skip, &prev_bound);
                        if self.is_initiator || upper - lower > ID_LIST_THRESHOLD {
                            self.split_range(lower, upper, &bound, &mut out)?;
                        } else {
                            out.write_fingerprint(&bound, &ours);
                        }
                    }
                }

                Mode::IdList => {
                    let theirs = reader.read_id_list()?;

                    if self.is_initiator || upper - lower <= ID_LIST_THRESHOLD {
                        let ours = self.diff_range(lower, upper, &theirs, &mut have, &mut need)?;

                        if self.is_initiator || (have.is_empty() && need.is_empty()) {
                            skip = true;
                        } else {
                            flush_skip(&mut out, &mut skip, &prev_bound);
                            out.write_id_list(&bound, ours.iter());
                        }
                    } else {
                        flush_skip(&mut out, &mut skip, &prev_bound);
                        self.split_range(lower, upper, &bound, &mut out)?;
                    }
                }
            }

            if self.exceeds_limit(out.len()) {
                // Drop this entry and summarise everything from its start.
                out.rollback(checkpoint);
                skip = skip_before;
                flush_skip(&mut out, &mut skip, &prev_bound);

                let remaining = self.storage.fingerprint(lower, storage_size)?;
                out.write_fingerprint(&Bound::infinity(), &remaining);

                tracing::debug!(
                    lower,
                    frame_len = out.len(),
                    limit = self.config.frame_size_limit,
                    "frame size limit reached"
                );
                break;
            }

            for id in have.drain(..) {
                if self.reported.insert(id) {
                    on_have(id);
                }
            }
            for id in need.drain(..) {
                if self.reported.insert(id) {
                    on_need(id);
                }
            }

            prev_index = upper;
            prev_bound = bound;
        }

        tracing::debug!(
            initiator = self.is_initiator,
            in_len = query.len(),
            out_len = out.len(),
            "reconciled frame"
        );

        if self.is_initiator && !out.has_entries() {
            return Ok(None);
        }
        Ok(Some(out.into_bytes()))
    }

    /// Emit `[lower, upper)` as an id list, or as 16 fingerprinted buckets.
    fn split_range(
        &self,
        lower: usize,
        upper: usize,
        upper_bound: &Bound,
        out: &mut FrameWriter,
    ) -> Result<()> {
        let count = upper - lower;

        if count <= ID_LIST_THRESHOLD {
            let mut ids = Vec::with_capacity(count);
            self.storage.iterate(lower, upper, &mut |item, _| {
                ids.push(item.id);
                true
            })?;
            out.write_id_list(upper_bound, ids.iter());
            return Ok(());
        }

        let per_bucket = count / BUCKETS;
        let extra = count % BUCKETS;
        let mut cursor = lower;

        for i in 0..BUCKETS {
            let size = per_bucket + usize::from(i < extra);
            let fingerprint = self.storage.fingerprint(cursor, cursor + size)?;
            cursor += size;

            let bound = if i == BUCKETS - 1 {
                *upper_bound
            } else {
                let prev = self.storage.get_item(cursor - 1)?;
                let next = self.storage.get_item(cursor)?;
                self.bucket_bound(&prev, &next)
            };
            out.write_fingerprint(&bound, &fingerprint);
        }

        Ok(())
    }

    fn bucket_bound(&self, prev: &Item, next: &Item) -> Bound {
        match self.config.bound_encoding {
            BoundEncoding::Minimal => Bound::minimal(prev, next),
            BoundEncoding::FullId => Bound::from_item(next),
        }
    }

    /// Compare local ids in `[lower, upper)` with the peer's list.
    ///
    /// Fills `have` with local-only ids and `need` with peer-only ids, and
    /// returns the local ids.
    fn diff_range(
        &self,
        lower: usize,
        upper: usize,
        theirs: &[ItemId],
        have: &mut Vec<ItemId>,
        need: &mut Vec<ItemId>,
    ) -> Result<Vec<ItemId>> {
        let mut remaining: HashSet<ItemId> = theirs.iter().copied().collect();
        let mut ours = Vec::with_capacity(upper - lower);

        self.storage.iterate(lower, upper, &mut |item, _| {
            if !remaining.remove(&item.id) {
                have.push(item.id);
            }
            ours.push(item.id);
            true
        })?;

        // Preserve the peer's order; removal drops repeats.
        for id in theirs {
            if remaining.remove(id) {
                need.push(*id);
            }
        }

        Ok(ours)
    }

    fn exceeds_limit(&self, len: usize) -> bool {
        len > self.config.frame_size_limit - FRAME_SIZE_SLACK
    }
}

/// Emit a pending skip ending at `bound`.
fn flush_skip(out: &mut FrameWriter, skip: &mut bool, bound: &Bound) {
    if *skip {
        *skip = false;
        out.write_skip(bound);
    }
}
