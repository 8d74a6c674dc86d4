//! In-process convergence driver.
//!
//! Runs an initiator and a responder engine against each other without a
//! transport. Useful for tests and for reconciling two local collections.

use negsync_core::ItemId;
use negsync_store::Storage;

use crate::engine::{EngineConfig, Negentropy};
use crate::error::{Result, SyncError};

/// Upper bound on exchanged rounds before giving up.
pub const MAX_ROUNDS: usize = 4096;

/// Everything both sides learned from one exchange.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConvergenceReport {
    /// Responder replies processed by the initiator.
    pub rounds: usize,
    /// Ids only the initiator holds, as reported on the initiator.
    pub local_have: Vec<ItemId>,
    /// Ids only the responder holds, as reported on the initiator.
    pub local_need: Vec<ItemId>,
    /// Ids only the responder holds, as reported on the responder.
    pub remote_have: Vec<ItemId>,
    /// Ids only the initiator holds, as reported on the responder.
    pub remote_need: Vec<ItemId>,
    /// Largest frame sent in either direction.
    pub max_frame_len: usize,
    /// Total frame bytes in both directions.
    pub bytes_exchanged: usize,
}

impl ConvergenceReport {
    /// Whether the two sides were already identical.
    pub fn is_in_sync(&self) -> bool {
        self.local_have.is_empty()
            && self.local_need.is_empty()
            && self.remote_have.is_empty()
            && self.remote_need.is_empty()
    }
}

/// Reconcile `local` (initiator) against `remote` (responder).
pub fn reconcile_local<A, B>(local: A, remote: B, config: EngineConfig) -> Result<ConvergenceReport>
where
    A: Storage,
    B: Storage,
{
    let mut initiator = Negentropy::with_config(local, config.clone())?;
    let mut responder = Negentropy::with_config(remote, config)?;
    let mut report = ConvergenceReport::default();

    let mut frame = initiator.initiate()?;
    report.record_frame(frame.len());

    loop {
        if report.rounds >= MAX_ROUNDS {
            return Err(SyncError::NotConverged {
                rounds: report.rounds,
            });
        }

        let Some(reply) = responder.reconcile(
            &frame,
            |id| report.remote_have.push(id),
            |id| report.remote_need.push(id),
        )?
        else {
            break;
        };
        report.record_frame(reply.len());
        report.rounds += 1;

        match initiator.reconcile(
            &reply,
            |id| report.local_have.push(id),
            |id| report.local_need.push(id),
        )? {
            Some(next) => {
                report.record_frame(next.len());
                frame = next;
            }
            None => break,
        }
    }

    tracing::debug!(
        rounds = report.rounds,
        bytes = report.bytes_exchanged,
        "local reconciliation finished"
    );
    Ok(report)
}

impl ConvergenceReport {
    fn record_frame(&mut self, len: usize) {
        self.max_frame_len = self.max_frame_len.max(len);
        self.bytes_exchanged += len;
    }
}

/// Whether two storages hold the same id set, by full-range fingerprint.
pub fn fingerprints_match<A: Storage, B: Storage>(a: &A, b: &B) -> Result<bool> {
    let fa = a.fingerprint(0, a.size()?)?;
    let fb = b.fingerprint(0, b.size()?)?;
    Ok(fa == fb)
}
