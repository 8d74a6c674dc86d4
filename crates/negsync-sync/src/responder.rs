//! Responder side of sync sessions.
//!
//! A [`SyncResponder`] serves any number of concurrent subscriptions over one
//! shared storage, each with its own responder engine.

use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};

use negsync_core::ItemId;
use negsync_store::Storage;
use serde_json::Value;

use crate::engine::{EngineConfig, Negentropy};
use crate::error::{Result, SyncError};
use crate::messages::{ControlMessage, SubscriptionId};
use crate::transport::Transport;

type FilterCheck = Box<dyn Fn(&Value) -> bool + Send + Sync>;

/// Sessions without traffic for this long are dropped.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(300);

/// One open subscription.
struct Subscription<S: Storage> {
    engine: Negentropy<S>,
    last_active: Instant,
}

/// Answers `NEG-OPEN` / `NEG-MSG` / `NEG-CLOSE` messages from initiators.
pub struct SyncResponder<S: Storage + Clone> {
    storage: S,
    config: EngineConfig,
    sessions: HashMap<SubscriptionId, Subscription<S>>,
    accept: Option<FilterCheck>,
    idle_timeout: Duration,
}

impl<S: Storage + Clone> SyncResponder<S> {
    pub fn new(storage: S, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            storage,
            config,
            sessions: HashMap::new(),
            accept: None,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        })
    }

    /// Drop sessions whose initiator has been silent for `timeout`.
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Only open sessions whose filter passes `check`.
    pub fn with_filter_check(
        mut self,
        check: impl Fn(&Value) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.accept = Some(Box::new(check));
        self
    }

    /// Number of open sessions.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn has_session(&self, id: &SubscriptionId) -> bool {
        self.sessions.contains_key(id)
    }

    /// Drop idle sessions, returning how many were removed.
    ///
    /// Runs on every [`handle`](Self::handle) call as well.
    pub fn evict_idle(&mut self) -> usize {
        self.evict_idle_at(Instant::now())
    }

    fn evict_idle_at(&mut self, now: Instant) -> usize {
        let timeout = self.idle_timeout;
        let before = self.sessions.len();
        self.sessions.retain(|id, sub| {
            let keep = now.saturating_duration_since(sub.last_active) < timeout;
            if !keep {
                tracing::debug!(%id, "evicting idle session");
            }
            keep
        });
        before - self.sessions.len()
    }

    /// Handle one message and return the reply to send, if any.
    ///
    /// Failures never escape: they are answered with `NEG-ERR` and the
    /// session is dropped.
    pub fn handle<H, N>(
        &mut self,
        message: ControlMessage,
        on_have: H,
        on_need: N,
    ) -> Option<ControlMessage>
    where
        H: FnMut(ItemId),
        N: FnMut(ItemId),
    {
        self.evict_idle();

        match message {
            ControlMessage::Open { id, filter, frame } => {
                if self.sessions.remove(&id).is_some() {
                    tracing::debug!(%id, "replacing stale session");
                }
                if let Some(check) = &self.accept {
                    if !check(&filter) {
                        tracing::debug!(%id, "filter rejected");
                        return Some(ControlMessage::Err {
                            id,
                            reason: "blocked: filter not accepted".into(),
                        });
                    }
                }

                let mut engine = match Negentropy::with_config(self.storage.clone(), self.config.clone()) {
                    Ok(engine) => engine,
                    Err(err) => return Some(error_reply(id, &err)),
                };
                let reply = engine.reconcile(&frame, on_have, on_need);
                self.finish_round(id, engine, reply)
            }
            ControlMessage::Msg { id, frame } => {
                let Some(Subscription { mut engine, .. }) = self.sessions.remove(&id) else {
                    tracing::debug!(%id, "NEG-MSG for unknown subscription");
                    return Some(ControlMessage::Err {
                        id,
                        reason: "closed: unknown subscription".into(),
                    });
                };
                let reply = engine.reconcile(&frame, on_have, on_need);
                self.finish_round(id, engine, reply)
            }
            ControlMessage::Close { id } => {
                if self.sessions.remove(&id).is_some() {
                    tracing::debug!(%id, "session closed by initiator");
                }
                None
            }
            ControlMessage::Err { id, reason } => {
                self.sessions.remove(&id);
                tracing::warn!(%id, %reason, "initiator aborted session");
                None
            }
        }
    }

    fn finish_round(
        &mut self,
        id: SubscriptionId,
        engine: Negentropy<S>,
        reply: Result<Option<Vec<u8>>>,
    ) -> Option<ControlMessage> {
        match reply {
            Ok(Some(frame)) => {
                let subscription = Subscription {
                    engine,
                    last_active: Instant::now(),
                };
                self.sessions.insert(id.clone(), subscription);
                Some(ControlMessage::Msg { id, frame })
            }
            Ok(None) => None,
            Err(err) => {
                tracing::warn!(%id, error = %err, "dropping session");
                Some(error_reply(id, &err))
            }
        }
    }

    /// Serve messages from `transport` until the peer disconnects.
    pub async fn serve<T, H, N>(&mut self, transport: &T, mut on_have: H, mut on_need: N) -> Result<()>
    where
        T: Transport,
        H: FnMut(ItemId),
        N: FnMut(ItemId),
    {
        loop {
            let message = match transport.recv().await {
                Ok(message) => message,
                Err(SyncError::Closed) => return Ok(()),
                Err(err) if err.is_protocol() => {
                    // Unparseable message; there is no id to answer.
                    tracing::warn!(error = %err, "dropping malformed message");
                    continue;
                }
                Err(err) => return Err(err),
            };

            if let Some(reply) = self.handle(message, &mut on_have, &mut on_need) {
                transport.send(reply).await?;
            }
        }
    }
}

impl<S: Storage + Clone> fmt::Debug for SyncResponder<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncResponder")
            .field("config", &self.config)
            .field("sessions", &self.sessions.len())
            .field("idle_timeout", &self.idle_timeout)
            .finish()
    }
}

fn error_reply(id: SubscriptionId, err: &SyncError) -> ControlMessage {
    let reason = if err.is_protocol() {
        format!("error: {err}")
    } else {
        format!("closed: {err}")
    };
    ControlMessage::Err { id, reason }
}

#[cfg(test)]
mod tests {
    use super::*;
    use negsync_core::Item;
    use negsync_store::StorageVector;
    use serde_json::json;

    fn storage(ids: &[u8]) -> StorageVector {
        StorageVector::from_items(
            ids.iter()
                .map(|b| Item::new(*b as u64 * 100, ItemId([*b; 32]))),
        )
        .unwrap()
    }

    fn open_frame(s: &StorageVector) -> Vec<u8> {
        Negentropy::new(s, 4096).unwrap().initiate().unwrap()
    }

    #[test]
    fn test_open_reports_and_keeps_session() {
        let local = storage(&[1, 2]);
        let remote = storage(&[2, 3]);
        let mut responder = SyncResponder::new(&remote, EngineConfig::default()).unwrap();

        let mut have = Vec::new();
        let mut need = Vec::new();
        let reply = responder.handle(
            ControlMessage::Open {
                id: SubscriptionId::new("s"),
                filter: json!({}),
                frame: open_frame(&local),
            },
            |id| have.push(id),
            |id| need.push(id),
        );

        assert!(matches!(reply, Some(ControlMessage::Msg { .. })));
        assert_eq!(have, vec![ItemId([3; 32])]);
        assert_eq!(need, vec![ItemId([1; 32])]);
        assert!(responder.has_session(&SubscriptionId::new("s")));

        responder.handle(ControlMessage::Close { id: SubscriptionId::new("s") }, |_| {}, |_| {});
        assert_eq!(responder.session_count(), 0);
    }

    #[test]
    fn test_bad_frame_answers_error_and_drops_session() {
        let remote = storage(&[1]);
        let mut responder = SyncResponder::new(&remote, EngineConfig::default()).unwrap();

        let reply = responder.handle(
            ControlMessage::Open {
                id: SubscriptionId::new("s"),
                filter: json!({}),
                frame: vec![0x01],
            },
            |_| {},
            |_| {},
        );

        match reply {
            Some(ControlMessage::Err { reason, .. }) => assert!(reason.starts_with("error:")),
            other => panic!("expected NEG-ERR, got {other:?}"),
        }
        assert_eq!(responder.session_count(), 0);
    }

    #[test]
    fn test_msg_for_unknown_subscription() {
        let remote = storage(&[]);
        let mut responder = SyncResponder::new(&remote, EngineConfig::default()).unwrap();

        let reply = responder.handle(
            ControlMessage::Msg {
                id: SubscriptionId::new("nope"),
                frame: vec![0x61],
            },
            |_| {},
            |_| {},
        );
        assert!(matches!(reply, Some(ControlMessage::Err { .. })));
    }

    #[test]
    fn test_reopen_replaces_session() {
        let local = storage(&[1]);
        let remote = storage(&[1]);
        let mut responder = SyncResponder::new(&remote, EngineConfig::default()).unwrap();
        let open = ControlMessage::Open {
            id: SubscriptionId::new("s"),
            filter: json!({}),
            frame: open_frame(&local),
        };

        responder.handle(open.clone(), |_| {}, |_| {});
        responder.handle(open, |_| {}, |_| {});
        assert_eq!(responder.session_count(), 1);
    }

    #[test]
    fn test_filter_check() {
        let local = storage(&[1]);
        let remote = storage(&[1]);
        let mut responder = SyncResponder::new(&remote, EngineConfig::default())
            .unwrap()
            .with_filter_check(|filter| filter.get("kinds").is_some());

        let reply = responder.handle(
            ControlMessage::Open {
                id: SubscriptionId::new("s"),
                filter: json!({"authors": []}),
                frame: open_frame(&local),
            },
            |_| {},
            |_| {},
        );
        match reply {
            Some(ControlMessage::Err { reason, .. }) => assert!(reason.starts_with("blocked:")),
            other => panic!("expected NEG-ERR, got {other:?}"),
        }
        assert_eq!(responder.session_count(), 0);
    }

    #[test]
    fn test_idle_sessions_are_evicted() {
        let local = storage(&[1]);
        let remote = storage(&[2]);
        let timeout = Duration::from_secs(60);
        let mut responder = SyncResponder::new(&remote, EngineConfig::default())
            .unwrap()
            .with_idle_timeout(timeout);

        for name in ["a", "b"] {
            responder.handle(
                ControlMessage::Open {
                    id: SubscriptionId::new(name),
                    filter: json!({}),
                    frame: open_frame(&local),
                },
                |_| {},
                |_| {},
            );
        }
        assert_eq!(responder.session_count(), 2);

        assert_eq!(responder.evict_idle(), 0);
        assert_eq!(responder.session_count(), 2);

        let later = Instant::now() + timeout + Duration::from_secs(1);
        assert_eq!(responder.evict_idle_at(later), 2);
        assert_eq!(responder.session_count(), 0);
    }

    #[test]
    fn test_rejects_small_frame_limit() {
        let remote = storage(&[]);
        let config = EngineConfig::default().with_frame_size_limit(100);
        assert!(matches!(
            SyncResponder::new(&remote, config),
            Err(SyncError::FrameSizeTooSmall { .. })
        ));
    }
}
