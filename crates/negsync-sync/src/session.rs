//! Initiator-side sync session.
//!
//! A session binds one storage and engine to a transport under a single
//! subscription id. It opens with `NEG-OPEN`, feeds every `NEG-MSG` from the
//! peer into the engine, and closes once the engine has nothing left to say.

use std::time::Duration;

use negsync_core::ItemId;
use negsync_store::Storage;
use serde_json::Value;

use crate::engine::{EngineConfig, Negentropy};
use crate::error::{Result, SyncError};
use crate::messages::{ControlMessage, SubscriptionId};
use crate::transport::Transport;

/// Configuration for sync sessions.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Timeout for waiting for peer messages.
    pub message_timeout: Duration,
    /// Engine configuration.
    pub engine: EngineConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            message_timeout: Duration::from_secs(30),
            engine: EngineConfig::default(),
        }
    }
}

impl SessionConfig {
    pub fn with_message_timeout(mut self, timeout: Duration) -> Self {
        self.message_timeout = timeout;
        self
    }

    pub fn with_engine(mut self, engine: EngineConfig) -> Self {
        self.engine = engine;
        self
    }
}

/// Lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Open,
    Closed,
}

/// Outcome of handling one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    /// A reply was sent; more messages are expected.
    Continue,
    /// Reconciliation finished and the session closed.
    Complete,
    /// The peer closed the session.
    ClosedByPeer,
}

/// Counters for one session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Frames received from the peer and reconciled.
    pub rounds: usize,
    /// Ids reported through `on_have`.
    pub have: usize,
    /// Ids reported through `on_need`.
    pub need: usize,
    /// Frame bytes sent, before hex encoding.
    pub bytes_sent: usize,
    /// Frame bytes received, before hex decoding.
    pub bytes_received: usize,
}

/// Sync session state.
pub struct SyncSession<S: Storage, T: Transport> {
    /// The reconciliation engine over local storage.
    engine: Negentropy<S>,
    /// The transport layer.
    transport: T,
    /// Configuration.
    config: SessionConfig,
    /// Subscription this session runs under.
    id: SubscriptionId,
    /// Application filter sent with `NEG-OPEN`.
    filter: Value,
    state: SessionState,
    report: SyncReport,
}

impl<S: Storage, T: Transport> SyncSession<S, T> {
    /// Create a new session with a random subscription id.
    pub fn new(storage: S, transport: T, filter: Value, config: SessionConfig) -> Result<Self> {
        let engine = Negentropy::with_config(storage, config.engine.clone())?;
        Ok(Self {
            engine,
            transport,
            config,
            id: SubscriptionId::random(),
            filter,
            state: SessionState::Idle,
            report: SyncReport::default(),
        })
    }

    /// Use a specific subscription id instead of a random one.
    pub fn with_id(mut self, id: SubscriptionId) -> Self {
        self.id = id;
        self
    }

    pub fn id(&self) -> &SubscriptionId {
        &self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn report(&self) -> &SyncReport {
        &self.report
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Subscribe and send `NEG-OPEN` with the initial frame.
    pub async fn start(&mut self) -> Result<()> {
        match self.state {
            SessionState::Idle => {}
            SessionState::Open => return Err(SyncError::AlreadyInitiated),
            SessionState::Closed => return Err(SyncError::Closed),
        }

        // A failed subscribe leaves the engine untouched so start can be retried.
        self.transport.subscribe(&self.id).await?;
        let frame = match self.engine.initiate() {
            Ok(frame) => frame,
            Err(err) => {
                if let Err(unsub) = self.transport.unsubscribe(&self.id).await {
                    tracing::debug!(id = %self.id, error = %unsub, "unsubscribe failed");
                }
                return Err(err);
            }
        };

        self.report.bytes_sent += frame.len();
        self.transport
            .send(ControlMessage::Open {
                id: self.id.clone(),
                filter: self.filter.clone(),
                frame,
            })
            .await?;

        self.state = SessionState::Open;
        tracing::debug!(id = %self.id, "sync session opened");
        Ok(())
    }

    /// Handle one message from the peer.
    ///
    /// Messages for other subscriptions are ignored. Malformed frames and
    /// peer errors close the session and are returned as errors.
    pub async fn handle<H, N>(
        &mut self,
        message: ControlMessage,
        mut on_have: H,
        mut on_need: N,
    ) -> Result<SessionStatus>
    where
        H: FnMut(ItemId),
        N: FnMut(ItemId),
    {
        if self.state != SessionState::Open {
            return Err(SyncError::Closed);
        }
        if message.id() != &self.id {
            tracing::trace!(id = %message.id(), "ignoring message for another subscription");
            return Ok(SessionStatus::Continue);
        }

        match message {
            ControlMessage::Msg { frame, .. } => {
                self.report.rounds += 1;
                self.report.bytes_received += frame.len();

                let (mut have, mut need) = (0, 0);
                let reply = self.engine.reconcile(
                    &frame,
                    |id| {
                        have += 1;
                        on_have(id)
                    },
                    |id| {
                        need += 1;
                        on_need(id)
                    },
                );
                self.report.have += have;
                self.report.need += need;

                match reply {
                    Ok(Some(frame)) => {
                        self.report.bytes_sent += frame.len();
                        self.transport
                            .send(ControlMessage::Msg {
                                id: self.id.clone(),
                                frame,
                            })
                            .await?;
                        Ok(SessionStatus::Continue)
                    }
                    Ok(None) => {
                        self.close().await?;
                        tracing::debug!(
                            id = %self.id,
                            rounds = self.report.rounds,
                            have = self.report.have,
                            need = self.report.need,
                            "sync session complete"
                        );
                        Ok(SessionStatus::Complete)
                    }
                    Err(err) => {
                        tracing::warn!(id = %self.id, error = %err, "reconcile failed");
                        self.close().await?;
                        Err(err)
                    }
                }
            }
            ControlMessage::Close { .. } => {
                self.close_local().await?;
                tracing::debug!(id = %self.id, "peer closed sync session");
                Ok(SessionStatus::ClosedByPeer)
            }
            ControlMessage::Err { reason, .. } => {
                self.close_local().await?;
                tracing::warn!(id = %self.id, %reason, "peer aborted sync session");
                Err(SyncError::PeerError { reason })
            }
            ControlMessage::Open { .. } => {
                self.close().await?;
                Err(SyncError::InvalidMessage(
                    "NEG-OPEN sent to the initiating side".into(),
                ))
            }
        }
    }

    /// Start if needed, then handle messages until the session ends.
    pub async fn run<H, N>(&mut self, mut on_have: H, mut on_need: N) -> Result<SyncReport>
    where
        H: FnMut(ItemId),
        N: FnMut(ItemId),
    {
        if self.state == SessionState::Idle {
            self.start().await?;
        }

        while self.state == SessionState::Open {
            let timeout = self.config.message_timeout;
            let Some(message) = self.transport.recv_timeout(timeout).await? else {
                self.close().await?;
                return Err(SyncError::Timeout(format!(
                    "no reply on subscription {} within {:?}",
                    self.id, timeout
                )));
            };
            self.handle(message, &mut on_have, &mut on_need).await?;
        }

        Ok(self.report.clone())
    }

    /// Unsubscribe and send `NEG-CLOSE`. Closing twice is a no-op.
    pub async fn close(&mut self) -> Result<()> {
        if self.state == SessionState::Open {
            self.close_local().await?;
            self.transport
                .send(ControlMessage::Close {
                    id: self.id.clone(),
                })
                .await?;
        }
        self.state = SessionState::Closed;
        Ok(())
    }

    /// Close without telling the peer.
    async fn close_local(&mut self) -> Result<()> {
        self.state = SessionState::Closed;
        self.transport.unsubscribe(&self.id).await
    }
}
