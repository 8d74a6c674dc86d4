//! The Node: one sealed collection ready to reconcile with peers.
//!
//! A node owns its storage behind an `Arc`, so any number of sessions and
//! responders can read it concurrently while it stays sealed.

use std::sync::Arc;

use negsync_core::{Item, ItemId};
use negsync_store::{Storage, StorageError, StorageVector};
use negsync_sync::{
    reconcile_local, ConvergenceReport, SessionConfig, SyncReport, SyncResponder, SyncSession,
    Transport,
};
use serde_json::Value;

use crate::error::Result;

/// A sealed item collection plus the configuration used to sync it.
#[derive(Debug, Clone)]
pub struct Node {
    /// The sealed storage.
    storage: Arc<StorageVector>,
    /// Session and engine configuration.
    config: SessionConfig,
}

impl Node {
    /// Create a node from sealed storage.
    pub fn new(storage: StorageVector, config: SessionConfig) -> Result<Self> {
        if !storage.is_sealed() {
            return Err(StorageError::NotSealed.into());
        }
        config.engine.validate()?;
        Ok(Self {
            storage: Arc::new(storage),
            config,
        })
    }

    /// Build, seal, and wrap a collection in one step.
    pub fn from_items(items: impl IntoIterator<Item = Item>, config: SessionConfig) -> Result<Self> {
        Self::new(StorageVector::from_items(items)?, config)
    }

    pub fn storage(&self) -> &StorageVector {
        &self.storage
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.storage.size().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Open a session over `transport` and run it to completion.
    pub async fn sync<T, H, N>(
        &self,
        transport: T,
        filter: Value,
        on_have: H,
        on_need: N,
    ) -> Result<SyncReport>
    where
        T: Transport,
        H: FnMut(ItemId),
        N: FnMut(ItemId),
    {
        let mut session = self.session(transport, filter)?;
        Ok(session.run(on_have, on_need).await?)
    }

    /// Create a session without starting it.
    pub fn session<T: Transport>(
        &self,
        transport: T,
        filter: Value,
    ) -> Result<SyncSession<Arc<StorageVector>, T>> {
        Ok(SyncSession::new(
            Arc::clone(&self.storage),
            transport,
            filter,
            self.config.clone(),
        )?)
    }

    /// Create a responder serving this node's storage.
    pub fn responder(&self) -> Result<SyncResponder<Arc<StorageVector>>> {
        Ok(SyncResponder::new(
            Arc::clone(&self.storage),
            self.config.engine.clone(),
        )?)
    }

    /// Answer sessions arriving on `transport` until the peer disconnects.
    pub async fn serve<T, H, N>(&self, transport: &T, on_have: H, on_need: N) -> Result<()>
    where
        T: Transport,
        H: FnMut(ItemId),
        N: FnMut(ItemId),
    {
        let mut responder = self.responder()?;
        responder.serve(transport, on_have, on_need).await?;
        tracing::debug!("responder finished");
        Ok(())
    }

    /// Reconcile against another in-process node.
    pub fn reconcile_with(&self, other: &Node) -> Result<ConvergenceReport> {
        Ok(reconcile_local(
            self.storage.as_ref(),
            other.storage.as_ref(),
            self.config.engine.clone(),
        )?)
    }
}
