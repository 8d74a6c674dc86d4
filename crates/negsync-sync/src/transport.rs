//! Transport abstraction for sync sessions.
//!
//! The transport delivers control messages between two peers and tracks
//! which subscriptions are open. Implementations may use WebSockets, a
//! relay connection, or anything else that preserves per-subscription order.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;
use crate::messages::{ControlMessage, SubscriptionId};

/// Transport trait for sending and receiving control messages.
///
/// Implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a message to the peer.
    async fn send(&self, message: ControlMessage) -> Result<()>;

    /// Receive the next message from the peer.
    ///
    /// Fails with [`SyncError::Closed`](crate::SyncError::Closed) once the
    /// peer is gone.
    async fn recv(&self) -> Result<ControlMessage>;

    /// Receive with timeout.
    ///
    /// Returns None if timeout expires before a message arrives.
    async fn recv_timeout(&self, timeout: Duration) -> Result<Option<ControlMessage>>;

    /// Register interest in a subscription.
    async fn subscribe(&self, id: &SubscriptionId) -> Result<()>;

    /// Drop interest in a subscription.
    async fn unsubscribe(&self, id: &SubscriptionId) -> Result<()>;
}

/// A simple in-memory transport for testing.
///
/// Messages cross the channel as JSON text, so both ends exercise the
/// control message encoding.
pub mod memory {
    use super::*;
    use std::collections::HashSet;
    use tokio::sync::{mpsc, RwLock};

    use crate::error::SyncError;

    const CHANNEL_CAPACITY: usize = 1000;

    /// One end of an in-memory connection.
    pub struct MemoryTransport {
        sender: mpsc::Sender<String>,
        receiver: RwLock<mpsc::Receiver<String>>,
        subscriptions: RwLock<HashSet<SubscriptionId>>,
    }

    impl MemoryTransport {
        /// Create two connected endpoints.
        pub fn pair() -> (Self, Self) {
            let (tx_a, rx_a) = mpsc::channel(CHANNEL_CAPACITY);
            let (tx_b, rx_b) = mpsc::channel(CHANNEL_CAPACITY);
            (Self::new(tx_a, rx_b), Self::new(tx_b, rx_a))
        }

        fn new(sender: mpsc::Sender<String>, receiver: mpsc::Receiver<String>) -> Self {
            Self {
                sender,
                receiver: RwLock::new(receiver),
                subscriptions: RwLock::new(HashSet::new()),
            }
        }

        /// Whether `id` is currently subscribed on this end.
        pub async fn is_subscribed(&self, id: &SubscriptionId) -> bool {
            self.subscriptions.read().await.contains(id)
        }

        /// Number of open subscriptions on this end.
        pub async fn subscription_count(&self) -> usize {
            self.subscriptions.read().await.len()
        }
    }

    #[async_trait]
    impl Transport for MemoryTransport {
        async fn send(&self, message: ControlMessage) -> Result<()> {
            self.sender
                .send(message.to_json())
                .await
                .map_err(|_| SyncError::Transport("peer disconnected".into()))
        }

        async fn recv(&self) -> Result<ControlMessage> {
            let mut rx = self.receiver.write().await;
            match rx.recv().await {
                Some(text) => ControlMessage::from_json(&text),
                None => Err(SyncError::Closed),
            }
        }

        async fn recv_timeout(&self, timeout: Duration) -> Result<Option<ControlMessage>> {
            let mut rx = self.receiver.write().await;
            match tokio::time::timeout(timeout, rx.recv()).await {
                Ok(Some(text)) => ControlMessage::from_json(&text).map(Some),
                Ok(None) => Err(SyncError::Closed),
                Err(_) => Ok(None), // Timeout
            }
        }

        async fn subscribe(&self, id: &SubscriptionId) -> Result<()> {
            self.subscriptions.write().await.insert(id.clone());
            Ok(())
        }

        async fn unsubscribe(&self, id: &SubscriptionId) -> Result<()> {
            self.subscriptions.write().await.remove(id);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::memory::MemoryTransport;
    use super::*;
    use crate::error::SyncError;

    #[tokio::test]
    async fn test_memory_transport_send_recv() {
        let (a, b) = MemoryTransport::pair();
        let msg = ControlMessage::Msg {
            id: SubscriptionId::new("s"),
            frame: vec![0x61, 0x00],
        };

        a.send(msg.clone()).await.unwrap();
        assert_eq!(b.recv().await.unwrap(), msg);

        b.send(ControlMessage::Close {
            id: SubscriptionId::new("s"),
        })
        .await
        .unwrap();
        assert!(matches!(a.recv().await.unwrap(), ControlMessage::Close { .. }));
    }

    #[tokio::test]
    async fn test_memory_transport_timeout() {
        let (a, _b) = MemoryTransport::pair();
        let got = a.recv_timeout(Duration::from_millis(10)).await.unwrap();
        assert!(got.is_none());
    }

    #[tokio::test]
    async fn test_memory_transport_peer_dropped() {
        let (a, b) = MemoryTransport::pair();
        drop(b);

        assert!(matches!(a.recv().await, Err(SyncError::Closed)));
        let sent = a
            .send(ControlMessage::Close {
                id: SubscriptionId::new("s"),
            })
            .await;
        assert!(matches!(sent, Err(SyncError::Transport(_))));
    }

    #[tokio::test]
    async fn test_subscription_bookkeeping() {
        let (a, _b) = MemoryTransport::pair();
        let id = SubscriptionId::new("s");

        a.subscribe(&id).await.unwrap();
        assert!(a.is_subscribed(&id).await);
        assert_eq!(a.subscription_count().await, 1);

        a.unsubscribe(&id).await.unwrap();
        assert!(!a.is_subscribed(&id).await);
    }
}
