//! Sessions and responders talking over the in-memory transport.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use negsync::{
    ControlMessage, ItemId, MemoryTransport, Negentropy, Node, SessionConfig, StorageVector,
    SubscriptionId, Transport,
};
use negsync::sync::SessionState;
use negsync_testkit::PairFixture;
use serde_json::json;

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn config() -> SessionConfig {
    SessionConfig::default().with_message_timeout(Duration::from_secs(5))
}

#[tokio::test]
async fn test_session_against_responder() {
    init_tracing();
    let pair = PairFixture::new(2_000, 7, 11);
    let local = Node::new(pair.local_storage(), config()).unwrap();
    let remote = Node::new(pair.remote_storage(), config()).unwrap();

    let (local_transport, remote_transport) = MemoryTransport::pair();

    let remote_seen = Arc::new(Mutex::new((Vec::new(), Vec::new())));
    let seen = Arc::clone(&remote_seen);
    let server = tokio::spawn(async move {
        remote
            .serve(
                &remote_transport,
                |id| seen.lock().unwrap().0.push(id),
                |id| seen.lock().unwrap().1.push(id),
            )
            .await
    });

    let mut have = Vec::new();
    let mut need = Vec::new();
    let report = local
        .sync(
            local_transport,
            json!({"kinds": [1]}),
            |id| have.push(id),
            |id| need.push(id),
        )
        .await
        .unwrap();

    server.await.unwrap().unwrap();

    assert_eq!(report.have, 7);
    assert_eq!(report.need, 11);
    assert!(report.rounds >= 1);
    assert!(report.bytes_sent > 0 && report.bytes_received > 0);

    let have: std::collections::BTreeSet<ItemId> = have.into_iter().collect();
    let need: std::collections::BTreeSet<ItemId> = need.into_iter().collect();
    assert_eq!(have, pair.only_local());
    assert_eq!(need, pair.only_remote());

    let (remote_have, remote_need) = remote_seen.lock().unwrap().clone();
    assert_eq!(remote_have.into_iter().collect::<std::collections::BTreeSet<_>>(), pair.only_remote());
    assert_eq!(remote_need.into_iter().collect::<std::collections::BTreeSet<_>>(), pair.only_local());
}

#[tokio::test]
async fn test_responder_rejects_filter() {
    init_tracing();
    let pair = PairFixture::new(10, 0, 0);
    let local = Node::new(pair.local_storage(), config()).unwrap();
    let remote = Node::new(pair.remote_storage(), config()).unwrap();
    let (local_transport, remote_transport) = MemoryTransport::pair();

    let server = tokio::spawn(async move {
        let mut responder = remote
            .responder()
            .unwrap()
            .with_filter_check(|filter| filter.get("limit").is_none());
        responder.serve(&remote_transport, |_| {}, |_| {}).await
    });

    let mut session = local
        .session(local_transport, json!({"limit": 5}))
        .unwrap();
    let result = session.run(|_| {}, |_| {}).await;

    match result {
        Err(negsync::sync::SyncError::PeerError { reason }) => assert!(reason.starts_with("blocked:")),
        other => panic!("expected peer error, got {other:?}"),
    }
    assert_eq!(session.state(), SessionState::Closed);

    drop(session);
    server.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_concurrent_subscriptions_on_one_connection() {
    init_tracing();
    let pair = PairFixture::new(300, 2, 2);
    let local = Node::new(pair.local_storage(), config()).unwrap();
    let remote = Node::new(pair.remote_storage(), config()).unwrap();
    let (client, server) = MemoryTransport::pair();

    let mut responder = remote.responder().unwrap();
    let mut first = local_engine_open(&local, "one");
    let second = local_engine_open(&local, "two");

    // Interleave two opens, then continue only the first.
    for open in [first.1.clone(), second.1.clone()] {
        client.send(open).await.unwrap();
    }
    for _ in 0..2 {
        let message = server.recv().await.unwrap();
        if let Some(reply) = responder.handle(message, |_| {}, |_| {}) {
            server.send(reply).await.unwrap();
        }
    }
    assert_eq!(responder.session_count(), 2);

    let mut replies = Vec::new();
    for _ in 0..2 {
        replies.push(client.recv().await.unwrap());
    }
    let reply_one = replies
        .into_iter()
        .find(|m| m.id().as_str() == "one")
        .unwrap();

    let mut need = Vec::new();
    let next = first
        .0
        .reconcile(reply_one.frame().unwrap(), |_| {}, |id| need.push(id))
        .unwrap();
    assert!(next.is_some());
    assert!(need.is_empty());

    client
        .send(ControlMessage::Close {
            id: SubscriptionId::new("one"),
        })
        .await
        .unwrap();
    let close = server.recv().await.unwrap();
    assert!(responder.handle(close, |_| {}, |_| {}).is_none());
    assert_eq!(responder.session_count(), 1);
    assert!(responder.has_session(&SubscriptionId::new("two")));
}

fn local_engine_open<'a>(
    node: &'a Node,
    id: &str,
) -> (Negentropy<&'a StorageVector>, ControlMessage) {
    let mut engine = Negentropy::with_config(node.storage(), node.config().engine.clone()).unwrap();
    let frame = engine.initiate().unwrap();
    (
        engine,
        ControlMessage::Open {
            id: SubscriptionId::new(id),
            filter: json!({}),
            frame,
        },
    )
}
