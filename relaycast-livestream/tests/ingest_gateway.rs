use relaycast_core::{
    models::BroadcastStatus,
    repository::{BroadcastRepository, MemoryStore},
    service::{IngestAuthority, Repositories},
    test_helpers::{BroadcastFixture, FakeRelayControl, TEST_INGESTION_ADDRESS},
    Error,
};
use relaycast_livestream::{IngestError, IngestEventHandler, IngestGateway};
use std::sync::Arc;

struct Harness {
    repos: Repositories,
    relay: Arc<FakeRelayControl>,
    gateway: IngestGateway,
}

fn harness() -> Harness {
    let repos = Repositories::memory(&MemoryStore::new());
    let relay = Arc::new(FakeRelayControl::new());
    let gateway = IngestGateway::new(
        IngestAuthority::new(Arc::clone(&repos.broadcasts)),
        Arc::clone(&repos.broadcasts),
        relay.clone(),
        "rtmp://127.0.0.1:1935/live/",
    );
    Harness {
        repos,
        relay,
        gateway,
    }
}

#[tokio::test]
async fn unknown_key_is_rejected_at_attempt() {
    let h = harness();
    let err = h.gateway.on_publish_attempt("nope").await.unwrap_err();
    assert!(matches!(err, IngestError::Rejected));
}

#[tokio::test]
async fn live_broadcast_no_longer_accepts_publishers() {
    let h = harness();
    let broadcast = BroadcastFixture::new()
        .with_status(BroadcastStatus::Live)
        .build();
    h.repos.broadcasts.save(&broadcast).await.unwrap();

    assert!(h.gateway.on_publish_attempt(&broadcast.stream_key).await.is_err());
    assert!(matches!(
        h.gateway.on_publish_start(&broadcast.stream_key).await.unwrap_err(),
        IngestError::Rejected
    ));
    assert!(h.relay.started().is_empty());
}

#[tokio::test]
async fn publish_start_relays_local_feed_to_ingest_point() {
    let h = harness();
    let broadcast = BroadcastFixture::new().with_stream_key("abc123").build();
    h.repos.broadcasts.save(&broadcast).await.unwrap();

    h.gateway.on_publish_attempt("abc123").await.unwrap();
    h.gateway.on_publish_start("abc123").await.unwrap();

    let started = h.relay.started();
    assert_eq!(started.len(), 1);
    let (key, spec) = &started[0];
    assert_eq!(key, "abc123");
    assert_eq!(spec.source, "rtmp://127.0.0.1:1935/live/abc123");
    assert_eq!(spec.destination, format!("{TEST_INGESTION_ADDRESS}/abc123"));
    assert_eq!(spec.loop_count, None);
}

#[tokio::test]
async fn publish_end_stops_the_relay() {
    let h = harness();
    let broadcast = BroadcastFixture::new().with_stream_key("abc123").build();
    h.repos.broadcasts.save(&broadcast).await.unwrap();

    h.gateway.on_publish_start("abc123").await.unwrap();
    h.gateway.on_publish_end("abc123").await;

    assert_eq!(h.relay.stopped(), vec!["abc123".to_string()]);
    // the key is free again
    h.gateway.on_publish_start("abc123").await.unwrap();
}

#[tokio::test]
async fn second_publisher_for_running_key_fails() {
    let h = harness();
    let broadcast = BroadcastFixture::new()
        .with_stream_key("abc123")
        .with_status(BroadcastStatus::Testing)
        .build();
    h.repos.broadcasts.save(&broadcast).await.unwrap();

    h.gateway.on_publish_start("abc123").await.unwrap();
    let err = h.gateway.on_publish_start("abc123").await.unwrap_err();

    assert!(matches!(err, IngestError::Relay(Error::AlreadyRunning(_))));
    assert_eq!(h.relay.started().len(), 1);
}

#[tokio::test]
async fn broadcast_without_ingestion_address_is_not_ready() {
    let h = harness();
    let broadcast = BroadcastFixture::new()
        .with_stream_key("abc123")
        .with_ingestion_address("")
        .build();
    h.repos.broadcasts.save(&broadcast).await.unwrap();

    let err = h.gateway.on_publish_start("abc123").await.unwrap_err();
    assert!(matches!(err, IngestError::Relay(Error::NotReady(_))));
}
