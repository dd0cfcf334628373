#![cfg(unix)]

mod common;

use common::{process_alive, wait_until, FakeFfmpeg};
use relaycast_core::{
    bootstrap::build_services,
    models::{Retelecast, RetelecastId, RetelecastStatus},
    platform::StaticToken,
    repository::{MemoryStore, VodAssetRepository},
    service::Repositories,
    test_helpers::{ready_asset, FakePlatformClient, TEST_INGESTION_ADDRESS},
    Config,
};
use relaycast_livestream::{RelayRuntime, RelaySupervisor};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

struct Flow {
    runtime: RelayRuntime,
    repos: Repositories,
    media: TempDir,
    _ffmpeg: FakeFfmpeg,
}

fn config(ffmpeg: &FakeFfmpeg, media: &TempDir) -> Config {
    let mut config = Config::default();
    config.relay.ffmpeg_path = ffmpeg.path().to_string();
    config.relay.stop_grace_ms = 500;
    config.lifecycle.settle_delay_ms = 50;
    config.lifecycle.go_live_delay_ms = 50;
    config.media.root = media.path().to_str().unwrap().to_string();
    config
}

/// A runtime whose relays run `ffmpeg_body`; the script's arguments land in `<media>/args`.
fn flow(ffmpeg_body: &str) -> Flow {
    let media = tempfile::tempdir().unwrap();
    std::fs::write(media.path().join("v1.mp4"), b"not really a video").unwrap();
    let args_file = media.path().join("args");
    let ffmpeg = FakeFfmpeg::new(&format!(
        "echo \"$@\" > '{}'\n{ffmpeg_body}",
        args_file.display()
    ));

    let config = config(&ffmpeg, &media);
    let repos = Repositories::memory(&MemoryStore::new());
    let (supervisor, exits) = RelaySupervisor::new(&config.relay);
    let supervisor = Arc::new(supervisor);
    let services = build_services(
        &config,
        &repos,
        Arc::new(FakePlatformClient::new()),
        supervisor.clone(),
    );
    let runtime = RelayRuntime::assemble(&config, &repos, supervisor, exits, services);

    Flow {
        runtime,
        repos,
        media,
        _ffmpeg: ffmpeg,
    }
}

impl Flow {
    async fn launched(&self, loop_count: u32) -> Retelecast {
        self.repos
            .assets
            .save(&ready_asset("v1", "v1.mp4"))
            .await
            .unwrap();
        let retelecast = self
            .runtime
            .services
            .retelecasts
            .create_retelecast("v1", "Launch day", loop_count)
            .await
            .unwrap();
        self.runtime
            .services
            .retelecasts
            .launch(&retelecast.id)
            .await
            .unwrap()
    }

    async fn status(&self, id: &RetelecastId) -> RetelecastStatus {
        self.runtime.services.retelecasts.get(id).await.unwrap().status
    }

    async fn wait_for(&self, id: &RetelecastId, status: RetelecastStatus) -> bool {
        wait_until(Duration::from_secs(5), move || async move { self.status(id).await == status }).await
    }

    async fn stream_key(&self, retelecast: &Retelecast) -> String {
        self.runtime
            .services
            .broadcasts
            .get(&retelecast.broadcast_id)
            .await
            .unwrap()
            .stream_key
    }
}

#[tokio::test]
async fn clean_relay_exit_completes_retelecast() {
    let flow = flow("sleep 0.5\nexit 0");
    let retelecast = flow.launched(3).await;
    assert_eq!(retelecast.status, RetelecastStatus::Starting);

    assert!(flow.wait_for(&retelecast.id, RetelecastStatus::Streaming).await);
    assert!(flow.wait_for(&retelecast.id, RetelecastStatus::Completed).await);

    let finished = flow.runtime.services.retelecasts.get(&retelecast.id).await.unwrap();
    assert!(finished.ended_at.is_some());
    assert!(finished.error_message.is_none());
    assert_eq!(flow.runtime.supervisor.active_count(), 0);

    let args = std::fs::read_to_string(flow.media.path().join("args")).unwrap();
    let stream_key = flow.stream_key(&retelecast).await;
    assert!(args.contains("-re"));
    assert!(args.contains("-stream_loop 2"));
    assert!(args.contains(&flow.media.path().join("v1.mp4").display().to_string()));
    assert!(args.contains(&format!("{TEST_INGESTION_ADDRESS}/{stream_key}")));

    flow.runtime.shutdown().await;
}

#[tokio::test]
async fn failing_relay_overrides_optimistic_streaming() {
    let flow = flow("sleep 0.5\nexit 1");
    let retelecast = flow.launched(1).await;

    assert!(flow.wait_for(&retelecast.id, RetelecastStatus::Streaming).await);
    assert!(flow.wait_for(&retelecast.id, RetelecastStatus::Error).await);

    let failed = flow.runtime.services.retelecasts.get(&retelecast.id).await.unwrap();
    assert_eq!(
        failed.error_message.as_deref(),
        Some("relay exited with code 1")
    );

    flow.runtime.shutdown().await;
}

#[tokio::test]
async fn stopped_retelecast_stays_stopped_after_relay_dies() {
    let flow = flow("exec sleep 30");
    let retelecast = flow.launched(1).await;
    let stream_key = flow.stream_key(&retelecast).await;
    let pid = flow
        .runtime
        .supervisor
        .relay_info(&stream_key)
        .unwrap()
        .pid
        .unwrap();

    let stopped = flow
        .runtime
        .services
        .retelecasts
        .stop_retelecast(&retelecast.id)
        .await
        .unwrap();
    assert_eq!(stopped.status, RetelecastStatus::Stopped);
    assert!(!flow.runtime.supervisor.is_running(&stream_key));

    assert!(wait_until(Duration::from_secs(5), move || async move { !process_alive(pid) }).await);
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(flow.status(&retelecast.id).await, RetelecastStatus::Stopped);

    flow.runtime.shutdown().await;
}

#[tokio::test]
async fn second_launch_is_refused() {
    let flow = flow("exec sleep 30");
    let retelecast = flow.launched(1).await;

    let err = flow
        .runtime
        .services
        .retelecasts
        .launch(&retelecast.id)
        .await
        .unwrap_err();
    assert!(matches!(err, relaycast_core::Error::AlreadyStarted(_)));
    assert_eq!(flow.runtime.supervisor.active_count(), 1);

    flow.runtime.shutdown().await;
}

#[tokio::test]
async fn runtime_starts_with_token_source_and_shuts_down() {
    let ffmpeg = FakeFfmpeg::new("exec sleep 30");
    let media = tempfile::tempdir().unwrap();
    let config = config(&ffmpeg, &media);
    let repos = Repositories::memory(&MemoryStore::new());

    let runtime =
        RelayRuntime::start(&config, &repos, Arc::new(StaticToken::new("test-token"))).unwrap();
    assert_eq!(runtime.supervisor.active_count(), 0);

    runtime.shutdown().await;
}
