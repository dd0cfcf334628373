//! Test helpers and fixtures for relaycast tests
//!
//! Scripted stand-ins for the remote platform and the relay supervisor, plus
//! record builders. Compiled for this crate's tests and, through the
//! `test-util` feature, for other workspace crates.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use crate::{
    models::{
        Broadcast, BroadcastId, BroadcastStatus, LatencyPreference, Visibility, VodAsset,
        VodAssetStatus,
    },
    platform::{
        BroadcastSpec, IngestSpec, PlatformClient, PlatformClientError, PlatformResult,
        RemoteBroadcast, RemoteChannel, RemoteIngestPoint, RemoteTransition, RemoteVideo,
    },
    media_store::MediaStore,
    service::{RelayControl, RelaySpec},
    Error, Result,
};

pub const TEST_INGESTION_ADDRESS: &str = "rtmp://a.rtmp.youtube.com/live2";

/// Generate a random stream key for testing
pub fn random_stream_key() -> String {
    format!("key-{}", nanoid::nanoid!(8))
}

/// A ready VOD asset stored at `location`
pub fn ready_asset(video_id: &str, location: &str) -> VodAsset {
    let mut asset = VodAsset::pending(video_id.to_string(), format!("Video {video_id}"));
    asset.status = VodAssetStatus::Ready;
    asset.storage_location = Some(location.to_string());
    asset.file_size = Some(1024);
    asset
}

/// Test fixture builder for Broadcast
pub struct BroadcastFixture {
    id: BroadcastId,
    title: String,
    stream_key: String,
    ingestion_address: String,
    status: BroadcastStatus,
}

impl Default for BroadcastFixture {
    fn default() -> Self {
        Self::new()
    }
}

impl BroadcastFixture {
    pub fn new() -> Self {
        Self {
            id: BroadcastId::new(),
            title: "Test Broadcast".to_string(),
            stream_key: random_stream_key(),
            ingestion_address: TEST_INGESTION_ADDRESS.to_string(),
            status: BroadcastStatus::Created,
        }
    }

    pub fn with_title(mut self, title: &str) -> Self {
        self.title = title.to_string();
        self
    }

    pub fn with_stream_key(mut self, stream_key: &str) -> Self {
        self.stream_key = stream_key.to_string();
        self
    }

    pub fn with_ingestion_address(mut self, address: &str) -> Self {
        self.ingestion_address = address.to_string();
        self
    }

    pub fn with_status(mut self, status: BroadcastStatus) -> Self {
        self.status = status;
        self
    }

    pub fn build(self) -> Broadcast {
        let now = Utc::now();
        Broadcast {
            remote_broadcast_id: format!("remote-{}", self.id),
            remote_stream_id: format!("stream-{}", self.id),
            id: self.id,
            title: self.title,
            description: None,
            visibility: Visibility::Public,
            latency: LatencyPreference::Normal,
            category: None,
            tags: Vec::new(),
            thumbnail_url: None,
            stream_key: self.stream_key,
            ingestion_address: self.ingestion_address,
            status: self.status,
            scheduled_start_time: None,
            actual_start_time: None,
            actual_end_time: None,
            viewer_count: None,
            recording_available: false,
            last_error: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Default)]
struct FakePlatformState {
    calls: Vec<String>,
    failures: HashMap<String, String>,
    hangs: HashSet<String>,
    next_id: u32,
    recording_status: Option<String>,
    viewers: Option<u64>,
    videos: HashMap<String, RemoteVideo>,
    ingest_specs: Vec<IngestSpec>,
}

/// Scripted `PlatformClient`
///
/// Calls are recorded as `create_broadcast`, `create_ingest_point`, `bind`,
/// `transition:<state>`, `get_broadcast`, `list_channels` and
/// `get_video_metadata`. Any of those names can be scripted to fail or hang.
#[derive(Default)]
pub struct FakePlatformClient {
    state: Mutex<FakePlatformState>,
}

impl FakePlatformClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail(&self, call: &str, message: &str) {
        self.state
            .lock()
            .failures
            .insert(call.to_string(), message.to_string());
    }

    pub fn hang(&self, call: &str) {
        self.state.lock().hangs.insert(call.to_string());
    }

    pub fn set_recording_status(&self, status: &str) {
        self.state.lock().recording_status = Some(status.to_string());
    }

    pub fn set_viewers(&self, viewers: u64) {
        self.state.lock().viewers = Some(viewers);
    }

    pub fn add_video(&self, video_id: &str, title: &str) {
        self.state.lock().videos.insert(
            video_id.to_string(),
            RemoteVideo {
                id: video_id.to_string(),
                title: title.to_string(),
                description: None,
                duration_secs: Some(3600),
            },
        );
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().calls.clone()
    }

    /// Every ingest point requested so far
    pub fn ingest_specs(&self) -> Vec<IngestSpec> {
        self.state.lock().ingest_specs.clone()
    }

    pub fn call_count(&self, call: &str) -> usize {
        self.state.lock().calls.iter().filter(|c| *c == call).count()
    }

    async fn enter(&self, call: String) -> PlatformResult<u32> {
        let (hang, outcome) = {
            let mut state = self.state.lock();
            state.calls.push(call.clone());
            state.next_id += 1;
            let outcome = match state.failures.get(&call) {
                Some(message) => Err(PlatformClientError::Http {
                    status: reqwest::StatusCode::FORBIDDEN,
                    message: message.clone(),
                }),
                None => Ok(state.next_id),
            };
            (state.hangs.contains(&call), outcome)
        };
        if hang {
            std::future::pending::<()>().await;
        }
        outcome
    }

    fn remote(&self, id: &str, life_cycle_status: &str) -> RemoteBroadcast {
        let state = self.state.lock();
        RemoteBroadcast {
            id: id.to_string(),
            life_cycle_status: Some(life_cycle_status.to_string()),
            recording_status: state.recording_status.clone(),
            concurrent_viewers: state.viewers,
        }
    }
}

#[async_trait]
impl PlatformClient for FakePlatformClient {
    async fn create_broadcast(&self, _spec: &BroadcastSpec) -> PlatformResult<RemoteBroadcast> {
        let n = self.enter("create_broadcast".to_string()).await?;
        Ok(self.remote(&format!("remote-bc-{n}"), "created"))
    }

    async fn create_ingest_point(&self, spec: &IngestSpec) -> PlatformResult<RemoteIngestPoint> {
        self.state.lock().ingest_specs.push(spec.clone());
        let n = self.enter("create_ingest_point".to_string()).await?;
        Ok(RemoteIngestPoint {
            id: format!("remote-stream-{n}"),
            stream_key: format!("{}-{n}", random_stream_key()),
            ingestion_address: TEST_INGESTION_ADDRESS.to_string(),
        })
    }

    async fn bind(&self, _broadcast_id: &str, _ingest_id: &str) -> PlatformResult<()> {
        self.enter("bind".to_string()).await?;
        Ok(())
    }

    async fn transition(
        &self,
        broadcast_id: &str,
        to: RemoteTransition,
    ) -> PlatformResult<RemoteBroadcast> {
        self.enter(format!("transition:{}", to.as_str())).await?;
        Ok(self.remote(broadcast_id, to.as_str()))
    }

    async fn get_broadcast(&self, broadcast_id: &str) -> PlatformResult<RemoteBroadcast> {
        self.enter("get_broadcast".to_string()).await?;
        Ok(self.remote(broadcast_id, "live"))
    }

    async fn list_channels(&self) -> PlatformResult<Vec<RemoteChannel>> {
        self.enter("list_channels".to_string()).await?;
        Ok(vec![RemoteChannel {
            id: "channel-1".to_string(),
            title: "Test Channel".to_string(),
            subscriber_count: Some(10),
            video_count: Some(3),
        }])
    }

    async fn get_video_metadata(&self, video_id: &str) -> PlatformResult<RemoteVideo> {
        self.enter("get_video_metadata".to_string()).await?;
        self.state
            .lock()
            .videos
            .get(video_id)
            .cloned()
            .ok_or_else(|| PlatformClientError::NotFound(format!("video {video_id}")))
    }
}

#[derive(Default)]
struct FakeRelayState {
    running: HashMap<String, RelaySpec>,
    started: Vec<(String, RelaySpec)>,
    stopped: Vec<String>,
    spawn_error: Option<String>,
}

/// Records relay requests without spawning anything
#[derive(Default)]
pub struct FakeRelayControl {
    state: Mutex<FakeRelayState>,
}

impl FakeRelayControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following `start_relay` fail as a spawn error
    pub fn fail_spawn(&self, message: &str) {
        self.state.lock().spawn_error = Some(message.to_string());
    }

    /// Forget a relay as if its process had exited
    pub fn finish(&self, stream_key: &str) -> bool {
        self.state.lock().running.remove(stream_key).is_some()
    }

    pub fn started(&self) -> Vec<(String, RelaySpec)> {
        self.state.lock().started.clone()
    }

    pub fn stopped(&self) -> Vec<String> {
        self.state.lock().stopped.clone()
    }
}

#[async_trait]
impl RelayControl for FakeRelayControl {
    async fn start_relay(&self, stream_key: &str, spec: RelaySpec) -> Result<()> {
        let mut state = self.state.lock();
        if let Some(message) = &state.spawn_error {
            return Err(Error::Internal(message.clone()));
        }
        if state.running.contains_key(stream_key) {
            return Err(Error::AlreadyRunning(stream_key.to_string()));
        }
        state.running.insert(stream_key.to_string(), spec.clone());
        state.started.push((stream_key.to_string(), spec));
        Ok(())
    }

    async fn stop_relay(&self, stream_key: &str) {
        let mut state = self.state.lock();
        state.running.remove(stream_key);
        state.stopped.push(stream_key.to_string());
    }

    fn is_running(&self, stream_key: &str) -> bool {
        self.state.lock().running.contains_key(stream_key)
    }
}

/// Media store that knows a fixed set of locations; paths resolve verbatim
#[derive(Default)]
pub struct FakeMediaStore {
    files: Mutex<HashMap<String, u64>>,
}

impl FakeMediaStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(self, location: &str, size: u64) -> Self {
        self.files.lock().insert(location.to_string(), size);
        self
    }

    pub fn remove(&self, location: &str) {
        self.files.lock().remove(location);
    }
}

#[async_trait]
impl MediaStore for FakeMediaStore {
    fn resolve(&self, location: &str) -> PathBuf {
        PathBuf::from(location)
    }

    async fn exists(&self, location: &str) -> std::io::Result<bool> {
        Ok(self.files.lock().contains_key(location))
    }

    async fn size(&self, location: &str) -> std::io::Result<u64> {
        self.files.lock().get(location).copied().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::NotFound, location.to_string())
        })
    }
}
