//! Remote broadcast platform interface
//!
//! `BroadcastService` and `RetelecastService` only see the `PlatformClient`
//! trait; `YouTubeClient` is the production implementation.

pub mod error;
pub mod youtube;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{LatencyPreference, Visibility};

pub use error::PlatformClientError;
pub use youtube::{AccessTokenSource, StaticToken, YouTubeClient};

pub type PlatformResult<T> = std::result::Result<T, PlatformClientError>;

/// Remote broadcast resource to allocate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BroadcastSpec {
    pub title: String,
    pub description: Option<String>,
    pub scheduled_start_time: Option<DateTime<Utc>>,
    pub visibility: Visibility,
    pub latency: LatencyPreference,
    pub thumbnail_url: Option<String>,
}

/// Remote ingest resource to allocate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestSpec {
    pub title: String,
    pub description: Option<String>,
    pub resolution: String,
    pub frame_rate: String,
}

impl IngestSpec {
    #[must_use]
    pub fn new(title: String, description: Option<String>) -> Self {
        Self {
            title,
            description,
            resolution: "720p".to_string(),
            frame_rate: "30fps".to_string(),
        }
    }
}

/// Snapshot of a remote broadcast resource
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteBroadcast {
    pub id: String,
    pub life_cycle_status: Option<String>,
    /// `recorded`, `recording` or `notRecording`
    pub recording_status: Option<String>,
    pub concurrent_viewers: Option<u64>,
}

impl RemoteBroadcast {
    #[must_use]
    pub fn is_recorded(&self) -> bool {
        self.recording_status.as_deref() == Some("recorded")
    }
}

/// Remote ingest point: the credential and address a publisher pushes to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteIngestPoint {
    pub id: String,
    pub stream_key: String,
    pub ingestion_address: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteTransition {
    Testing,
    Live,
    Complete,
}

impl RemoteTransition {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Testing => "testing",
            Self::Live => "live",
            Self::Complete => "complete",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteChannel {
    pub id: String,
    pub title: String,
    pub subscriber_count: Option<u64>,
    pub video_count: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteVideo {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub duration_secs: Option<i64>,
}

#[async_trait]
pub trait PlatformClient: Send + Sync {
    async fn create_broadcast(&self, spec: &BroadcastSpec) -> PlatformResult<RemoteBroadcast>;

    async fn create_ingest_point(&self, spec: &IngestSpec) -> PlatformResult<RemoteIngestPoint>;

    async fn bind(&self, broadcast_id: &str, ingest_id: &str) -> PlatformResult<()>;

    async fn transition(
        &self,
        broadcast_id: &str,
        to: RemoteTransition,
    ) -> PlatformResult<RemoteBroadcast>;

    async fn get_broadcast(&self, broadcast_id: &str) -> PlatformResult<RemoteBroadcast>;

    async fn list_channels(&self) -> PlatformResult<Vec<RemoteChannel>>;

    async fn get_video_metadata(&self, video_id: &str) -> PlatformResult<RemoteVideo>;
}
