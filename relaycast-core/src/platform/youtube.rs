//! YouTube Data API v3 client (liveBroadcasts, liveStreams, channels, videos)

use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use super::error::{check_response, json_with_limit, PlatformClientError};
use super::{
    BroadcastSpec, IngestSpec, PlatformClient, PlatformResult, RemoteBroadcast, RemoteChannel,
    RemoteIngestPoint, RemoteTransition, RemoteVideo,
};
use crate::config::PlatformConfig;

/// Supplies the OAuth bearer token for API calls.
///
/// Token issuance and refresh live outside this crate.
#[async_trait]
pub trait AccessTokenSource: Send + Sync {
    async fn access_token(&self) -> PlatformResult<String>;
}

/// Fixed token that can be swapped when the owner refreshes it
#[derive(Debug)]
pub struct StaticToken {
    token: RwLock<String>,
}

impl StaticToken {
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: RwLock::new(token.into()),
        }
    }

    pub fn replace(&self, token: impl Into<String>) {
        *self.token.write() = token.into();
    }
}

#[async_trait]
impl AccessTokenSource for StaticToken {
    async fn access_token(&self) -> PlatformResult<String> {
        let token = self.token.read().clone();
        if token.is_empty() {
            return Err(PlatformClientError::Auth("No access token configured".to_string()));
        }
        Ok(token)
    }
}

pub struct YouTubeClient {
    client: Client,
    base_url: String,
    tokens: Arc<dyn AccessTokenSource>,
}

impl std::fmt::Debug for YouTubeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("YouTubeClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl YouTubeClient {
    pub fn new(
        config: &PlatformConfig,
        tokens: Arc<dyn AccessTokenSource>,
    ) -> PlatformResult<Self> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout())
            .timeout(config.request_timeout())
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            tokens,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }

    async fn authorized(&self, req: reqwest::RequestBuilder) -> PlatformResult<reqwest::RequestBuilder> {
        let token = self.tokens.access_token().await?;
        Ok(req.bearer_auth(token))
    }

    async fn send<T: serde::de::DeserializeOwned>(
        &self,
        req: reqwest::RequestBuilder,
    ) -> PlatformResult<T> {
        let resp = self.authorized(req).await?.send().await?;
        let resp = check_response(resp).await?;
        json_with_limit(resp).await
    }
}

#[derive(Debug, Deserialize)]
struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LiveBroadcastResource {
    id: String,
    #[serde(default)]
    status: Option<LiveBroadcastStatus>,
    #[serde(default)]
    statistics: Option<LiveBroadcastStatistics>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LiveBroadcastStatus {
    life_cycle_status: Option<String>,
    recording_status: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LiveBroadcastStatistics {
    // uint64 values arrive as JSON strings
    concurrent_viewers: Option<serde_json::Value>,
}

impl From<LiveBroadcastResource> for RemoteBroadcast {
    fn from(res: LiveBroadcastResource) -> Self {
        let (life_cycle_status, recording_status) = res
            .status
            .map(|s| (s.life_cycle_status, s.recording_status))
            .unwrap_or_default();
        Self {
            id: res.id,
            life_cycle_status,
            recording_status,
            concurrent_viewers: res
                .statistics
                .and_then(|s| s.concurrent_viewers)
                .as_ref()
                .and_then(json_u64),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LiveStreamResource {
    id: String,
    cdn: Option<LiveStreamCdn>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LiveStreamCdn {
    ingestion_info: Option<IngestionInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IngestionInfo {
    #[serde(default)]
    stream_name: String,
    #[serde(default)]
    ingestion_address: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChannelResource {
    id: String,
    snippet: Option<TitledSnippet>,
    statistics: Option<ChannelStatistics>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChannelStatistics {
    subscriber_count: Option<serde_json::Value>,
    video_count: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoResource {
    id: String,
    snippet: Option<TitledSnippet>,
    content_details: Option<VideoContentDetails>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TitledSnippet {
    #[serde(default)]
    title: String,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoContentDetails {
    duration: Option<String>,
}

fn json_u64(value: &serde_json::Value) -> Option<u64> {
    match value {
        serde_json::Value::String(s) => s.parse().ok(),
        serde_json::Value::Number(n) => n.as_u64(),
        _ => None,
    }
}

/// Parse an ISO 8601 duration such as `PT1H2M3S` into seconds.
fn parse_iso8601_duration(value: &str) -> Option<i64> {
    let rest = value.strip_prefix('P')?;
    let (days, time) = match rest.split_once('T') {
        Some((d, t)) => (d, t),
        None => (rest, ""),
    };

    let mut total = 0i64;
    let mut number = String::new();
    for (part, is_time) in [(days, false), (time, true)] {
        for c in part.chars() {
            if c.is_ascii_digit() {
                number.push(c);
                continue;
            }
            let n: i64 = number.parse().ok()?;
            number.clear();
            let unit = match (c, is_time) {
                ('D', false) => 86_400,
                ('H', true) => 3_600,
                ('M', true) => 60,
                ('S', true) => 1,
                _ => return None,
            };
            total = total.checked_add(n.checked_mul(unit)?)?;
        }
    }

    number.is_empty().then_some(total)
}

#[async_trait]
impl PlatformClient for YouTubeClient {
    async fn create_broadcast(&self, spec: &BroadcastSpec) -> PlatformResult<RemoteBroadcast> {
        let mut snippet = json!({
            "title": spec.title,
            "description": spec.description,
            "scheduledStartTime": spec.scheduled_start_time.map(|t| t.to_rfc3339()),
        });
        if let Some(thumb) = &spec.thumbnail_url {
            snippet["thumbnails"] = json!({ "default": { "url": thumb } });
        }

        let body = json!({
            "snippet": snippet,
            "status": {
                "privacyStatus": spec.visibility.as_str(),
                "selfDeclaredMadeForKids": false,
            },
            "contentDetails": {
                "latencyPreference": spec.latency.as_str(),
                "enableAutoStart": true,
                "enableAutoStop": true,
            },
        });

        let req = self
            .client
            .post(self.url("liveBroadcasts"))
            .query(&[("part", "snippet,status,contentDetails")])
            .json(&body);

        let resource: LiveBroadcastResource = self.send(req).await?;
        Ok(resource.into())
    }

    async fn create_ingest_point(&self, spec: &IngestSpec) -> PlatformResult<RemoteIngestPoint> {
        let body = json!({
            "snippet": {
                "title": spec.title,
                "description": spec.description,
            },
            "cdn": {
                "ingestionType": "rtmp",
                "resolution": spec.resolution,
                "frameRate": spec.frame_rate,
            },
        });

        let req = self
            .client
            .post(self.url("liveStreams"))
            .query(&[("part", "snippet,cdn")])
            .json(&body);

        let resource: LiveStreamResource = self.send(req).await?;
        let info = resource
            .cdn
            .and_then(|cdn| cdn.ingestion_info)
            .ok_or_else(|| PlatformClientError::Parse("liveStream missing cdn.ingestionInfo".to_string()))?;

        Ok(RemoteIngestPoint {
            id: resource.id,
            stream_key: info.stream_name,
            ingestion_address: info.ingestion_address,
        })
    }

    async fn bind(&self, broadcast_id: &str, ingest_id: &str) -> PlatformResult<()> {
        let req = self
            .client
            .post(self.url("liveBroadcasts/bind"))
            .query(&[("part", "id"), ("id", broadcast_id), ("streamId", ingest_id)]);

        let _: serde_json::Value = self.send(req).await?;
        Ok(())
    }

    async fn transition(
        &self,
        broadcast_id: &str,
        to: RemoteTransition,
    ) -> PlatformResult<RemoteBroadcast> {
        let req = self.client.post(self.url("liveBroadcasts/transition")).query(&[
            ("part", "id,snippet,status"),
            ("id", broadcast_id),
            ("broadcastStatus", to.as_str()),
        ]);

        let resource: LiveBroadcastResource = self.send(req).await?;
        Ok(resource.into())
    }

    async fn get_broadcast(&self, broadcast_id: &str) -> PlatformResult<RemoteBroadcast> {
        let req = self
            .client
            .get(self.url("liveBroadcasts"))
            .query(&[("part", "id,snippet,status,statistics"), ("id", broadcast_id)]);

        let list: ListResponse<LiveBroadcastResource> = self.send(req).await?;
        list.items
            .into_iter()
            .next()
            .map(Into::into)
            .ok_or_else(|| PlatformClientError::NotFound(format!("broadcast {broadcast_id}")))
    }

    async fn list_channels(&self) -> PlatformResult<Vec<RemoteChannel>> {
        let req = self
            .client
            .get(self.url("channels"))
            .query(&[("part", "id,snippet,statistics"), ("mine", "true")]);

        let list: ListResponse<ChannelResource> = self.send(req).await?;
        Ok(list
            .items
            .into_iter()
            .map(|c| RemoteChannel {
                id: c.id,
                title: c.snippet.map(|s| s.title).unwrap_or_default(),
                subscriber_count: c
                    .statistics
                    .as_ref()
                    .and_then(|s| s.subscriber_count.as_ref())
                    .and_then(json_u64),
                video_count: c
                    .statistics
                    .as_ref()
                    .and_then(|s| s.video_count.as_ref())
                    .and_then(json_u64),
            })
            .collect())
    }

    async fn get_video_metadata(&self, video_id: &str) -> PlatformResult<RemoteVideo> {
        let req = self
            .client
            .get(self.url("videos"))
            .query(&[("part", "id,snippet,contentDetails,status"), ("id", video_id)]);

        let list: ListResponse<VideoResource> = self.send(req).await?;
        let video = list
            .items
            .into_iter()
            .next()
            .ok_or_else(|| PlatformClientError::NotFound(format!("video {video_id}")))?;

        let (title, description) = video
            .snippet
            .map(|s| (s.title, s.description))
            .unwrap_or_default();

        Ok(RemoteVideo {
            id: video.id,
            title,
            description,
            duration_secs: video
                .content_details
                .and_then(|d| d.duration)
                .as_deref()
                .and_then(parse_iso8601_duration),
        })
    }
}
