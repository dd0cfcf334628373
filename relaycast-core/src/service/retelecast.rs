//! Retelecast controller
//!
//! Replays a stored VOD asset into a freshly scheduled broadcast through a
//! looping relay. `starting` is promoted to `streaming` optimistically after
//! the settle delay; the relay's exit always has the final word.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;

use super::{
    with_deadline, BroadcastService, EntityLocks, RelayControl, RelayExit, RelayExitHandler,
    RelaySpec, Repositories, ScheduleRequest,
};
use crate::{
    media_store::MediaStore,
    models::{
        Broadcast, BroadcastStatus, Retelecast, RetelecastId, RetelecastStatus, Visibility,
        VodAsset,
    },
    repository::{BroadcastRepository, RetelecastRepository, VodAssetRepository},
    Error, Result,
};

#[derive(Clone)]
pub struct RetelecastService {
    retelecasts: Arc<dyn RetelecastRepository>,
    assets: Arc<dyn VodAssetRepository>,
    broadcasts: Arc<dyn BroadcastRepository>,
    broadcast_service: BroadcastService,
    media: Arc<dyn MediaStore>,
    relay: Arc<dyn RelayControl>,
    locks: EntityLocks,
}

impl std::fmt::Debug for RetelecastService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetelecastService").finish_non_exhaustive()
    }
}

impl RetelecastService {
    pub fn new(
        repositories: &Repositories,
        broadcast_service: BroadcastService,
        media: Arc<dyn MediaStore>,
        relay: Arc<dyn RelayControl>,
    ) -> Self {
        Self {
            retelecasts: Arc::clone(&repositories.retelecasts),
            assets: Arc::clone(&repositories.assets),
            broadcasts: Arc::clone(&repositories.broadcasts),
            broadcast_service,
            media,
            relay,
            locks: EntityLocks::new(),
        }
    }

    async fn load(&self, id: &RetelecastId) -> Result<Retelecast> {
        self.retelecasts
            .get(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Retelecast {id}")))
    }

    pub async fn get(&self, id: &RetelecastId) -> Result<Retelecast> {
        self.load(id).await
    }

    /// Retelecasts of one source video, newest first
    pub async fn list_for_video(&self, video_id: &str) -> Result<Vec<Retelecast>> {
        self.retelecasts.list_by_source_video_id(video_id).await
    }

    /// Schedule a replay broadcast for `video_id`.
    ///
    /// Creates a `pending` asset row when the download pipeline has never seen the video.
    pub async fn create_retelecast(
        &self,
        video_id: &str,
        title: &str,
        loop_count: u32,
    ) -> Result<Retelecast> {
        let video_id = video_id.trim();
        let title = title.trim();
        if video_id.is_empty() {
            return Err(Error::Validation("Video ID cannot be empty".to_string()));
        }
        if title.is_empty() {
            return Err(Error::Validation("Title cannot be empty".to_string()));
        }
        if loop_count == 0 {
            return Err(Error::Validation("Loop count must be at least 1".to_string()));
        }

        self.ensure_asset(video_id).await?;

        let request = ScheduleRequest {
            description: Some(format!(
                "This is a replay of a previous livestream. Original video: {video_id}"
            )),
            visibility: Visibility::Public,
            ingest_title: Some(format!("{title} - Retelecast Stream")),
            ingest_description: Some("Retelecast stream".to_string()),
            ..ScheduleRequest::new(format!("🔴 REPLAY: {title}"))
        };
        let broadcast = self.broadcast_service.schedule(request).await?;

        let retelecast = Retelecast::new(video_id.to_string(), broadcast.id.clone(), loop_count);
        self.retelecasts.save(&retelecast).await?;

        tracing::info!(
            retelecast_id = %retelecast.id,
            broadcast_id = %broadcast.id,
            video_id,
            loop_count,
            "Retelecast created"
        );
        Ok(retelecast)
    }

    async fn ensure_asset(&self, video_id: &str) -> Result<VodAsset> {
        if let Some(asset) = self.assets.get_by_video_id(video_id).await? {
            return Ok(asset);
        }

        let platform = self.broadcast_service.platform();
        let metadata = with_deadline(
            self.broadcast_service.timings().request_timeout,
            "get_video_metadata",
            platform.get_video_metadata(video_id),
        )
        .await
        .inspect_err(|e| {
            tracing::debug!(video_id, error = %e, "Video metadata unavailable; using fallback title");
        })
        .ok();

        let title = metadata
            .as_ref()
            .map(|m| m.title.trim())
            .filter(|t| !t.is_empty())
            .map_or_else(|| format!("Re-telecast of {video_id}"), str::to_string);

        let mut asset = VodAsset::pending(video_id.to_string(), title);
        if let Some(metadata) = metadata {
            asset.description = metadata.description;
            asset.duration_secs = metadata.duration_secs;
        }
        self.assets.save(&asset).await?;

        tracing::info!(video_id, asset_id = %asset.id, "Created pending VOD asset placeholder");
        Ok(asset)
    }

    /// Start streaming the stored asset into the destination broadcast.
    pub async fn launch(&self, id: &RetelecastId) -> Result<Retelecast> {
        let _guard = self.locks.lock(id.as_str()).await;
        let mut retelecast = self.load(id).await?;

        if retelecast.status != RetelecastStatus::Created {
            return Err(Error::AlreadyStarted(format!(
                "Retelecast {id} is {}",
                retelecast.status
            )));
        }

        let (source, broadcast, destination) = self.launch_target(&retelecast).await?;

        if self.relay.is_running(&broadcast.stream_key) {
            return Err(Error::AlreadyStarted(format!(
                "A relay is already running for broadcast {}",
                broadcast.id
            )));
        }

        let previous = retelecast.clone();
        retelecast.set_status(RetelecastStatus::Starting);
        retelecast.started_at = Some(Utc::now());
        self.retelecasts.save(&retelecast).await?;

        let spec = RelaySpec::replay(source, destination, retelecast.loop_count);
        match self.relay.start_relay(&broadcast.stream_key, spec).await {
            Ok(()) => {}
            Err(Error::AlreadyRunning(key)) => {
                // lost a race with another relay for the key; nothing was spawned
                self.retelecasts.save(&previous).await?;
                return Err(Error::AlreadyStarted(format!(
                    "A relay is already running for stream key {key}"
                )));
            }
            Err(e) => {
                tracing::error!(retelecast_id = %id, error = %e, "Failed to start relay");
                retelecast.set_status(RetelecastStatus::Error);
                retelecast.error_message = Some(e.to_string());
                retelecast.ended_at = Some(Utc::now());
                self.retelecasts.save(&retelecast).await?;
                return Err(e);
            }
        }

        tracing::info!(
            retelecast_id = %id,
            broadcast_id = %broadcast.id,
            loop_count = retelecast.loop_count,
            "Retelecast relay started"
        );
        self.spawn_settle(id.clone());
        Ok(retelecast)
    }

    /// Resolve the relay source and destination, or explain why the launch cannot happen yet.
    async fn launch_target(&self, retelecast: &Retelecast) -> Result<(String, Broadcast, String)> {
        let video_id = &retelecast.source_video_id;
        let asset = self
            .assets
            .get_by_video_id(video_id)
            .await?
            .ok_or_else(|| Error::NotReady(format!("No VOD asset for video {video_id}")))?;

        let location = match asset.storage_location.as_deref() {
            Some(location) if asset.is_streamable() => location,
            _ => {
                return Err(Error::NotReady(format!(
                    "VOD asset for video {video_id} is {}",
                    asset.status
                )))
            }
        };

        match self.media.exists(location).await {
            Ok(true) => {}
            Ok(false) => {
                return Err(Error::NotReady(format!(
                    "VOD file missing for video {video_id}"
                )))
            }
            Err(e) => {
                tracing::warn!(video_id, error = %e, "Media store check failed");
                return Err(Error::NotReady(format!(
                    "VOD file unavailable for video {video_id}"
                )));
            }
        }

        let broadcast = self
            .broadcasts
            .get(&retelecast.broadcast_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Broadcast {}", retelecast.broadcast_id)))?;
        let destination = broadcast.ingest_url().ok_or_else(|| {
            Error::NotReady(format!("Broadcast {} has no ingestion address", broadcast.id))
        })?;

        let source = self.media.resolve(location).to_string_lossy().into_owned();
        Ok((source, broadcast, destination))
    }

    fn spawn_settle(&self, id: RetelecastId) {
        let this = self.clone();
        let delay = self.broadcast_service.timings().settle_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(e) = this.settle(&id).await {
                tracing::warn!(retelecast_id = %id, error = %e, "Settle task failed");
            }
        });
    }

    async fn settle(&self, id: &RetelecastId) -> Result<()> {
        let _guard = self.locks.lock(id.as_str()).await;
        let mut retelecast = self.load(id).await?;
        if retelecast.status != RetelecastStatus::Starting {
            return Ok(());
        }
        retelecast.set_status(RetelecastStatus::Streaming);
        self.retelecasts.save(&retelecast).await?;
        tracing::info!(retelecast_id = %id, "Retelecast streaming");
        Ok(())
    }

    /// Record the outcome of a relay that ended on its own.
    ///
    /// Overrides whatever status is stored, including an optimistic `streaming`.
    /// Keys that belong to no retelecast (live passthrough relays) are ignored.
    pub async fn handle_relay_exit(&self, exit: &RelayExit) -> Result<()> {
        let broadcast = match self
            .broadcasts
            .find_by_stream_key(&exit.stream_key, &BroadcastStatus::ACTIVE)
            .await?
        {
            Some(b) => Some(b),
            None => {
                self.broadcasts
                    .find_by_stream_key(&exit.stream_key, &BroadcastStatus::ALL)
                    .await?
            }
        };
        let Some(broadcast) = broadcast else {
            tracing::debug!("Relay exit for unknown stream key ignored");
            return Ok(());
        };
        let Some(found) = self.retelecasts.find_by_broadcast_id(&broadcast.id).await? else {
            // live passthrough relay; its failure belongs to the broadcast
            if let Some(message) = exit.failure_message() {
                self.broadcast_service
                    .record_relay_failure(&broadcast.id, &message)
                    .await?;
            } else {
                tracing::debug!(broadcast_id = %broadcast.id, "Passthrough relay ended");
            }
            return Ok(());
        };

        let _guard = self.locks.lock(found.id.as_str()).await;
        let mut retelecast = self.load(&found.id).await?;

        match exit.failure_message() {
            None => {
                retelecast.set_status(RetelecastStatus::Completed);
                retelecast.error_message = None;
                tracing::info!(retelecast_id = %retelecast.id, "Retelecast completed");
            }
            Some(message) => {
                tracing::error!(
                    retelecast_id = %retelecast.id,
                    exit_code = ?exit.exit_code,
                    "Retelecast relay failed"
                );
                retelecast.set_status(RetelecastStatus::Error);
                retelecast.error_message = Some(message);
            }
        }
        retelecast.ended_at = Some(Utc::now());
        self.retelecasts.save(&retelecast).await
    }

    /// Stop a retelecast and its relay.
    ///
    /// A retelecast that already finished is returned unchanged. The destination
    /// broadcast is resolved first; if that fails nothing is written.
    pub async fn stop_retelecast(&self, id: &RetelecastId) -> Result<Retelecast> {
        let _guard = self.locks.lock(id.as_str()).await;
        let mut retelecast = self.load(id).await?;
        if retelecast.status.is_finished() {
            return Ok(retelecast);
        }

        let broadcast = self
            .broadcasts
            .get(&retelecast.broadcast_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Broadcast {}", retelecast.broadcast_id)))?;

        retelecast.set_status(RetelecastStatus::Stopped);
        retelecast.ended_at = Some(Utc::now());
        self.retelecasts.save(&retelecast).await?;
        self.relay.stop_relay(&broadcast.stream_key).await;

        tracing::info!(retelecast_id = %id, broadcast_id = %broadcast.id, "Retelecast stopped");
        Ok(retelecast)
    }

    /// Drop entity locks no task holds or waits on.
    pub fn prune_locks(&self) -> usize {
        self.locks.prune()
    }
}

#[async_trait]
impl RelayExitHandler for RetelecastService {
    async fn on_relay_exit(&self, exit: RelayExit) {
        if let Err(e) = self.handle_relay_exit(&exit).await {
            tracing::error!(error = %e, exit_code = ?exit.exit_code, "Failed to record relay exit");
        }
    }
}
