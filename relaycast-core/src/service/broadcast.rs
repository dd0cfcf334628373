//! Broadcast lifecycle controller
//!
//! Keeps the local broadcast record in step with the remote platform. Every
//! local status write happens after the matching remote call succeeded, and
//! all writes for one broadcast are serialized by its entity lock.

use chrono::{DateTime, Utc};
use std::sync::Arc;

use super::{with_deadline, EntityLocks, LifecycleTimings};
use crate::{
    models::{Broadcast, BroadcastId, BroadcastStatus, LatencyPreference, Visibility},
    platform::{BroadcastSpec, IngestSpec, PlatformClient, RemoteTransition},
    repository::BroadcastRepository,
    Error, Result,
};

const MAX_TITLE_CHARS: usize = 100;
const MAX_DESCRIPTION_CHARS: usize = 5000;
const MAX_TAGS_CHARS: usize = 500;

#[derive(Debug, Clone, Default)]
pub struct ScheduleRequest {
    pub title: String,
    pub description: Option<String>,
    pub scheduled_start_time: Option<DateTime<Utc>>,
    pub visibility: Visibility,
    pub latency: LatencyPreference,
    pub category: Option<String>,
    pub tags: Vec<String>,
    pub thumbnail_url: Option<String>,
    /// Ingest point title; defaults to `"{title} - Stream"`
    pub ingest_title: Option<String>,
    /// Ingest point description; defaults to `description`
    pub ingest_description: Option<String>,
}

impl ScheduleRequest {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    fn validate(&self) -> Result<()> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(Error::Validation("Title cannot be empty".to_string()));
        }
        if title.chars().count() > MAX_TITLE_CHARS {
            return Err(Error::Validation(format!(
                "Title too long (max {MAX_TITLE_CHARS} characters)"
            )));
        }
        if let Some(description) = &self.description {
            if description.chars().count() > MAX_DESCRIPTION_CHARS {
                return Err(Error::Validation(format!(
                    "Description too long (max {MAX_DESCRIPTION_CHARS} characters)"
                )));
            }
        }
        // Counted the way the platform counts them: joined with commas
        let tags_len: usize = self.tags.iter().map(|t| t.chars().count()).sum::<usize>()
            + self.tags.len().saturating_sub(1);
        if tags_len > MAX_TAGS_CHARS {
            return Err(Error::Validation(format!(
                "Tags too long (max {MAX_TAGS_CHARS} characters in total)"
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct StopOutcome {
    pub broadcast: Broadcast,
    pub recording_available: bool,
}

/// A non-terminal broadcast with its current viewer sample
#[derive(Debug, Clone)]
pub struct ActiveBroadcast {
    pub broadcast: Broadcast,
    /// Only sampled for `live` broadcasts
    pub live_viewers: Option<u64>,
}

#[derive(Clone)]
pub struct BroadcastService {
    broadcasts: Arc<dyn BroadcastRepository>,
    platform: Arc<dyn PlatformClient>,
    locks: EntityLocks,
    timings: LifecycleTimings,
}

impl std::fmt::Debug for BroadcastService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BroadcastService")
            .field("timings", &self.timings)
            .finish_non_exhaustive()
    }
}

fn invalid_transition((from, to): (BroadcastStatus, BroadcastStatus)) -> Error {
    Error::Validation(format!("Cannot move broadcast from {from} to {to}"))
}

impl BroadcastService {
    pub fn new(
        broadcasts: Arc<dyn BroadcastRepository>,
        platform: Arc<dyn PlatformClient>,
        timings: LifecycleTimings,
    ) -> Self {
        Self {
            broadcasts,
            platform,
            locks: EntityLocks::new(),
            timings,
        }
    }

    pub(crate) fn platform(&self) -> &Arc<dyn PlatformClient> {
        &self.platform
    }

    pub(crate) const fn timings(&self) -> LifecycleTimings {
        self.timings
    }

    async fn load(&self, id: &BroadcastId) -> Result<Broadcast> {
        self.broadcasts
            .get(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Broadcast {id}")))
    }

    pub async fn get(&self, id: &BroadcastId) -> Result<Broadcast> {
        self.load(id).await
    }

    /// Create the remote broadcast and ingest point, bind them and persist as `created`.
    ///
    /// Remote resources created before a failure are not cleaned up; their IDs are logged.
    pub async fn schedule(&self, request: ScheduleRequest) -> Result<Broadcast> {
        request.validate()?;
        let title = request.title.trim().to_string();
        let deadline = self.timings.request_timeout;

        let spec = BroadcastSpec {
            title: title.clone(),
            description: request.description.clone(),
            scheduled_start_time: request.scheduled_start_time,
            visibility: request.visibility,
            latency: request.latency,
            thumbnail_url: request.thumbnail_url.clone(),
        };
        let remote = with_deadline(
            deadline,
            "create_broadcast",
            self.platform.create_broadcast(&spec),
        )
        .await?;

        let ingest_spec = IngestSpec::new(
            request
                .ingest_title
                .clone()
                .unwrap_or_else(|| format!("{title} - Stream")),
            request
                .ingest_description
                .clone()
                .or_else(|| request.description.clone()),
        );
        let ingest = match with_deadline(
            deadline,
            "create_ingest_point",
            self.platform.create_ingest_point(&ingest_spec),
        )
        .await
        {
            Ok(ingest) => ingest,
            Err(e) => {
                tracing::error!(
                    orphan_broadcast = %remote.id,
                    error = %e,
                    "Schedule failed after remote broadcast was created; leaving it orphaned"
                );
                return Err(e);
            }
        };

        if let Err(e) = with_deadline(
            deadline,
            "bind",
            self.platform.bind(&remote.id, &ingest.id),
        )
        .await
        {
            tracing::error!(
                orphan_broadcast = %remote.id,
                orphan_stream = %ingest.id,
                error = %e,
                "Schedule failed while binding; leaving remote resources orphaned"
            );
            return Err(e);
        }

        let now = Utc::now();
        let broadcast = Broadcast {
            id: BroadcastId::new(),
            remote_broadcast_id: remote.id,
            remote_stream_id: ingest.id,
            title,
            description: request.description,
            visibility: request.visibility,
            latency: request.latency,
            category: request.category,
            tags: request.tags,
            thumbnail_url: request.thumbnail_url,
            stream_key: ingest.stream_key,
            ingestion_address: ingest.ingestion_address,
            status: BroadcastStatus::Created,
            scheduled_start_time: request.scheduled_start_time,
            actual_start_time: None,
            actual_end_time: None,
            viewer_count: None,
            recording_available: false,
            last_error: None,
            created_at: now,
            updated_at: now,
        };

        if let Err(e) = self.broadcasts.save(&broadcast).await {
            tracing::error!(
                orphan_broadcast = %broadcast.remote_broadcast_id,
                orphan_stream = %broadcast.remote_stream_id,
                error = %e,
                "Failed to persist scheduled broadcast; leaving remote resources orphaned"
            );
            return Err(e);
        }

        tracing::info!(
            broadcast_id = %broadcast.id,
            remote_broadcast_id = %broadcast.remote_broadcast_id,
            "Broadcast scheduled"
        );
        Ok(broadcast)
    }

    /// Move a `created` or `ready` broadcast to `testing`, then go live after the configured delay.
    pub async fn start(&self, id: &BroadcastId) -> Result<Broadcast> {
        let broadcast = {
            let _guard = self.locks.lock(id.as_str()).await;
            let mut broadcast = self.load(id).await?;

            if !matches!(
                broadcast.status,
                BroadcastStatus::Created | BroadcastStatus::Ready
            ) {
                return Err(Error::Validation(format!(
                    "Cannot start broadcast in status {}",
                    broadcast.status
                )));
            }

            with_deadline(
                self.timings.request_timeout,
                "transition",
                self.platform
                    .transition(&broadcast.remote_broadcast_id, RemoteTransition::Testing),
            )
            .await?;

            broadcast
                .transition_to(BroadcastStatus::Testing)
                .map_err(invalid_transition)?;
            self.broadcasts.save(&broadcast).await?;
            broadcast
        };

        tracing::info!(broadcast_id = %id, "Broadcast testing; going live after delay");
        self.spawn_go_live(id.clone());
        Ok(broadcast)
    }

    fn spawn_go_live(&self, id: BroadcastId) {
        let this = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(this.timings.go_live_delay).await;
            if let Err(e) = this.go_live(&id).await {
                tracing::warn!(broadcast_id = %id, error = %e, "Go-live task failed");
            }
        });
    }

    async fn go_live(&self, id: &BroadcastId) -> Result<()> {
        let _guard = self.locks.lock(id.as_str()).await;
        let Some(mut broadcast) = self.broadcasts.get(id).await? else {
            return Ok(());
        };

        if broadcast.status != BroadcastStatus::Testing {
            tracing::debug!(
                broadcast_id = %id,
                status = %broadcast.status,
                "Broadcast left testing before go-live; skipping"
            );
            return Ok(());
        }

        match with_deadline(
            self.timings.request_timeout,
            "transition",
            self.platform
                .transition(&broadcast.remote_broadcast_id, RemoteTransition::Live),
        )
        .await
        {
            Ok(_) => {
                broadcast
                    .transition_to(BroadcastStatus::Live)
                    .map_err(invalid_transition)?;
                broadcast.actual_start_time = Some(Utc::now());
                broadcast.last_error = None;
                self.broadcasts.save(&broadcast).await?;
                tracing::info!(broadcast_id = %id, "Broadcast is live");
            }
            Err(e) => {
                tracing::error!(broadcast_id = %id, error = %e, "Go-live transition failed");
                broadcast.last_error = Some(e.to_string());
                broadcast.updated_at = Utc::now();
                self.broadcasts.save(&broadcast).await?;
            }
        }
        Ok(())
    }

    /// Complete a non-terminal broadcast.
    pub async fn stop(&self, id: &BroadcastId) -> Result<StopOutcome> {
        let _guard = self.locks.lock(id.as_str()).await;
        let mut broadcast = self.load(id).await?;

        if broadcast.status.is_terminal() {
            return Err(Error::Validation(format!(
                "Broadcast already {}",
                broadcast.status
            )));
        }

        let remote = with_deadline(
            self.timings.request_timeout,
            "transition",
            self.platform
                .transition(&broadcast.remote_broadcast_id, RemoteTransition::Complete),
        )
        .await?;

        broadcast
            .transition_to(BroadcastStatus::Complete)
            .map_err(invalid_transition)?;
        broadcast.actual_end_time = Some(Utc::now());
        broadcast.recording_available = remote.is_recorded();
        self.broadcasts.save(&broadcast).await?;

        tracing::info!(
            broadcast_id = %id,
            recording_available = broadcast.recording_available,
            "Broadcast completed"
        );

        Ok(StopOutcome {
            recording_available: broadcast.recording_available,
            broadcast,
        })
    }

    /// Current concurrent viewers of a live broadcast.
    ///
    /// `None` when the broadcast is not live or the sample could not be taken or stored.
    pub async fn sample_live(&self, id: &BroadcastId) -> Result<Option<u64>> {
        let broadcast = match self.broadcasts.get(id).await {
            Ok(Some(b)) => b,
            Ok(None) => return Err(Error::NotFound(format!("Broadcast {id}"))),
            Err(e) => {
                tracing::warn!(broadcast_id = %id, error = %e, "Viewer sample: lookup failed");
                return Ok(None);
            }
        };
        if broadcast.status != BroadcastStatus::Live {
            return Ok(None);
        }

        let remote = match with_deadline(
            self.timings.request_timeout,
            "get_broadcast",
            self.platform.get_broadcast(&broadcast.remote_broadcast_id),
        )
        .await
        {
            Ok(remote) => remote,
            Err(e) => {
                tracing::warn!(broadcast_id = %id, error = %e, "Viewer sample failed");
                return Ok(None);
            }
        };
        let Some(viewers) = remote.concurrent_viewers else {
            return Ok(None);
        };

        match self.store_viewers(id, viewers).await {
            Ok(()) => Ok(Some(viewers)),
            Err(e) => {
                tracing::warn!(broadcast_id = %id, error = %e, "Failed to store viewer sample");
                Ok(None)
            }
        }
    }

    async fn store_viewers(&self, id: &BroadcastId, viewers: u64) -> Result<()> {
        let _guard = self.locks.lock(id.as_str()).await;
        let mut broadcast = self.load(id).await?;
        // stopped while sampling
        if broadcast.status != BroadcastStatus::Live {
            return Ok(());
        }
        broadcast.viewer_count = Some(viewers);
        broadcast.updated_at = Utc::now();
        self.broadcasts.save(&broadcast).await
    }

    /// Non-terminal broadcasts, newest first, with a viewer sample for live ones.
    pub async fn list_active(&self) -> Result<Vec<ActiveBroadcast>> {
        let broadcasts = self.broadcasts.list_by_status(&BroadcastStatus::ACTIVE).await?;

        let mut active = Vec::with_capacity(broadcasts.len());
        for mut broadcast in broadcasts {
            let live_viewers = if broadcast.status == BroadcastStatus::Live {
                self.sample_live(&broadcast.id).await.unwrap_or(None)
            } else {
                None
            };
            if live_viewers.is_some() {
                broadcast.viewer_count = live_viewers;
            }
            active.push(ActiveBroadcast {
                broadcast,
                live_viewers,
            });
        }
        Ok(active)
    }

    /// Record an unrecoverable failure on a non-terminal broadcast.
    pub async fn mark_error(&self, id: &BroadcastId, message: &str) -> Result<Broadcast> {
        let _guard = self.locks.lock(id.as_str()).await;
        let mut broadcast = self.load(id).await?;

        broadcast
            .transition_to(BroadcastStatus::Error)
            .map_err(invalid_transition)?;
        broadcast.last_error = Some(message.to_string());
        self.broadcasts.save(&broadcast).await?;

        tracing::warn!(broadcast_id = %id, reason = message, "Broadcast marked as error");
        Ok(broadcast)
    }

    /// Record a failed passthrough relay in `last_error` without changing the status.
    ///
    /// Returns `None` for terminal broadcasts, which are left untouched.
    pub async fn record_relay_failure(
        &self,
        id: &BroadcastId,
        message: &str,
    ) -> Result<Option<Broadcast>> {
        let _guard = self.locks.lock(id.as_str()).await;
        let mut broadcast = self.load(id).await?;
        if broadcast.status.is_terminal() {
            return Ok(None);
        }

        broadcast.last_error = Some(message.to_string());
        broadcast.updated_at = Utc::now();
        self.broadcasts.save(&broadcast).await?;

        tracing::warn!(broadcast_id = %id, reason = message, "Relay failure recorded on broadcast");
        Ok(Some(broadcast))
    }

    /// Drop entity locks no task holds or waits on.
    pub fn prune_locks(&self) -> usize {
        self.locks.prune()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        repository::MemoryStore,
        test_helpers::{BroadcastFixture, FakePlatformClient},
    };
    use std::time::Duration;

    struct Harness {
        store: MemoryStore,
        platform: Arc<FakePlatformClient>,
        service: BroadcastService,
    }

    fn harness() -> Harness {
        let store = MemoryStore::new();
        let platform = Arc::new(FakePlatformClient::new());
        let service = BroadcastService::new(
            Arc::new(store.clone()),
            platform.clone(),
            LifecycleTimings::default(),
        );
        Harness {
            store,
            platform,
            service,
        }
    }

    async fn stored(store: &MemoryStore, id: &BroadcastId) -> Broadcast {
        BroadcastRepository::get(store, id).await.unwrap().unwrap()
    }

    async fn insert(store: &MemoryStore, status: BroadcastStatus) -> Broadcast {
        let broadcast = BroadcastFixture::new().with_status(status).build();
        BroadcastRepository::save(store, &broadcast).await.unwrap();
        broadcast
    }

    #[tokio::test]
    async fn test_schedule_persists_created_broadcast() {
        let h = harness();
        let request = ScheduleRequest {
            visibility: Visibility::Public,
            ..ScheduleRequest::new("Test")
        };

        let broadcast = h.service.schedule(request).await.unwrap();

        assert_eq!(broadcast.status, BroadcastStatus::Created);
        assert!(!broadcast.stream_key.is_empty());
        assert!(!broadcast.ingestion_address.is_empty());
        assert!(broadcast.actual_start_time.is_none());
        assert_eq!(
            h.platform.calls(),
            vec!["create_broadcast", "create_ingest_point", "bind"]
        );
        assert_eq!(stored(&h.store, &broadcast.id).await.stream_key, broadcast.stream_key);
        assert_eq!(h.platform.ingest_specs()[0].title, "Test - Stream");
    }

    #[tokio::test]
    async fn test_schedule_rejects_bad_input_before_remote_calls() {
        let h = harness();

        let err = h.service.schedule(ScheduleRequest::new("   ")).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        let err = h
            .service
            .schedule(ScheduleRequest::new("x".repeat(101)))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        let request = ScheduleRequest {
            tags: vec!["t".repeat(300), "u".repeat(300)],
            ..ScheduleRequest::new("Tagged")
        };
        assert!(matches!(
            h.service.schedule(request).await.unwrap_err(),
            Error::Validation(_)
        ));

        assert!(h.platform.calls().is_empty());
    }

    #[tokio::test]
    async fn test_schedule_bind_failure_persists_nothing() {
        let h = harness();
        h.platform.fail("bind", "Stream not found");

        let err = h.service.schedule(ScheduleRequest::new("Test")).await.unwrap_err();

        assert!(matches!(err, Error::Platform { operation: "bind", .. }));
        assert_eq!(h.store.broadcast_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_goes_live_after_delay() {
        let h = harness();
        let broadcast = insert(&h.store, BroadcastStatus::Created).await;

        let started = h.service.start(&broadcast.id).await.unwrap();
        assert_eq!(started.status, BroadcastStatus::Testing);
        assert_eq!(stored(&h.store, &broadcast.id).await.status, BroadcastStatus::Testing);

        tokio::time::sleep(Duration::from_secs(6)).await;

        let live = stored(&h.store, &broadcast.id).await;
        assert_eq!(live.status, BroadcastStatus::Live);
        assert!(live.actual_start_time.is_some());
        assert_eq!(
            h.platform.calls(),
            vec!["transition:testing", "transition:live"]
        );
    }

    #[tokio::test]
    async fn test_start_requires_created_or_ready() {
        let h = harness();
        for status in [
            BroadcastStatus::Testing,
            BroadcastStatus::Live,
            BroadcastStatus::Complete,
        ] {
            let broadcast = insert(&h.store, status).await;
            let err = h.service.start(&broadcast.id).await.unwrap_err();
            assert!(matches!(err, Error::Validation(_)), "{status}");
        }
        assert!(h.platform.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_during_delay_prevents_go_live() {
        let h = harness();
        let broadcast = insert(&h.store, BroadcastStatus::Ready).await;

        h.service.start(&broadcast.id).await.unwrap();
        h.service.stop(&broadcast.id).await.unwrap();
        tokio::time::sleep(Duration::from_secs(6)).await;

        assert_eq!(stored(&h.store, &broadcast.id).await.status, BroadcastStatus::Complete);
        assert_eq!(h.platform.call_count("transition:live"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_go_live_stays_testing_with_last_error() {
        let h = harness();
        h.platform.fail("transition:live", "Stream is inactive");
        let broadcast = insert(&h.store, BroadcastStatus::Created).await;

        h.service.start(&broadcast.id).await.unwrap();
        tokio::time::sleep(Duration::from_secs(6)).await;

        let after = stored(&h.store, &broadcast.id).await;
        assert_eq!(after.status, BroadcastStatus::Testing);
        assert!(after
            .last_error
            .as_deref()
            .is_some_and(|e| e.contains("Stream is inactive")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_remote_call_times_out() {
        let h = harness();
        h.platform.hang("transition:testing");
        let broadcast = insert(&h.store, BroadcastStatus::Created).await;

        let err = h.service.start(&broadcast.id).await.unwrap_err();

        assert!(matches!(err, Error::Platform { operation: "transition", .. }));
        assert!(err.to_string().contains("timed out"));
        assert_eq!(stored(&h.store, &broadcast.id).await.status, BroadcastStatus::Created);
    }

    #[tokio::test]
    async fn test_stop_created_broadcast_completes() {
        let h = harness();
        h.platform.set_recording_status("recorded");
        let broadcast = insert(&h.store, BroadcastStatus::Created).await;

        let outcome = h.service.stop(&broadcast.id).await.unwrap();

        assert_eq!(outcome.broadcast.status, BroadcastStatus::Complete);
        assert!(outcome.recording_available);
        let after = stored(&h.store, &broadcast.id).await;
        assert_eq!(after.status, BroadcastStatus::Complete);
        assert!(after.actual_end_time.is_some());
    }

    #[tokio::test]
    async fn test_stop_terminal_broadcast_is_rejected() {
        let h = harness();
        let broadcast = insert(&h.store, BroadcastStatus::Complete).await;

        assert!(matches!(
            h.service.stop(&broadcast.id).await.unwrap_err(),
            Error::Validation(_)
        ));
        assert!(matches!(
            h.service.stop(&BroadcastId::new()).await.unwrap_err(),
            Error::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_stop_remote_failure_leaves_status() {
        let h = harness();
        h.platform.fail("transition:complete", "Backend error");
        let broadcast = insert(&h.store, BroadcastStatus::Live).await;

        let err = h.service.stop(&broadcast.id).await.unwrap_err();

        assert!(matches!(err, Error::Platform { .. }));
        assert_eq!(stored(&h.store, &broadcast.id).await.status, BroadcastStatus::Live);
    }

    #[tokio::test]
    async fn test_sample_live_persists_viewers() {
        let h = harness();
        h.platform.set_viewers(42);
        let live = insert(&h.store, BroadcastStatus::Live).await;
        let testing = insert(&h.store, BroadcastStatus::Testing).await;

        assert_eq!(h.service.sample_live(&live.id).await.unwrap(), Some(42));
        assert_eq!(stored(&h.store, &live.id).await.viewer_count, Some(42));
        assert_eq!(h.service.sample_live(&testing.id).await.unwrap(), None);
        assert!(h.service.sample_live(&BroadcastId::new()).await.is_err());
    }

    #[tokio::test]
    async fn test_sample_live_remote_failure_is_none() {
        let h = harness();
        h.platform.set_viewers(7);
        h.platform.fail("get_broadcast", "quota exceeded");
        let live = insert(&h.store, BroadcastStatus::Live).await;

        assert_eq!(h.service.sample_live(&live.id).await.unwrap(), None);
        assert_eq!(stored(&h.store, &live.id).await.viewer_count, None);
    }

    #[tokio::test]
    async fn test_list_active_samples_live_only() {
        let h = harness();
        h.platform.set_viewers(5);
        insert(&h.store, BroadcastStatus::Created).await;
        insert(&h.store, BroadcastStatus::Live).await;
        insert(&h.store, BroadcastStatus::Complete).await;

        let active = h.service.list_active().await.unwrap();

        assert_eq!(active.len(), 2);
        for entry in &active {
            match entry.broadcast.status {
                BroadcastStatus::Live => assert_eq!(entry.live_viewers, Some(5)),
                _ => assert_eq!(entry.live_viewers, None),
            }
        }
        assert_eq!(h.platform.call_count("get_broadcast"), 1);
    }

    #[tokio::test]
    async fn test_mark_error_only_from_non_terminal() {
        let h = harness();
        let live = insert(&h.store, BroadcastStatus::Live).await;
        let done = insert(&h.store, BroadcastStatus::Complete).await;

        let errored = h.service.mark_error(&live.id, "encoder lost").await.unwrap();
        assert_eq!(errored.status, BroadcastStatus::Error);
        assert_eq!(errored.last_error.as_deref(), Some("encoder lost"));

        assert!(h.service.mark_error(&done.id, "late").await.is_err());
    }

    #[tokio::test]
    async fn test_record_relay_failure_keeps_status() {
        let h = harness();
        let testing = insert(&h.store, BroadcastStatus::Testing).await;
        let done = insert(&h.store, BroadcastStatus::Complete).await;

        let recorded = h
            .service
            .record_relay_failure(&testing.id, "relay exited with code 1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(recorded.status, BroadcastStatus::Testing);
        let after = stored(&h.store, &testing.id).await;
        assert_eq!(after.status, BroadcastStatus::Testing);
        assert_eq!(after.last_error.as_deref(), Some("relay exited with code 1"));

        assert!(h
            .service
            .record_relay_failure(&done.id, "late")
            .await
            .unwrap()
            .is_none());
        assert!(stored(&h.store, &done.id).await.last_error.is_none());
    }

    #[tokio::test]
    async fn test_prune_locks_reclaims_idle_entries() {
        let h = harness();
        let live = insert(&h.store, BroadcastStatus::Live).await;
        h.service.mark_error(&live.id, "gone").await.unwrap();

        assert_eq!(h.service.prune_locks(), 1);
        assert_eq!(h.service.prune_locks(), 0);
    }
}
