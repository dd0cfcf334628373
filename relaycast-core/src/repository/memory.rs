// In-memory store for tests and single-node development

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;

use super::{BroadcastRepository, RetelecastRepository, VodAssetRepository};
use crate::{
    models::{Broadcast, BroadcastId, BroadcastStatus, Retelecast, RetelecastId, VodAsset},
    Error, Result,
};

/// Implements every repository trait over concurrent maps.
///
/// Cloning shares the underlying maps.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    broadcasts: Arc<DashMap<BroadcastId, Broadcast>>,
    assets: Arc<DashMap<String, VodAsset>>,
    retelecasts: Arc<DashMap<RetelecastId, Retelecast>>,
    // Serializes broadcast saves so the stream key uniqueness check and the insert are atomic
    broadcast_write: Arc<parking_lot::Mutex<()>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn broadcast_count(&self) -> usize {
        self.broadcasts.len()
    }

    #[must_use]
    pub fn retelecast_count(&self) -> usize {
        self.retelecasts.len()
    }
}

#[async_trait]
impl BroadcastRepository for MemoryStore {
    async fn save(&self, broadcast: &Broadcast) -> Result<()> {
        let _guard = self.broadcast_write.lock();

        if broadcast.is_active() && !broadcast.stream_key.is_empty() {
            let taken = self.broadcasts.iter().any(|entry| {
                entry.id != broadcast.id
                    && entry.is_active()
                    && entry.stream_key == broadcast.stream_key
            });
            if taken {
                return Err(Error::Conflict(format!(
                    "Stream key already bound to an active broadcast: {}",
                    broadcast.stream_key
                )));
            }
        }

        self.broadcasts.insert(broadcast.id.clone(), broadcast.clone());
        Ok(())
    }

    async fn get(&self, id: &BroadcastId) -> Result<Option<Broadcast>> {
        Ok(self.broadcasts.get(id).map(|b| b.clone()))
    }

    async fn find_by_stream_key(
        &self,
        stream_key: &str,
        statuses: &[BroadcastStatus],
    ) -> Result<Option<Broadcast>> {
        Ok(self
            .broadcasts
            .iter()
            .filter(|b| b.stream_key == stream_key && statuses.contains(&b.status))
            .max_by_key(|b| b.created_at)
            .map(|b| b.clone()))
    }

    async fn list_by_status(&self, statuses: &[BroadcastStatus]) -> Result<Vec<Broadcast>> {
        let mut found: Vec<Broadcast> = self
            .broadcasts
            .iter()
            .filter(|b| statuses.contains(&b.status))
            .map(|b| b.clone())
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(found)
    }
}

#[async_trait]
impl VodAssetRepository for MemoryStore {
    async fn save(&self, asset: &VodAsset) -> Result<()> {
        self.assets.insert(asset.video_id.clone(), asset.clone());
        Ok(())
    }

    async fn get_by_video_id(&self, video_id: &str) -> Result<Option<VodAsset>> {
        Ok(self.assets.get(video_id).map(|a| a.clone()))
    }
}

#[async_trait]
impl RetelecastRepository for MemoryStore {
    async fn save(&self, retelecast: &Retelecast) -> Result<()> {
        self.retelecasts
            .insert(retelecast.id.clone(), retelecast.clone());
        Ok(())
    }

    async fn get(&self, id: &RetelecastId) -> Result<Option<Retelecast>> {
        Ok(self.retelecasts.get(id).map(|r| r.clone()))
    }

    async fn find_by_broadcast_id(&self, broadcast_id: &BroadcastId) -> Result<Option<Retelecast>> {
        Ok(self
            .retelecasts
            .iter()
            .find(|r| &r.broadcast_id == broadcast_id)
            .map(|r| r.clone()))
    }

    async fn list_by_source_video_id(&self, video_id: &str) -> Result<Vec<Retelecast>> {
        let mut found: Vec<Retelecast> = self
            .retelecasts
            .iter()
            .filter(|r| r.source_video_id == video_id)
            .map(|r| r.clone())
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::BroadcastFixture;

    #[tokio::test]
    async fn test_stream_key_unique_among_active_broadcasts() {
        let store = MemoryStore::new();
        let first = BroadcastFixture::new().with_stream_key("key-1").build();
        BroadcastRepository::save(&store, &first).await.unwrap();

        let second = BroadcastFixture::new().with_stream_key("key-1").build();
        let err = BroadcastRepository::save(&store, &second).await.unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
        assert_eq!(store.broadcast_count(), 1);
    }

    #[tokio::test]
    async fn test_stream_key_reusable_after_terminal() {
        let store = MemoryStore::new();
        let done = BroadcastFixture::new()
            .with_stream_key("key-1")
            .with_status(BroadcastStatus::Complete)
            .build();
        BroadcastRepository::save(&store, &done).await.unwrap();

        let fresh = BroadcastFixture::new().with_stream_key("key-1").build();
        BroadcastRepository::save(&store, &fresh).await.unwrap();

        let found = store
            .find_by_stream_key("key-1", &BroadcastStatus::INGESTIBLE)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, fresh.id);
    }

    #[tokio::test]
    async fn test_resave_same_broadcast_is_not_a_conflict() {
        let store = MemoryStore::new();
        let mut broadcast = BroadcastFixture::new().with_stream_key("key-1").build();
        BroadcastRepository::save(&store, &broadcast).await.unwrap();

        broadcast.transition_to(BroadcastStatus::Testing).unwrap();
        BroadcastRepository::save(&store, &broadcast).await.unwrap();

        let stored = BroadcastRepository::get(&store, &broadcast.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, BroadcastStatus::Testing);
    }
}
