//! Persistence interfaces
//!
//! Services depend only on these traits. Saves are whole-record upserts with
//! single-record atomicity; no cross-record transactions are assumed.

pub mod broadcast;
pub mod memory;
pub mod retelecast;
pub mod vod_asset;

use async_trait::async_trait;

use crate::{
    models::{Broadcast, BroadcastId, BroadcastStatus, Retelecast, RetelecastId, VodAsset},
    Result,
};

pub use broadcast::PgBroadcastRepository;
pub use memory::MemoryStore;
pub use retelecast::PgRetelecastRepository;
pub use vod_asset::PgVodAssetRepository;

#[async_trait]
pub trait BroadcastRepository: Send + Sync {
    /// Insert or replace the whole record.
    ///
    /// Fails with `Conflict` if another non-terminal broadcast already holds the stream key.
    async fn save(&self, broadcast: &Broadcast) -> Result<()>;

    async fn get(&self, id: &BroadcastId) -> Result<Option<Broadcast>>;

    /// Find the broadcast bound to `stream_key` whose status is one of `statuses`.
    async fn find_by_stream_key(
        &self,
        stream_key: &str,
        statuses: &[BroadcastStatus],
    ) -> Result<Option<Broadcast>>;

    /// All broadcasts in any of `statuses`, newest first.
    async fn list_by_status(&self, statuses: &[BroadcastStatus]) -> Result<Vec<Broadcast>>;
}

#[async_trait]
pub trait VodAssetRepository: Send + Sync {
    async fn save(&self, asset: &VodAsset) -> Result<()>;

    async fn get_by_video_id(&self, video_id: &str) -> Result<Option<VodAsset>>;
}

#[async_trait]
pub trait RetelecastRepository: Send + Sync {
    async fn save(&self, retelecast: &Retelecast) -> Result<()>;

    async fn get(&self, id: &RetelecastId) -> Result<Option<Retelecast>>;

    async fn find_by_broadcast_id(&self, broadcast_id: &BroadcastId) -> Result<Option<Retelecast>>;

    async fn list_by_source_video_id(&self, video_id: &str) -> Result<Vec<Retelecast>>;
}

pub(crate) fn status_strings(statuses: &[BroadcastStatus]) -> Vec<String> {
    statuses.iter().map(|s| s.as_str().to_string()).collect()
}
