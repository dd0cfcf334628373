use async_trait::async_trait;
use sqlx::{postgres::PgRow, PgPool, Row};

use super::{status_strings, BroadcastRepository};
use crate::{
    models::{Broadcast, BroadcastId, BroadcastStatus},
    Error, Result,
};

const BROADCAST_COLUMNS: &str = "id, remote_broadcast_id, remote_stream_id, title, description, visibility, latency,
    category, tags, thumbnail_url, stream_key, ingestion_address, status, scheduled_start_time,
    actual_start_time, actual_end_time, viewer_count, recording_available, last_error, created_at, updated_at";

/// Broadcast repository for database operations
#[derive(Clone)]
pub struct PgBroadcastRepository {
    pool: PgPool,
}

impl PgBroadcastRepository {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_broadcast(row: &PgRow) -> Result<Broadcast> {
        let status: String = row.try_get("status")?;
        let visibility: String = row.try_get("visibility")?;
        let latency: String = row.try_get("latency")?;
        let viewer_count: Option<i64> = row.try_get("viewer_count")?;

        Ok(Broadcast {
            id: BroadcastId::from_string(row.try_get("id")?),
            remote_broadcast_id: row.try_get("remote_broadcast_id")?,
            remote_stream_id: row.try_get("remote_stream_id")?,
            title: row.try_get("title")?,
            description: row.try_get("description")?,
            visibility: visibility.parse().map_err(Error::Internal)?,
            latency: latency.parse().map_err(Error::Internal)?,
            category: row.try_get("category")?,
            tags: row.try_get("tags")?,
            thumbnail_url: row.try_get("thumbnail_url")?,
            stream_key: row.try_get("stream_key")?,
            ingestion_address: row.try_get("ingestion_address")?,
            status: status.parse().map_err(Error::Internal)?,
            scheduled_start_time: row.try_get("scheduled_start_time")?,
            actual_start_time: row.try_get("actual_start_time")?,
            actual_end_time: row.try_get("actual_end_time")?,
            viewer_count: viewer_count.and_then(|v| u64::try_from(v).ok()),
            recording_available: row.try_get("recording_available")?,
            last_error: row.try_get("last_error")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[async_trait]
impl BroadcastRepository for PgBroadcastRepository {
    /// Stream key uniqueness among non-terminal rows is enforced by a partial
    /// unique index; violations surface as `Conflict`.
    async fn save(&self, broadcast: &Broadcast) -> Result<()> {
        sqlx::query(
            "INSERT INTO broadcasts (id, remote_broadcast_id, remote_stream_id, title, description, visibility,
                latency, category, tags, thumbnail_url, stream_key, ingestion_address, status,
                scheduled_start_time, actual_start_time, actual_end_time, viewer_count,
                recording_available, last_error, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20, $21)
             ON CONFLICT (id) DO UPDATE SET
                title = EXCLUDED.title,
                description = EXCLUDED.description,
                visibility = EXCLUDED.visibility,
                latency = EXCLUDED.latency,
                category = EXCLUDED.category,
                tags = EXCLUDED.tags,
                thumbnail_url = EXCLUDED.thumbnail_url,
                stream_key = EXCLUDED.stream_key,
                ingestion_address = EXCLUDED.ingestion_address,
                status = EXCLUDED.status,
                scheduled_start_time = EXCLUDED.scheduled_start_time,
                actual_start_time = EXCLUDED.actual_start_time,
                actual_end_time = EXCLUDED.actual_end_time,
                viewer_count = EXCLUDED.viewer_count,
                recording_available = EXCLUDED.recording_available,
                last_error = EXCLUDED.last_error,
                updated_at = EXCLUDED.updated_at",
        )
        .bind(broadcast.id.as_str())
        .bind(&broadcast.remote_broadcast_id)
        .bind(&broadcast.remote_stream_id)
        .bind(&broadcast.title)
        .bind(&broadcast.description)
        .bind(broadcast.visibility.as_str())
        .bind(broadcast.latency.as_str())
        .bind(&broadcast.category)
        .bind(&broadcast.tags)
        .bind(&broadcast.thumbnail_url)
        .bind(&broadcast.stream_key)
        .bind(&broadcast.ingestion_address)
        .bind(broadcast.status.as_str())
        .bind(broadcast.scheduled_start_time)
        .bind(broadcast.actual_start_time)
        .bind(broadcast.actual_end_time)
        .bind(broadcast.viewer_count.and_then(|v| i64::try_from(v).ok()))
        .bind(broadcast.recording_available)
        .bind(&broadcast.last_error)
        .bind(broadcast.created_at)
        .bind(broadcast.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, id: &BroadcastId) -> Result<Option<Broadcast>> {
        let row = sqlx::query(&format!(
            "SELECT {BROADCAST_COLUMNS} FROM broadcasts WHERE id = $1"
        ))
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_broadcast).transpose()
    }

    async fn find_by_stream_key(
        &self,
        stream_key: &str,
        statuses: &[BroadcastStatus],
    ) -> Result<Option<Broadcast>> {
        let row = sqlx::query(&format!(
            "SELECT {BROADCAST_COLUMNS} FROM broadcasts
             WHERE stream_key = $1 AND status = ANY($2)
             ORDER BY created_at DESC
             LIMIT 1"
        ))
        .bind(stream_key)
        .bind(status_strings(statuses))
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_broadcast).transpose()
    }

    async fn list_by_status(&self, statuses: &[BroadcastStatus]) -> Result<Vec<Broadcast>> {
        let rows = sqlx::query(&format!(
            "SELECT {BROADCAST_COLUMNS} FROM broadcasts
             WHERE status = ANY($1)
             ORDER BY created_at DESC"
        ))
        .bind(status_strings(statuses))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_broadcast).collect()
    }
}
