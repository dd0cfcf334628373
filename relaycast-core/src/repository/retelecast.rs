use async_trait::async_trait;
use sqlx::{postgres::PgRow, PgPool, Row};

use super::RetelecastRepository;
use crate::{
    models::{BroadcastId, Retelecast, RetelecastId},
    Error, Result,
};

const RETELECAST_COLUMNS: &str = "id, source_video_id, broadcast_id, loop_count, status, started_at, ended_at,
    error_message, created_at, updated_at";

/// Retelecast repository for database operations
#[derive(Clone)]
pub struct PgRetelecastRepository {
    pool: PgPool,
}

impl PgRetelecastRepository {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_retelecast(row: &PgRow) -> Result<Retelecast> {
        let status: String = row.try_get("status")?;
        let loop_count: i32 = row.try_get("loop_count")?;

        Ok(Retelecast {
            id: RetelecastId::from_string(row.try_get("id")?),
            source_video_id: row.try_get("source_video_id")?,
            broadcast_id: BroadcastId::from_string(row.try_get("broadcast_id")?),
            loop_count: u32::try_from(loop_count)
                .map_err(|_| Error::Internal(format!("Negative loop count: {loop_count}")))?,
            status: status.parse().map_err(Error::Internal)?,
            started_at: row.try_get("started_at")?,
            ended_at: row.try_get("ended_at")?,
            error_message: row.try_get("error_message")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[async_trait]
impl RetelecastRepository for PgRetelecastRepository {
    async fn save(&self, retelecast: &Retelecast) -> Result<()> {
        let loop_count = i32::try_from(retelecast.loop_count)
            .map_err(|_| Error::Validation(format!("Loop count too large: {}", retelecast.loop_count)))?;

        sqlx::query(
            "INSERT INTO retelecasts (id, source_video_id, broadcast_id, loop_count, status, started_at,
                ended_at, error_message, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
             ON CONFLICT (id) DO UPDATE SET
                loop_count = EXCLUDED.loop_count,
                status = EXCLUDED.status,
                started_at = EXCLUDED.started_at,
                ended_at = EXCLUDED.ended_at,
                error_message = EXCLUDED.error_message,
                updated_at = EXCLUDED.updated_at",
        )
        .bind(retelecast.id.as_str())
        .bind(&retelecast.source_video_id)
        .bind(retelecast.broadcast_id.as_str())
        .bind(loop_count)
        .bind(retelecast.status.as_str())
        .bind(retelecast.started_at)
        .bind(retelecast.ended_at)
        .bind(&retelecast.error_message)
        .bind(retelecast.created_at)
        .bind(retelecast.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, id: &RetelecastId) -> Result<Option<Retelecast>> {
        let row = sqlx::query(&format!(
            "SELECT {RETELECAST_COLUMNS} FROM retelecasts WHERE id = $1"
        ))
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_retelecast).transpose()
    }

    async fn find_by_broadcast_id(&self, broadcast_id: &BroadcastId) -> Result<Option<Retelecast>> {
        let row = sqlx::query(&format!(
            "SELECT {RETELECAST_COLUMNS} FROM retelecasts WHERE broadcast_id = $1"
        ))
        .bind(broadcast_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_retelecast).transpose()
    }

    async fn list_by_source_video_id(&self, video_id: &str) -> Result<Vec<Retelecast>> {
        let rows = sqlx::query(&format!(
            "SELECT {RETELECAST_COLUMNS} FROM retelecasts
             WHERE source_video_id = $1
             ORDER BY created_at DESC"
        ))
        .bind(video_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_retelecast).collect()
    }
}
