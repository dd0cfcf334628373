use async_trait::async_trait;
use sqlx::{postgres::PgRow, PgPool, Row};

use super::VodAssetRepository;
use crate::{
    models::{VodAsset, VodAssetId},
    Error, Result,
};

/// VOD asset repository for database operations
#[derive(Clone)]
pub struct PgVodAssetRepository {
    pool: PgPool,
}

impl PgVodAssetRepository {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_asset(row: &PgRow) -> Result<VodAsset> {
        let status: String = row.try_get("status")?;

        Ok(VodAsset {
            id: VodAssetId::from_string(row.try_get("id")?),
            video_id: row.try_get("video_id")?,
            title: row.try_get("title")?,
            description: row.try_get("description")?,
            duration_secs: row.try_get("duration_secs")?,
            storage_location: row.try_get("storage_location")?,
            file_size: row.try_get("file_size")?,
            format: row.try_get("format")?,
            quality: row.try_get("quality")?,
            status: status.parse().map_err(Error::Internal)?,
            download_count: row.try_get("download_count")?,
            expires_at: row.try_get("expires_at")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[async_trait]
impl VodAssetRepository for PgVodAssetRepository {
    async fn save(&self, asset: &VodAsset) -> Result<()> {
        sqlx::query(
            "INSERT INTO vod_assets (id, video_id, title, description, duration_secs, storage_location,
                file_size, format, quality, status, download_count, expires_at, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
             ON CONFLICT (video_id) DO UPDATE SET
                title = EXCLUDED.title,
                description = EXCLUDED.description,
                duration_secs = EXCLUDED.duration_secs,
                storage_location = EXCLUDED.storage_location,
                file_size = EXCLUDED.file_size,
                format = EXCLUDED.format,
                quality = EXCLUDED.quality,
                status = EXCLUDED.status,
                download_count = EXCLUDED.download_count,
                expires_at = EXCLUDED.expires_at,
                updated_at = EXCLUDED.updated_at",
        )
        .bind(asset.id.as_str())
        .bind(&asset.video_id)
        .bind(&asset.title)
        .bind(&asset.description)
        .bind(asset.duration_secs)
        .bind(&asset.storage_location)
        .bind(asset.file_size)
        .bind(&asset.format)
        .bind(&asset.quality)
        .bind(asset.status.as_str())
        .bind(asset.download_count)
        .bind(asset.expires_at)
        .bind(asset.created_at)
        .bind(asset.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_by_video_id(&self, video_id: &str) -> Result<Option<VodAsset>> {
        let row = sqlx::query(
            "SELECT id, video_id, title, description, duration_secs, storage_location, file_size,
                    format, quality, status, download_count, expires_at, created_at, updated_at
             FROM vod_assets
             WHERE video_id = $1",
        )
        .bind(video_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_asset).transpose()
    }
}
