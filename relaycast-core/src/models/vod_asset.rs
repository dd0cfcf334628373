use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::id::VodAssetId;

/// Download pipeline status of a VOD asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum VodAssetStatus {
    #[default]
    Pending,
    Downloading,
    Processing,
    Ready,
    Error,
    Expired,
}

impl VodAssetStatus {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Downloading => "downloading",
            Self::Processing => "processing",
            Self::Ready => "ready",
            Self::Error => "error",
            Self::Expired => "expired",
        }
    }
}

impl FromStr for VodAssetStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "downloading" => Ok(Self::Downloading),
            "processing" => Ok(Self::Processing),
            "ready" => Ok(Self::Ready),
            "error" => Ok(Self::Error),
            "expired" => Ok(Self::Expired),
            _ => Err(format!("Unknown VOD asset status: {s}")),
        }
    }
}

impl std::fmt::Display for VodAssetStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Locally stored copy of previously published media
///
/// Owned by the external download pipeline; the retelecast controller
/// only reads `storage_location` and `status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VodAsset {
    pub id: VodAssetId,
    /// Remote video identifier (unique)
    pub video_id: String,
    pub title: String,
    pub description: Option<String>,
    pub duration_secs: Option<i64>,
    pub storage_location: Option<String>,
    pub file_size: Option<i64>,
    pub format: String,
    pub quality: String,
    pub status: VodAssetStatus,
    pub download_count: i32,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl VodAsset {
    /// Placeholder row for a video the download pipeline has not fetched yet
    #[must_use]
    pub fn pending(video_id: String, title: String) -> Self {
        let now = Utc::now();
        Self {
            id: VodAssetId::new(),
            video_id,
            title,
            description: None,
            duration_secs: None,
            storage_location: None,
            file_size: None,
            format: "mp4".to_string(),
            quality: "720p".to_string(),
            status: VodAssetStatus::Pending,
            download_count: 0,
            expires_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Ready with a non-empty storage location
    #[must_use]
    pub fn is_streamable(&self) -> bool {
        self.status == VodAssetStatus::Ready
            && self
                .storage_location
                .as_deref()
                .is_some_and(|loc| !loc.trim().is_empty())
    }
}
