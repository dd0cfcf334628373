use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::id::{BroadcastId, RetelecastId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RetelecastStatus {
    #[default]
    Created,
    Starting,
    Streaming,
    Completed,
    Error,
    Stopped,
}

impl RetelecastStatus {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Starting => "starting",
            Self::Streaming => "streaming",
            Self::Completed => "completed",
            Self::Error => "error",
            Self::Stopped => "stopped",
        }
    }

    #[must_use]
    pub const fn is_finished(&self) -> bool {
        matches!(self, Self::Completed | Self::Error | Self::Stopped)
    }
}

impl FromStr for RetelecastStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" => Ok(Self::Created),
            "starting" => Ok(Self::Starting),
            "streaming" => Ok(Self::Streaming),
            "completed" => Ok(Self::Completed),
            "error" => Ok(Self::Error),
            "stopped" => Ok(Self::Stopped),
            _ => Err(format!("Unknown retelecast status: {s}")),
        }
    }
}

impl std::fmt::Display for RetelecastStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored asset replayed as a new live broadcast via a looping relay
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Retelecast {
    pub id: RetelecastId,
    /// Remote video id of the source VOD asset
    pub source_video_id: String,
    /// Destination broadcast
    pub broadcast_id: BroadcastId,
    pub loop_count: u32,
    pub status: RetelecastStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Retelecast {
    #[must_use]
    pub fn new(source_video_id: String, broadcast_id: BroadcastId, loop_count: u32) -> Self {
        let now = Utc::now();
        Self {
            id: RetelecastId::new(),
            source_video_id,
            broadcast_id,
            loop_count,
            status: RetelecastStatus::Created,
            started_at: None,
            ended_at: None,
            error_message: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn set_status(&mut self, status: RetelecastStatus) {
        self.status = status;
        self.updated_at = Utc::now();
    }
}
