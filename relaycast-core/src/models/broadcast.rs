use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::id::BroadcastId;

/// Broadcast status, mirrored from the remote platform
///
/// Moves forward only (`created → ready → testing → live → complete`);
/// `error` is reachable from any non-terminal state. Terminal states are final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BroadcastStatus {
    #[default]
    Created,
    Ready,
    Testing,
    Live,
    Complete,
    Error,
}

impl BroadcastStatus {
    /// Statuses under which an ingest publish attempt is accepted
    pub const INGESTIBLE: [Self; 3] = [Self::Created, Self::Ready, Self::Testing];

    /// Every status that is not terminal
    pub const ACTIVE: [Self; 4] = [Self::Created, Self::Ready, Self::Testing, Self::Live];

    pub const ALL: [Self; 6] = [
        Self::Created,
        Self::Ready,
        Self::Testing,
        Self::Live,
        Self::Complete,
        Self::Error,
    ];

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Ready => "ready",
            Self::Testing => "testing",
            Self::Live => "live",
            Self::Complete => "complete",
            Self::Error => "error",
        }
    }

    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Error)
    }

    const fn rank(self) -> u8 {
        match self {
            Self::Created => 0,
            Self::Ready => 1,
            Self::Testing => 2,
            Self::Live => 3,
            Self::Complete => 4,
            Self::Error => 5,
        }
    }

    /// Whether moving from `self` to `next` respects the forward-only order.
    #[must_use]
    pub const fn can_transition_to(&self, next: Self) -> bool {
        if self.is_terminal() {
            return false;
        }
        match next {
            Self::Error => true,
            _ => next.rank() > self.rank(),
        }
    }
}

impl FromStr for BroadcastStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" => Ok(Self::Created),
            "ready" => Ok(Self::Ready),
            "testing" => Ok(Self::Testing),
            "live" => Ok(Self::Live),
            "complete" => Ok(Self::Complete),
            "error" => Ok(Self::Error),
            _ => Err(format!("Unknown broadcast status: {s}")),
        }
    }
}

impl std::fmt::Display for BroadcastStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    #[default]
    Public,
    Unlisted,
    Private,
}

impl Visibility {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Unlisted => "unlisted",
            Self::Private => "private",
        }
    }
}

impl FromStr for Visibility {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "public" => Ok(Self::Public),
            "unlisted" => Ok(Self::Unlisted),
            "private" => Ok(Self::Private),
            _ => Err(format!("Unknown visibility: {s}")),
        }
    }
}

/// Latency preference requested from the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum LatencyPreference {
    #[default]
    Normal,
    Low,
    UltraLow,
}

impl LatencyPreference {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Low => "low",
            Self::UltraLow => "ultraLow",
        }
    }
}

impl FromStr for LatencyPreference {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "normal" => Ok(Self::Normal),
            "low" => Ok(Self::Low),
            "ultraLow" | "ultra_low" => Ok(Self::UltraLow),
            _ => Err(format!("Unknown latency preference: {s}")),
        }
    }
}

/// A scheduled or live remote viewing session plus its ingest point
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Broadcast {
    pub id: BroadcastId,
    pub remote_broadcast_id: String,
    pub remote_stream_id: String,
    pub title: String,
    pub description: Option<String>,
    pub visibility: Visibility,
    pub latency: LatencyPreference,
    pub category: Option<String>,
    pub tags: Vec<String>,
    pub thumbnail_url: Option<String>,
    pub stream_key: String,
    pub ingestion_address: String,
    pub status: BroadcastStatus,
    pub scheduled_start_time: Option<DateTime<Utc>>,
    pub actual_start_time: Option<DateTime<Utc>>,
    pub actual_end_time: Option<DateTime<Utc>>,
    /// Last sampled concurrent viewer count
    pub viewer_count: Option<u64>,
    pub recording_available: bool,
    /// Cause of the last failed asynchronous transition
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Broadcast {
    /// Move to `next`, stamping `updated_at`.
    ///
    /// Returns the rejected pair when the move would go backwards or leave a terminal state.
    pub fn transition_to(
        &mut self,
        next: BroadcastStatus,
    ) -> Result<(), (BroadcastStatus, BroadcastStatus)> {
        if !self.status.can_transition_to(next) {
            return Err((self.status, next));
        }
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Full publish URL of the destination ingest point
    #[must_use]
    pub fn ingest_url(&self) -> Option<String> {
        if self.ingestion_address.trim().is_empty() || self.stream_key.is_empty() {
            return None;
        }
        Some(format!(
            "{}/{}",
            self.ingestion_address.trim_end_matches('/'),
            self.stream_key
        ))
    }

    #[must_use]
    pub const fn is_active(&self) -> bool {
        !self.status.is_terminal()
    }
}
