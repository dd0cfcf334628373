use std::sync::Arc;

use crate::{models::BroadcastStatus, repository::BroadcastRepository};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestDecision {
    Allow,
    Deny,
}

impl IngestDecision {
    #[must_use]
    pub const fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }
}

/// Decides whether a publisher may push under a stream key
///
/// Fails closed: anything short of a matching ingestible broadcast denies.
#[derive(Clone)]
pub struct IngestAuthority {
    broadcasts: Arc<dyn BroadcastRepository>,
}

impl std::fmt::Debug for IngestAuthority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IngestAuthority").finish_non_exhaustive()
    }
}

impl IngestAuthority {
    pub fn new(broadcasts: Arc<dyn BroadcastRepository>) -> Self {
        Self { broadcasts }
    }

    pub async fn authorize(&self, stream_key: &str) -> IngestDecision {
        if stream_key.is_empty() {
            tracing::debug!("Rejected publish with empty stream key");
            return IngestDecision::Deny;
        }

        match self
            .broadcasts
            .find_by_stream_key(stream_key, &BroadcastStatus::INGESTIBLE)
            .await
        {
            Ok(Some(broadcast)) => {
                tracing::info!(
                    broadcast_id = %broadcast.id,
                    status = %broadcast.status,
                    "Publish authorized"
                );
                IngestDecision::Allow
            }
            Ok(None) => {
                tracing::info!("Rejected publish: no ingestible broadcast for stream key");
                IngestDecision::Deny
            }
            Err(e) => {
                tracing::warn!(error = %e, "Rejected publish: broadcast lookup failed");
                IngestDecision::Deny
            }
        }
    }
}
