// Ingest endpoint wiring
//
// The ingest endpoint (RTMP server) calls a statically registered
// `IngestEventHandler` for each publishing session:
// - publish attempt: authorize the stream key, reject on deny
// - publish start:   relay the local feed to the broadcast's ingest point
// - publish end:     stop that relay
//
// Publisher URL scheme: rtmp://host/live/STREAM_KEY

use async_trait::async_trait;
use relaycast_core::{
    models::BroadcastStatus,
    repository::BroadcastRepository,
    service::{IngestAuthority, RelayControl, RelaySpec},
    Error,
};
use std::sync::Arc;

use crate::error::{IngestError, IngestResult};

#[async_trait]
pub trait IngestEventHandler: Send + Sync {
    /// Returning an error rejects the session.
    async fn on_publish_attempt(&self, stream_key: &str) -> IngestResult<()>;

    async fn on_publish_start(&self, stream_key: &str) -> IngestResult<()>;

    async fn on_publish_end(&self, stream_key: &str);
}

/// Last path segment of a stream path such as `/live/abc123`
#[must_use]
pub fn stream_key_from_path(stream_path: &str) -> Option<&str> {
    stream_path
        .rsplit('/')
        .next()
        .map(|key| key.split('?').next().unwrap_or(key))
        .filter(|key| !key.is_empty())
}

pub struct IngestGateway {
    authority: IngestAuthority,
    broadcasts: Arc<dyn BroadcastRepository>,
    relay: Arc<dyn RelayControl>,
    local_ingest_url: String,
}

impl IngestGateway {
    pub fn new(
        authority: IngestAuthority,
        broadcasts: Arc<dyn BroadcastRepository>,
        relay: Arc<dyn RelayControl>,
        local_ingest_url: &str,
    ) -> Self {
        Self {
            authority,
            broadcasts,
            relay,
            local_ingest_url: local_ingest_url.trim_end_matches('/').to_string(),
        }
    }

    fn local_source(&self, stream_key: &str) -> String {
        format!("{}/{stream_key}", self.local_ingest_url)
    }
}

#[async_trait]
impl IngestEventHandler for IngestGateway {
    async fn on_publish_attempt(&self, stream_key: &str) -> IngestResult<()> {
        if self.authority.authorize(stream_key).await.is_allowed() {
            Ok(())
        } else {
            Err(IngestError::Rejected)
        }
    }

    async fn on_publish_start(&self, stream_key: &str) -> IngestResult<()> {
        let broadcast = self
            .broadcasts
            .find_by_stream_key(stream_key, &BroadcastStatus::INGESTIBLE)
            .await?
            .ok_or(IngestError::Rejected)?;

        let destination = broadcast.ingest_url().ok_or_else(|| {
            Error::NotReady(format!("Broadcast {} has no ingestion address", broadcast.id))
        })?;

        match self
            .relay
            .start_relay(stream_key, RelaySpec::live(self.local_source(stream_key), destination))
            .await
        {
            Ok(()) => {
                tracing::info!(broadcast_id = %broadcast.id, "Relaying publisher to platform");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(broadcast_id = %broadcast.id, error = %e, "Failed to start relay");
                Err(e.into())
            }
        }
    }

    async fn on_publish_end(&self, stream_key: &str) {
        self.relay.stop_relay(stream_key).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_key_from_path() {
        assert_eq!(stream_key_from_path("/live/abc123"), Some("abc123"));
        assert_eq!(stream_key_from_path("live/abc123?sign=x"), Some("abc123"));
        assert_eq!(stream_key_from_path("abc123"), Some("abc123"));
        assert_eq!(stream_key_from_path("/live/"), None);
        assert_eq!(stream_key_from_path(""), None);
    }
}
