pub mod broadcast;
pub mod ingest;
pub mod locks;
pub mod relay;
pub mod retelecast;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::{
    config::Config,
    platform::PlatformResult,
    repository::{
        BroadcastRepository, MemoryStore, PgBroadcastRepository, PgRetelecastRepository,
        PgVodAssetRepository, RetelecastRepository, VodAssetRepository,
    },
    Error, Result,
};

pub use broadcast::{ActiveBroadcast, BroadcastService, ScheduleRequest, StopOutcome};
pub use ingest::{IngestAuthority, IngestDecision};
pub use locks::EntityLocks;
pub use relay::{RelayControl, RelayExit, RelayExitHandler, RelaySpec};
pub use retelecast::RetelecastService;

/// Deadlines and fixed delays used by the lifecycle controllers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifecycleTimings {
    /// Deadline for every remote platform call
    pub request_timeout: Duration,
    /// Wait between `testing` and the `live` transition
    pub go_live_delay: Duration,
    /// Wait before assuming a launched relay is streaming
    pub settle_delay: Duration,
}

impl LifecycleTimings {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            request_timeout: config.platform.request_timeout(),
            go_live_delay: config.lifecycle.go_live_delay(),
            settle_delay: config.lifecycle.settle_delay(),
        }
    }
}

impl Default for LifecycleTimings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// The three stores the services read and write
#[derive(Clone)]
pub struct Repositories {
    pub broadcasts: Arc<dyn BroadcastRepository>,
    pub assets: Arc<dyn VodAssetRepository>,
    pub retelecasts: Arc<dyn RetelecastRepository>,
}

impl Repositories {
    #[must_use]
    pub fn memory(store: &MemoryStore) -> Self {
        Self {
            broadcasts: Arc::new(store.clone()),
            assets: Arc::new(store.clone()),
            retelecasts: Arc::new(store.clone()),
        }
    }

    #[must_use]
    pub fn postgres(pool: &sqlx::PgPool) -> Self {
        Self {
            broadcasts: Arc::new(PgBroadcastRepository::new(pool.clone())),
            assets: Arc::new(PgVodAssetRepository::new(pool.clone())),
            retelecasts: Arc::new(PgRetelecastRepository::new(pool.clone())),
        }
    }
}

/// Run a remote platform call under `deadline`.
///
/// Failures and timeouts both surface as `Error::Platform` tagged with `operation`.
pub(crate) async fn with_deadline<T, F>(
    deadline: Duration,
    operation: &'static str,
    call: F,
) -> Result<T>
where
    F: Future<Output = PlatformResult<T>>,
{
    match tokio::time::timeout(deadline, call).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(Error::platform(operation, e)),
        Err(_) => Err(Error::platform(
            operation,
            format!("timed out after {}ms", deadline.as_millis()),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::PlatformClientError;

    #[tokio::test(start_paused = true)]
    async fn test_with_deadline_maps_timeout_to_platform_error() {
        let err = with_deadline::<(), _>(
            Duration::from_secs(15),
            "transition",
            std::future::pending(),
        )
        .await
        .unwrap_err();

        assert_eq!(
            err.to_string(),
            "Platform error during transition: timed out after 15000ms"
        );
    }

    #[tokio::test]
    async fn test_with_deadline_maps_client_error() {
        let err = with_deadline::<(), _>(Duration::from_secs(1), "bind", async {
            Err(PlatformClientError::NotFound("broadcast b1".to_string()))
        })
        .await
        .unwrap_err();

        assert!(matches!(err, Error::Platform { operation: "bind", .. }));
    }

    #[test]
    fn test_timings_follow_config() {
        let mut config = Config::default();
        config.lifecycle.go_live_delay_ms = 250;
        let timings = LifecycleTimings::from_config(&config);
        assert_eq!(timings.go_live_delay, Duration::from_millis(250));
        assert_eq!(timings.request_timeout, Duration::from_secs(15));
    }
}
