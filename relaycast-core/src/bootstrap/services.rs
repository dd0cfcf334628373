//! Service construction and dependency wiring

use std::sync::Arc;

use crate::{
    media_store::LocalMediaStore,
    platform::{AccessTokenSource, PlatformClient, YouTubeClient},
    service::{
        BroadcastService, IngestAuthority, LifecycleTimings, RelayControl, Repositories,
        RetelecastService,
    },
    Config,
};

/// Every service a host process needs, sharing one set of stores
#[derive(Clone, Debug)]
pub struct Services {
    pub ingest_authority: IngestAuthority,
    pub broadcasts: BroadcastService,
    pub retelecasts: RetelecastService,
}

/// Build the YouTube client and the services on top of `repositories`.
///
/// `relay` is usually the livestream crate's supervisor, created first so its
/// exit stream can be dispatched to `Services::retelecasts`.
pub fn init_services(
    config: &Config,
    repositories: &Repositories,
    tokens: Arc<dyn AccessTokenSource>,
    relay: Arc<dyn RelayControl>,
) -> anyhow::Result<Services> {
    let platform: Arc<dyn PlatformClient> = Arc::new(
        YouTubeClient::new(&config.platform, tokens)
            .map_err(|e| anyhow::anyhow!("Failed to build platform client: {e}"))?,
    );
    Ok(build_services(config, repositories, platform, relay))
}

/// Build the services around an existing platform client.
pub fn build_services(
    config: &Config,
    repositories: &Repositories,
    platform: Arc<dyn PlatformClient>,
    relay: Arc<dyn RelayControl>,
) -> Services {
    let timings = LifecycleTimings::from_config(config);
    let broadcasts = BroadcastService::new(Arc::clone(&repositories.broadcasts), platform, timings);
    let retelecasts = RetelecastService::new(
        repositories,
        broadcasts.clone(),
        Arc::new(LocalMediaStore::new(&config.media.root)),
        relay,
    );

    tracing::info!(
        go_live_delay_ms = config.lifecycle.go_live_delay_ms,
        settle_delay_ms = config.lifecycle.settle_delay_ms,
        "Services initialized"
    );

    Services {
        ingest_authority: IngestAuthority::new(Arc::clone(&repositories.broadcasts)),
        broadcasts,
        retelecasts,
    }
}
