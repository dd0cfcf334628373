// Process-level wiring
//
// The supervisor is created first so its exit stream exists before the
// retelecast controller that consumes it; the dispatcher then closes the loop.

use relaycast_core::{
    bootstrap::{init_services, Services},
    platform::AccessTokenSource,
    service::{RelayControl, RelayExit, RelayExitHandler, Repositories},
    Config,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::{
    ingest::IngestGateway,
    relay::{spawn_exit_dispatcher, RelaySupervisor},
};

pub struct RelayRuntime {
    pub supervisor: Arc<RelaySupervisor>,
    pub gateway: Arc<IngestGateway>,
    pub services: Services,
    shutdown: CancellationToken,
    dispatcher: JoinHandle<()>,
    pruner: JoinHandle<()>,
}

impl std::fmt::Debug for RelayRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayRuntime")
            .field("supervisor", &self.supervisor)
            .finish_non_exhaustive()
    }
}

impl RelayRuntime {
    /// Build the supervisor, the core services and the ingest gateway, and start exit dispatch.
    ///
    /// Must be called inside a tokio runtime.
    pub fn start(
        config: &Config,
        repositories: &Repositories,
        tokens: Arc<dyn AccessTokenSource>,
    ) -> anyhow::Result<Self> {
        let (supervisor, exits) = RelaySupervisor::new(&config.relay);
        let supervisor = Arc::new(supervisor);
        let relay: Arc<dyn RelayControl> = supervisor.clone();

        let services = init_services(config, repositories, tokens, Arc::clone(&relay))?;
        Ok(Self::assemble(config, repositories, supervisor, exits, services))
    }

    /// Wire already-built services to a supervisor.
    pub fn assemble(
        config: &Config,
        repositories: &Repositories,
        supervisor: Arc<RelaySupervisor>,
        exits: mpsc::UnboundedReceiver<RelayExit>,
        services: Services,
    ) -> Self {
        let shutdown = CancellationToken::new();
        let handler: Arc<dyn RelayExitHandler> = Arc::new(services.retelecasts.clone());
        let dispatcher = spawn_exit_dispatcher(exits, handler, shutdown.child_token());
        let pruner = spawn_lock_pruner(
            services.clone(),
            config.lifecycle.lock_prune_interval(),
            shutdown.child_token(),
        );

        let relay: Arc<dyn RelayControl> = supervisor.clone();
        let gateway = Arc::new(IngestGateway::new(
            services.ingest_authority.clone(),
            Arc::clone(&repositories.broadcasts),
            relay,
            &config.relay.local_ingest_url,
        ));

        info!(ffmpeg = %config.relay.ffmpeg_path, "Relay runtime started");

        Self {
            supervisor,
            gateway,
            services,
            shutdown,
            dispatcher,
            pruner,
        }
    }

    /// Stop every relay and the exit dispatcher.
    pub async fn shutdown(self) {
        let stopped = self.supervisor.shutdown();
        self.shutdown.cancel();
        if let Err(e) = self.dispatcher.await {
            tracing::warn!(error = %e, "Exit dispatcher ended abnormally");
        }
        if let Err(e) = self.pruner.await {
            tracing::warn!(error = %e, "Lock pruner ended abnormally");
        }
        info!(stopped, "Relay runtime stopped");
    }
}

/// Periodically reclaim idle per-entity locks of the lifecycle controllers.
pub fn spawn_lock_pruner(
    services: Services,
    every: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    let every = every.max(Duration::from_millis(1));
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        // the first tick fires immediately
        interval.tick().await;
        loop {
            tokio::select! {
                () = shutdown.cancelled() => break,
                _ = interval.tick() => {
                    let pruned = services.broadcasts.prune_locks() + services.retelecasts.prune_locks();
                    if pruned > 0 {
                        debug!(pruned, "Reclaimed idle entity locks");
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use relaycast_core::{
        bootstrap::build_services,
        models::BroadcastStatus,
        repository::{BroadcastRepository, MemoryStore},
        test_helpers::{BroadcastFixture, FakePlatformClient, FakeRelayControl},
    };

    #[tokio::test(start_paused = true)]
    async fn test_lock_pruner_reclaims_idle_locks_until_cancelled() {
        let config = Config::default();
        let repos = Repositories::memory(&MemoryStore::new());
        let services = build_services(
            &config,
            &repos,
            Arc::new(FakePlatformClient::new()),
            Arc::new(FakeRelayControl::new()),
        );
        let broadcast = BroadcastFixture::new()
            .with_status(BroadcastStatus::Live)
            .build();
        repos.broadcasts.save(&broadcast).await.unwrap();

        let shutdown = CancellationToken::new();
        let pruner =
            spawn_lock_pruner(services.clone(), Duration::from_secs(60), shutdown.clone());

        services.broadcasts.mark_error(&broadcast.id, "gone").await.unwrap();
        tokio::time::sleep(Duration::from_secs(61)).await;

        // already reclaimed by the background task
        assert_eq!(services.broadcasts.prune_locks(), 0);

        shutdown.cancel();
        pruner.await.unwrap();
    }
}
