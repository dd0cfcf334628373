use relaycast_core::service::{RelayExit, RelayExitHandler};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Forward relay exits to `handler`, one at a time, in arrival order.
///
/// Ends when `shutdown` is cancelled or every sender (the supervisor) is gone.
pub fn spawn_exit_dispatcher(
    mut exits: mpsc::UnboundedReceiver<RelayExit>,
    handler: Arc<dyn RelayExitHandler>,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                () = shutdown.cancelled() => {
                    info!("Relay exit dispatcher shutting down");
                    break;
                }
                exit = exits.recv() => {
                    let Some(exit) = exit else {
                        debug!("Relay exit channel closed");
                        break;
                    };
                    handler.on_relay_exit(exit).await;
                }
            }
        }
    })
}
