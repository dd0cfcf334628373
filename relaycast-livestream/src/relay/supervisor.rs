// Relay process supervisor
//
// Owns the stream key -> relay process table. The table is a sharded map, so
// start, stop and exit deregistration for one key compose atomically through
// that key's entry lock without a global lock.
//
// Every process gets a monitor task that waits for exit and then removes the
// entry only if it still belongs to its own generation. A key stopped and
// restarted before the old process exits therefore keeps the new relay, and
// each entry is removed exactly once: by `stop_relay` or by its monitor.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::{mapref::entry::Entry, DashMap};
use relaycast_core::{
    config::RelayConfig,
    service::{RelayControl, RelayExit, RelaySpec},
    Error, Result,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStderr};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::command::relay_command;

struct RelayHandle {
    generation: u64,
    pid: Option<u32>,
    cancel: CancellationToken,
    source: String,
    destination: String,
    loop_count: Option<u32>,
    started_at: DateTime<Utc>,
}

/// Snapshot of a registered relay
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayInfo {
    pub stream_key: String,
    pub pid: Option<u32>,
    pub source: String,
    pub destination: String,
    pub loop_count: Option<u32>,
    pub started_at: DateTime<Utc>,
}

pub struct RelaySupervisor {
    relays: Arc<DashMap<String, RelayHandle>>,
    next_generation: AtomicU64,
    ffmpeg_path: String,
    stop_grace: Duration,
    exits: mpsc::UnboundedSender<RelayExit>,
}

impl std::fmt::Debug for RelaySupervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelaySupervisor")
            .field("ffmpeg_path", &self.ffmpeg_path)
            .field("active", &self.relays.len())
            .finish_non_exhaustive()
    }
}

impl RelaySupervisor {
    /// Create a supervisor and the stream of relays that exited without being stopped.
    #[must_use]
    pub fn new(config: &RelayConfig) -> (Self, mpsc::UnboundedReceiver<RelayExit>) {
        Self::with_binary(config.ffmpeg_path.clone(), config.stop_grace())
    }

    #[must_use]
    pub fn with_binary(
        ffmpeg_path: impl Into<String>,
        stop_grace: Duration,
    ) -> (Self, mpsc::UnboundedReceiver<RelayExit>) {
        let (exits, exit_rx) = mpsc::unbounded_channel();
        let supervisor = Self {
            relays: Arc::new(DashMap::new()),
            next_generation: AtomicU64::new(1),
            ffmpeg_path: ffmpeg_path.into(),
            stop_grace,
            exits,
        };
        (supervisor, exit_rx)
    }

    /// Spawn a relay for `stream_key`. Returns once the process is spawned.
    pub fn start_relay(&self, stream_key: &str, spec: RelaySpec) -> Result<()> {
        if stream_key.is_empty() {
            return Err(Error::Validation("Stream key cannot be empty".to_string()));
        }
        if spec.loop_count == Some(0) {
            return Err(Error::Validation("Loop count must be at least 1".to_string()));
        }

        let (child, cancel, generation) = match self.relays.entry(stream_key.to_string()) {
            Entry::Occupied(_) => return Err(Error::AlreadyRunning(stream_key.to_string())),
            Entry::Vacant(vacant) => {
                let mut child = relay_command(&self.ffmpeg_path, &spec).spawn().map_err(|e| {
                    error!(ffmpeg = %self.ffmpeg_path, error = %e, "Failed to spawn relay process");
                    Error::Internal(format!("Failed to spawn {}: {e}", self.ffmpeg_path))
                })?;

                if let Some(stderr) = child.stderr.take() {
                    tokio::spawn(log_stderr(stream_key.to_string(), stderr));
                }

                let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
                let cancel = CancellationToken::new();
                vacant.insert(RelayHandle {
                    generation,
                    pid: child.id(),
                    cancel: cancel.clone(),
                    source: spec.source,
                    destination: spec.destination,
                    loop_count: spec.loop_count,
                    started_at: Utc::now(),
                });
                (child, cancel, generation)
            }
        };

        info!(
            stream_key,
            generation,
            pid = ?child.id(),
            "Relay started"
        );

        tokio::spawn(monitor(
            child,
            stream_key.to_string(),
            generation,
            cancel,
            Arc::clone(&self.relays),
            self.exits.clone(),
            self.stop_grace,
        ));
        Ok(())
    }

    /// Deregister and signal the relay for `stream_key` without waiting for it to exit.
    ///
    /// Its exit is not reported on the exit stream. No-op for unknown keys.
    pub fn stop_relay(&self, stream_key: &str) -> bool {
        match self.relays.remove(stream_key) {
            Some((_, handle)) => {
                handle.cancel.cancel();
                info!(stream_key, generation = handle.generation, "Relay stop requested");
                true
            }
            None => {
                debug!(stream_key, "Stop requested for unknown relay");
                false
            }
        }
    }

    #[must_use]
    pub fn is_running(&self, stream_key: &str) -> bool {
        self.relays.contains_key(stream_key)
    }

    #[must_use]
    pub fn active_count(&self) -> usize {
        self.relays.len()
    }

    /// Registered stream keys, sorted
    #[must_use]
    pub fn active_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.relays.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        keys
    }

    #[must_use]
    pub fn relay_info(&self, stream_key: &str) -> Option<RelayInfo> {
        self.relays.get(stream_key).map(|h| RelayInfo {
            stream_key: stream_key.to_string(),
            pid: h.pid,
            source: h.source.clone(),
            destination: h.destination.clone(),
            loop_count: h.loop_count,
            started_at: h.started_at,
        })
    }

    /// Stop every relay. Returns how many were signalled.
    pub fn shutdown(&self) -> usize {
        let keys = self.active_keys();
        let stopped = keys.iter().filter(|key| self.stop_relay(key)).count();
        info!(stopped, "Relay supervisor shut down");
        stopped
    }
}

#[async_trait]
impl RelayControl for RelaySupervisor {
    async fn start_relay(&self, stream_key: &str, spec: RelaySpec) -> Result<()> {
        Self::start_relay(self, stream_key, spec)
    }

    async fn stop_relay(&self, stream_key: &str) {
        Self::stop_relay(self, stream_key);
    }

    fn is_running(&self, stream_key: &str) -> bool {
        Self::is_running(self, stream_key)
    }
}

async fn monitor(
    mut child: Child,
    stream_key: String,
    generation: u64,
    cancel: CancellationToken,
    relays: Arc<DashMap<String, RelayHandle>>,
    exits: mpsc::UnboundedSender<RelayExit>,
    stop_grace: Duration,
) {
    let status = tokio::select! {
        status = child.wait() => status,
        () = cancel.cancelled() => {
            terminate(&mut child);
            match tokio::time::timeout(stop_grace, child.wait()).await {
                Ok(status) => status,
                Err(_) => {
                    warn!(stream_key = %stream_key, grace_ms = stop_grace.as_millis() as u64, "Relay ignored SIGTERM; killing");
                    if let Err(e) = child.kill().await {
                        warn!(stream_key = %stream_key, error = %e, "Failed to kill relay process");
                    }
                    child.wait().await
                }
            }
        }
    };

    let exit_code = match &status {
        Ok(status) => status.code(),
        Err(e) => {
            warn!(stream_key = %stream_key, error = %e, "Failed to wait for relay process");
            None
        }
    };

    // Only our own generation; a newer relay may already own the key
    let deregistered = relays
        .remove_if(&stream_key, |_, handle| handle.generation == generation)
        .is_some();

    if deregistered {
        info!(stream_key = %stream_key, generation, exit_code, "Relay exited");
        if exits
            .send(RelayExit {
                stream_key: stream_key.clone(),
                exit_code,
            })
            .is_err()
        {
            debug!(stream_key = %stream_key, "No exit listener; relay exit dropped");
        }
    } else {
        debug!(stream_key = %stream_key, generation, exit_code, "Stopped relay exited");
    }
}

#[cfg(unix)]
fn terminate(child: &mut Child) {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let Some(pid) = child.id().and_then(|pid| i32::try_from(pid).ok()) else {
        // Already reaped
        return;
    };
    if let Err(e) = kill(Pid::from_raw(pid), Signal::SIGTERM) {
        debug!(pid, error = %e, "SIGTERM delivery failed");
    }
}

#[cfg(not(unix))]
fn terminate(child: &mut Child) {
    if let Err(e) = child.start_kill() {
        debug!(error = %e, "Failed to kill relay process");
    }
}

async fn log_stderr(stream_key: String, stderr: ChildStderr) {
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        warn!(stream_key = %stream_key, "ffmpeg: {}", line);
    }
}
