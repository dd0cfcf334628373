//! Relay control seam
//!
//! The process supervisor lives in `relaycast-livestream`; services in this
//! crate drive it through `RelayControl` and receive exits through
//! `RelayExitHandler`.

use async_trait::async_trait;

use crate::Result;

/// What a relay process forwards
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelaySpec {
    /// Live feed URL or stored file path
    pub source: String,
    /// Full destination publish URL
    pub destination: String,
    /// Play the source this many times. `None` relays a live feed once.
    pub loop_count: Option<u32>,
}

impl RelaySpec {
    #[must_use]
    pub fn live(source: String, destination: String) -> Self {
        Self {
            source,
            destination,
            loop_count: None,
        }
    }

    #[must_use]
    pub fn replay(source: String, destination: String, loop_count: u32) -> Self {
        Self {
            source,
            destination,
            loop_count: Some(loop_count),
        }
    }

    /// File replays are paced at native frame rate
    #[must_use]
    pub const fn is_replay(&self) -> bool {
        self.loop_count.is_some()
    }
}

/// A relay process ended on its own
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayExit {
    pub stream_key: String,
    /// `None` when killed by a signal or the wait itself failed
    pub exit_code: Option<i32>,
}

impl RelayExit {
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self.exit_code, Some(0))
    }

    #[must_use]
    pub fn failure_message(&self) -> Option<String> {
        match self.exit_code {
            Some(0) => None,
            Some(code) => Some(format!("relay exited with code {code}")),
            None => Some("terminated by signal".to_string()),
        }
    }
}

#[async_trait]
pub trait RelayControl: Send + Sync {
    /// Register and spawn a relay for `stream_key`.
    ///
    /// Fails with `AlreadyRunning` when one is registered.
    async fn start_relay(&self, stream_key: &str, spec: RelaySpec) -> Result<()>;

    /// Deregister and signal the relay. No-op for unknown keys; does not wait for exit.
    async fn stop_relay(&self, stream_key: &str);

    fn is_running(&self, stream_key: &str) -> bool;
}

#[async_trait]
pub trait RelayExitHandler: Send + Sync {
    async fn on_relay_exit(&self, exit: RelayExit);
}
