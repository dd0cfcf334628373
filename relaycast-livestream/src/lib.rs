// relaycast-livestream - Relay process supervision and ingest wiring
//
// Architecture:
// - relay/    - ffmpeg relay supervisor and exit dispatch
// - ingest/   - ingest endpoint event handler (authorize, start and stop relays)
// - runtime   - wires the supervisor, the gateway and the core services together
//
// Every relay is keyed by the destination stream key; at most one runs per key.

pub mod error;
pub mod ingest;
pub mod relay;
pub mod runtime;

pub use error::{IngestError, IngestResult};
pub use ingest::{stream_key_from_path, IngestEventHandler, IngestGateway};
pub use relay::{spawn_exit_dispatcher, RelayInfo, RelaySupervisor};
pub use runtime::{spawn_lock_pruner, RelayRuntime};
