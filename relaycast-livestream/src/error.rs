use thiserror::Error;

pub type IngestResult<T> = Result<T, IngestError>;

/// Why the ingest endpoint should drop a publishing session
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Publish rejected for stream key")]
    Rejected,

    #[error("Relay error: {0}")]
    Relay(#[from] relaycast_core::Error),
}
