pub mod gateway;

pub use gateway::{stream_key_from_path, IngestEventHandler, IngestGateway};
