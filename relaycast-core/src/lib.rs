pub mod bootstrap;
pub mod config;
pub mod error;
pub mod logging;
pub mod media_store;
pub mod models;
pub mod platform;
pub mod repository;
pub mod service;

#[cfg(any(test, feature = "test-util"))]
pub mod test_helpers;

pub use config::Config;
pub use error::{Error, Result};
