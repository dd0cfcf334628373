//! Bootstrap helpers for embedding relaycast in a server binary
//!
//! This module handles:
//! - Configuration loading
//! - Database initialization
//! - Service construction and dependency wiring

pub mod config;
pub mod database;
pub mod services;

pub use config::load_config;
pub use database::init_database;
pub use services::{build_services, init_services, Services};
