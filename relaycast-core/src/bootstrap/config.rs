//! Configuration loading

use anyhow::Result;
use std::path::Path;
use tracing::info;

use crate::Config;

/// Config file search order:
/// 1. `RELAYCAST_CONFIG_PATH` environment variable (explicit path)
/// 2. ./relaycast.toml (current working directory)
/// 3. /etc/relaycast/relaycast.toml
fn find_config_file() -> Option<String> {
    std::env::var("RELAYCAST_CONFIG_PATH")
        .ok()
        .filter(|p| Path::new(p).exists())
        .or_else(|| {
            ["relaycast.toml", "/etc/relaycast/relaycast.toml"]
                .into_iter()
                .find(|p| Path::new(p).exists())
                .map(str::to_string)
        })
}

/// Load and validate configuration, falling back to environment variables only.
///
/// Runs before logging is installed, so progress goes to stderr.
pub fn load_config() -> Result<Config> {
    let config = match find_config_file() {
        Some(path) => {
            eprintln!("Loading config from {path}");
            Config::from_file(&path)
                .map_err(|e| anyhow::anyhow!("Failed to load {path}: {e}"))?
        }
        None => {
            eprintln!("No config file found, using environment variables");
            Config::from_env().map_err(|e| anyhow::anyhow!("Failed to load config: {e}"))?
        }
    };

    if let Err(errors) = config.validate() {
        for error in &errors {
            eprintln!("Config validation error: {error}");
        }
        return Err(anyhow::anyhow!(
            "Configuration validation failed with {} error(s): {}",
            errors.len(),
            errors.join("; ")
        ));
    }

    info!("Configuration loaded and validated successfully");
    Ok(config)
}
