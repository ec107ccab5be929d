//! Run the bot service.
//!
//! Loads (or generates) the operator config, initializes logging, and opens
//! the state snapshot, reporting success once everything checks out. The
//! chat transport itself is not part of this crate: deployments embed
//! `GateBot` with their `ChatClient`/`EventSource` implementations and call
//! `GateBot::run`.

use super::config::{default_config_path, GatehouseConfig};
use crate::store::StateStore;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

pub async fn execute(
    config_path: Option<String>,
    state_path: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config_path = config_path
        .map(PathBuf::from)
        .unwrap_or_else(default_config_path);

    let config = if config_path.exists() {
        GatehouseConfig::load(&config_path)?
    } else {
        println!(
            "No config file found. Creating default at {}",
            config_path.display()
        );
        GatehouseConfig::create_default(&config_path)?;
        GatehouseConfig::load(&config_path)?
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.clone()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let settings = config.settings()?;
    let state_path = state_path
        .map(PathBuf::from)
        .unwrap_or_else(|| config.state_path(&config_path));
    let _store = StateStore::open(&state_path)?;

    info!(config = %config_path.display(), state = %state_path.display(), "gatehouse initialized");
    info!(
        admin = %settings.admin,
        warn_delay = ?settings.warn_delay,
        kick_delay = ?settings.kick_delay,
        "gate policy loaded"
    );

    println!(
        "Configuration and state verified. This binary ships without a chat \
         transport; embed gatehouse::bot::GateBot with your ChatClient and \
         EventSource implementations to run the bot (see src/chat/traits.rs)."
    );
    Ok(())
}
