//! echo-reactor server binary.
//!
//! Listens on a TCP port and echoes frames back to each sender from a single
//! readiness-driven event loop. Configuration via CLI arguments or TOML file.

use echo_reactor::config::Config;
use echo_reactor::runtime;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::load()?;

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!(
        listen = %config.listen,
        framing = ?config.framing,
        max_connections = config.max_connections,
        max_pending_write = config.max_pending_write,
        "Starting echo-reactor server"
    );

    runtime::run(&config)?;
    Ok(())
}
