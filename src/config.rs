//! Configuration module for the echo-reactor server.
//!
//! Supports both command-line arguments and TOML configuration file.
//! CLI arguments take precedence over config file values.

use crate::protocol::Framing;
use clap::Parser;
use serde::Deserialize;
use std::path::PathBuf;
use thiserror::Error;

/// Command-line arguments for the server
#[derive(Parser, Debug)]
#[command(name = "echo-reactor")]
#[command(version)]
#[command(about = "A single-threaded readiness-driven echo server", long_about = None)]
pub struct CliArgs {
    /// Path to TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Address to bind to (e.g., 0.0.0.0:1234)
    #[arg(short = 'l', long)]
    pub listen: Option<String>,

    /// Inbound framing: newline-delimited lines or length-prefixed requests
    #[arg(short = 'f', long, value_enum)]
    pub framing: Option<Framing>,

    /// Maximum number of simultaneous connections
    #[arg(short = 'm', long)]
    pub max_connections: Option<usize>,

    /// Queued output (bytes) at which a connection stops being read
    #[arg(long)]
    pub max_pending_write: Option<usize>,

    /// Listen backlog
    #[arg(long)]
    pub backlog: Option<u32>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

/// TOML configuration file structure
#[derive(Debug, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub protocol: ProtocolConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server-related configuration
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen")]
    pub listen: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    #[serde(default = "default_backlog")]
    pub backlog: u32,
    /// Poll events drained per loop iteration
    #[serde(default = "default_events_capacity")]
    pub events_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            max_connections: default_max_connections(),
            backlog: default_backlog(),
            events_capacity: default_events_capacity(),
        }
    }
}

/// Framing and per-connection buffering
#[derive(Debug, Deserialize)]
pub struct ProtocolConfig {
    #[serde(default)]
    pub framing: Framing,
    #[serde(default = "default_max_pending_write")]
    pub max_pending_write: usize,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            framing: Framing::default(),
            max_pending_write: default_max_pending_write(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_listen() -> String {
    "0.0.0.0:1234".to_string()
}

fn default_max_connections() -> usize {
    1024
}

fn default_backlog() -> u32 {
    128
}

fn default_events_capacity() -> usize {
    1024
}

fn default_max_pending_write() -> usize {
    64 * 1024 // 64 KB
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Final resolved configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub listen: String,
    pub framing: Framing,
    pub max_connections: usize,
    pub max_pending_write: usize,
    pub backlog: u32,
    pub events_capacity: usize,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self::merge(
            CliArgs {
                config: None,
                listen: None,
                framing: None,
                max_connections: None,
                max_pending_write: None,
                backlog: None,
                log_level: default_log_level(),
            },
            TomlConfig::default(),
        )
    }
}

impl Config {
    /// Load configuration from CLI args and optional TOML file.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_cli(CliArgs::parse())
    }

    /// Resolve parsed CLI args, reading the TOML file they point at.
    pub fn from_cli(cli: CliArgs) -> Result<Self, ConfigError> {
        let toml_config = if let Some(ref config_path) = cli.config {
            let contents = std::fs::read_to_string(config_path)
                .map_err(|e| ConfigError::FileRead(config_path.clone(), e))?;
            toml::from_str(&contents)
                .map_err(|e| ConfigError::TomlParse(config_path.clone(), e))?
        } else {
            TomlConfig::default()
        };

        Ok(Self::merge(cli, toml_config))
    }

    /// Merge CLI args with TOML config (CLI takes precedence)
    fn merge(cli: CliArgs, toml_config: TomlConfig) -> Self {
        Config {
            listen: cli.listen.unwrap_or(toml_config.server.listen),
            framing: cli.framing.unwrap_or(toml_config.protocol.framing),
            max_connections: cli
                .max_connections
                .unwrap_or(toml_config.server.max_connections),
            max_pending_write: cli
                .max_pending_write
                .unwrap_or(toml_config.protocol.max_pending_write),
            backlog: cli.backlog.unwrap_or(toml_config.server.backlog),
            events_capacity: toml_config.server.events_capacity,
            log_level: if cli.log_level != "info" {
                cli.log_level
            } else {
                toml_config.logging.level
            },
        }
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{}': {}", .0.display(), .1)]
    FileRead(PathBuf, #[source] std::io::Error),
    #[error("Failed to parse config file '{}': {}", .0.display(), .1)]
    TomlParse(PathBuf, #[source] toml::de::Error),
}
