//! Runtime configuration.
//!
//! Settings come from three layers, highest first: command line (or the
//! matching environment variable), an optional TOML file, built-in defaults.

use canvas_bridge_core::{SharedSecret, DEFAULT_COMMAND_TIMEOUT_MS, HANDSHAKE_TIMEOUT_MS};
use clap::Parser;
use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 3055;

/// Secret used when none is configured. Fine for a single-user machine,
/// anything else should override it.
pub const DEFAULT_SECRET: &str = "canvas-bridge-local-secret";

#[derive(Debug, Parser)]
#[command(name = "canvas-bridge", version, about = "Authenticated command bridge for design-tool peers")]
pub struct Cli {
    /// TOML file with defaults for the options below.
    #[arg(long, env = "CANVAS_BRIDGE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Address to listen on for peer connections.
    #[arg(long, env = "CANVAS_BRIDGE_BIND")]
    pub bind: Option<IpAddr>,

    /// Port to listen on for peer connections.
    #[arg(long, env = "CANVAS_BRIDGE_PORT")]
    pub port: Option<u16>,

    /// Secret peers must prove knowledge of during the handshake.
    #[arg(long, env = "CANVAS_BRIDGE_SECRET", hide_env_values = true)]
    pub secret: Option<String>,

    /// How long a command waits for its reply.
    #[arg(long, env = "CANVAS_BRIDGE_COMMAND_TIMEOUT_MS")]
    pub command_timeout_ms: Option<u64>,
}

/// Contents of the optional config file.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub bind: Option<IpAddr>,
    pub port: Option<u16>,
    pub secret: Option<String>,
    pub command_timeout_ms: Option<u64>,
}

impl FileConfig {
    pub fn read(path: &std::path::Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Resolved settings.
#[derive(Debug, Clone)]
pub struct Config {
    pub listen: SocketAddr,
    pub secret: SharedSecret,
    pub command_timeout: Duration,
    /// Not user-configurable; tests shorten it.
    pub handshake_timeout: Duration,
    /// True when `secret` is [`DEFAULT_SECRET`].
    pub default_secret: bool,
}

impl Config {
    pub fn load(cli: &Cli) -> Result<Self, ConfigError> {
        let file = match &cli.config {
            Some(path) => FileConfig::read(path)?,
            None => FileConfig::default(),
        };
        Self::from_layers(cli, file)
    }

    pub fn from_layers(cli: &Cli, file: FileConfig) -> Result<Self, ConfigError> {
        let bind = cli
            .bind
            .or(file.bind)
            .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST));
        let port = cli.port.or(file.port).unwrap_or(DEFAULT_PORT);
        let secret = cli.secret.clone().or(file.secret);
        let command_timeout_ms = cli
            .command_timeout_ms
            .or(file.command_timeout_ms)
            .unwrap_or(DEFAULT_COMMAND_TIMEOUT_MS);

        if command_timeout_ms == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        if secret.as_deref() == Some("") {
            return Err(ConfigError::EmptySecret);
        }

        Ok(Self {
            listen: SocketAddr::new(bind, port),
            default_secret: secret.is_none(),
            secret: SharedSecret::new(secret.unwrap_or_else(|| DEFAULT_SECRET.to_string())),
            command_timeout: Duration::from_millis(command_timeout_ms),
            handshake_timeout: Duration::from_millis(HANDSHAKE_TIMEOUT_MS),
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), DEFAULT_PORT),
            secret: SharedSecret::new(DEFAULT_SECRET),
            command_timeout: Duration::from_millis(DEFAULT_COMMAND_TIMEOUT_MS),
            handshake_timeout: Duration::from_millis(HANDSHAKE_TIMEOUT_MS),
            default_secret: true,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("command timeout must be greater than zero")]
    ZeroTimeout,
    #[error("shared secret must not be empty")]
    EmptySecret,
}
