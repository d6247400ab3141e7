//! Server configuration.
//!
//! Values come from an optional TOML file and are then overridden by
//! command-line flags:
//!
//! ```toml
//! port = 9000
//! bind = "0.0.0.0"
//! served_dir = "files"
//! idle_timeout_secs = 30
//!
//! [data_ports]
//! strategy = "range"   # or "ephemeral"
//! low = 50000
//! high = 51000
//! attempts = 10
//! pause_ms = 50
//! ```

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use udpfetch_protocol::constants::{
    DATA_PORT_BIND_ATTEMPTS, DATA_PORT_BIND_PAUSE, DATA_PORT_RANGE_HIGH, DATA_PORT_RANGE_LOW,
    MIN_CONTROL_PORT, WORKER_IDLE_TIMEOUT,
};
use udpfetch_server::{PortStrategy, ServerConfig};

/// Server configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Control port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Address the control and data sockets bind to.
    #[serde(default = "default_bind")]
    pub bind: IpAddr,

    /// Directory whose files are served.
    #[serde(default = "default_served_dir")]
    pub served_dir: PathBuf,

    /// Seconds a transfer may sit idle before its worker exits.
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,

    #[serde(default)]
    pub data_ports: DataPorts,
}

/// `[data_ports]` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataPorts {
    #[serde(default)]
    pub strategy: StrategyKind,

    #[serde(default = "default_low")]
    pub low: u16,

    #[serde(default = "default_high")]
    pub high: u16,

    #[serde(default = "default_attempts")]
    pub attempts: u32,

    #[serde(default = "default_pause_ms")]
    pub pause_ms: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    #[default]
    Range,
    Ephemeral,
}

fn default_port() -> u16 {
    9000
}

fn default_bind() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_served_dir() -> PathBuf {
    PathBuf::from("files")
}

fn default_idle_timeout_secs() -> u64 {
    WORKER_IDLE_TIMEOUT.as_secs()
}

fn default_low() -> u16 {
    DATA_PORT_RANGE_LOW
}

fn default_high() -> u16 {
    DATA_PORT_RANGE_HIGH
}

fn default_attempts() -> u32 {
    DATA_PORT_BIND_ATTEMPTS
}

fn default_pause_ms() -> u64 {
    DATA_PORT_BIND_PAUSE.as_millis() as u64
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind: default_bind(),
            served_dir: default_served_dir(),
            idle_timeout_secs: default_idle_timeout_secs(),
            data_ports: DataPorts::default(),
        }
    }
}

impl Default for DataPorts {
    fn default() -> Self {
        Self {
            strategy: StrategyKind::default(),
            low: default_low(),
            high: default_high(),
            attempts: default_attempts(),
            pause_ms: default_pause_ms(),
        }
    }
}

impl Config {
    /// Loads `path` if given, otherwise returns the defaults.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("parsing config {}", path.display()))?;
        tracing::debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Rejects values the server cannot run with.
    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.port >= MIN_CONTROL_PORT,
            "port must be between {MIN_CONTROL_PORT} and 65535, got {}",
            self.port
        );
        anyhow::ensure!(self.idle_timeout_secs > 0, "idle_timeout_secs must be positive");
        Ok(())
    }

    /// Builds the library configuration.
    pub fn to_server_config(&self) -> anyhow::Result<ServerConfig> {
        self.validate()?;

        let port_strategy = match self.data_ports.strategy {
            StrategyKind::Ephemeral => PortStrategy::Ephemeral,
            StrategyKind::Range => PortStrategy::Range {
                low: self.data_ports.low,
                high: self.data_ports.high,
                attempts: self.data_ports.attempts,
                pause: Duration::from_millis(self.data_ports.pause_ms),
            },
        };

        let mut config = ServerConfig::new(SocketAddr::new(self.bind, self.port), &self.served_dir);
        config.port_strategy = port_strategy;
        config.idle_timeout = Duration::from_secs(self.idle_timeout_secs);
        config.validate()?;
        Ok(config)
    }
}
