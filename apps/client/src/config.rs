//! Client configuration.
//!
//! ```toml
//! host = "127.0.0.1"
//! port = 9000
//! output_dir = "downloads"
//! initial_timeout_ms = 1000
//! max_attempts = 5
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use udpfetch_channel::RetryPolicy;
use udpfetch_protocol::constants::{
    DEFAULT_INITIAL_TIMEOUT, DEFAULT_MAX_ATTEMPTS, MAX_CHUNK_SIZE, MIN_CONTROL_PORT,
};

/// Client configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Server host name or address.
    #[serde(default = "default_host")]
    pub host: String,

    /// Server control port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Where downloads are written; created if missing.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Wait for the first attempt of every request.
    #[serde(default = "default_initial_timeout_ms")]
    pub initial_timeout_ms: u64,

    /// Sends per request before giving up.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Bytes asked for per chunk request.
    #[serde(default = "default_max_chunk")]
    pub max_chunk: u64,
}

fn default_host() -> String {
    "127.0.0.1".into()
}

fn default_port() -> u16 {
    9000
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("downloads")
}

fn default_initial_timeout_ms() -> u64 {
    DEFAULT_INITIAL_TIMEOUT.as_millis() as u64
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

fn default_max_chunk() -> u64 {
    MAX_CHUNK_SIZE
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            output_dir: default_output_dir(),
            initial_timeout_ms: default_initial_timeout_ms(),
            max_attempts: default_max_attempts(),
            max_chunk: default_max_chunk(),
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
        toml::from_str(&content).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.port >= MIN_CONTROL_PORT,
            "port must be between {MIN_CONTROL_PORT} and 65535, got {}",
            self.port
        );
        anyhow::ensure!(self.max_attempts > 0, "max_attempts must be at least 1");
        anyhow::ensure!(
            self.initial_timeout_ms > 0,
            "initial_timeout_ms must be positive"
        );
        anyhow::ensure!(
            (1..=MAX_CHUNK_SIZE).contains(&self.max_chunk),
            "max_chunk must be between 1 and {MAX_CHUNK_SIZE}"
        );
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            initial_timeout: Duration::from_millis(self.initial_timeout_ms),
            max_attempts: self.max_attempts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 9000);
        assert_eq!(config.max_chunk, 1000);
        assert_eq!(config.retry_policy(), RetryPolicy::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let config: Config = toml::from_str("host = \"files.lan\"\nmax_attempts = 8\n").unwrap();
        assert_eq!(config.host, "files.lan");
        assert_eq!(config.max_attempts, 8);
        assert_eq!(config.output_dir, PathBuf::from("downloads"));
    }

    #[test]
    fn invalid_values_rejected() {
        for bad in [
            Config {
                port: 1023,
                ..Config::default()
            },
            Config {
                max_attempts: 0,
                ..Config::default()
            },
            Config {
                max_chunk: 4096,
                ..Config::default()
            },
        ] {
            assert!(bad.validate().is_err(), "{bad:?}");
        }
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::TempDir::new().unwrap();
        assert!(Config::load(Some(&dir.path().join("nope.toml"))).is_err());
    }
}
