//! Configuration loading from TOML with environment variable overrides.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! Deployment-specific fields (agency id, server address) can be overridden
//! through environment variables, which is how each container in a compose
//! fleet gets its identity without a per-container config file.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// Top-level client configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct ClientConfig {
    pub agency: AgencyConfig,
    pub server: ServerConfig,
    pub batch: BatchConfig,
    pub results: ResultsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AgencyConfig {
    /// Registration identifier of this betting office.
    pub id: u32,
    /// Directory holding the per-agency bet files.
    pub data_dir: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// `host:port` of the lottery server.
    pub address: String,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BatchConfig {
    /// Most records sent in a single batch message. Operators pick this so
    /// an encoded batch stays under the server's frame budget.
    pub max_size: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ResultsConfig {
    /// Pause between result requests while the draw is in progress.
    pub retry_period_ms: u64,
    /// In-progress replies tolerated before giving up. Absent means poll
    /// until the draw completes or the client is shut down.
    #[serde(default)]
    pub max_poll_attempts: Option<u32>,
}

fn default_connect_timeout_secs() -> u64 {
    10
}

impl ClientConfig {
    /// Load configuration from a TOML file, apply env overrides, validate.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        let mut config: ClientConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {path}"))?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// `AGENCY_ID` and `SERVER_ADDRESS` take precedence over the file.
    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(id) = std::env::var("AGENCY_ID") {
            self.agency.id = id
                .parse()
                .with_context(|| format!("AGENCY_ID is not a valid agency id: {id:?}"))?;
        }
        if let Ok(address) = std::env::var("SERVER_ADDRESS") {
            self.server.address = address;
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.batch.max_size == 0 {
            bail!("batch.max_size must be at least 1");
        }
        if self.server.address.is_empty() {
            bail!("server.address must not be empty");
        }
        Ok(())
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.server.connect_timeout_secs)
    }

    pub fn retry_period(&self) -> Duration {
        Duration::from_millis(self.results.retry_period_ms)
    }

    /// Path of this agency's bet file.
    pub fn data_file(&self) -> PathBuf {
        self.agency
            .data_dir
            .join(format!("agency-{}.csv", self.agency.id))
    }

    /// Helper to build a test configuration with sensible defaults.
    #[cfg(test)]
    pub fn sample() -> Self {
        ClientConfig {
            agency: AgencyConfig {
                id: 1,
                data_dir: PathBuf::from(".data"),
            },
            server: ServerConfig {
                address: "127.0.0.1:12345".to_string(),
                connect_timeout_secs: 2,
            },
            batch: BatchConfig { max_size: 3 },
            results: ResultsConfig {
                retry_period_ms: 500,
                max_poll_attempts: None,
            },
        }
    }
}
