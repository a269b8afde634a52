//! TOML configuration parsing and validation.
//!
//! ```toml
//! [db]
//! path = "./data/contacts.sqlite"
//! max_connections = 5
//!
//! [server]
//! bind = "127.0.0.1:5000"
//!
//! [delay]
//! enabled = true
//! min_ms = 300
//! max_ms = 700
//! ```
//!
//! Only `[db].path` is required; every other key has a default.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub delay: DelayConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:5000".to_string()
}

/// Simulated processing latency on list and detail responses.
#[derive(Debug, Deserialize, Clone)]
pub struct DelayConfig {
    #[serde(default = "default_delay_enabled")]
    pub enabled: bool,
    #[serde(default = "default_min_ms")]
    pub min_ms: u64,
    #[serde(default = "default_max_ms")]
    pub max_ms: u64,
}

impl Default for DelayConfig {
    fn default() -> Self {
        Self {
            enabled: default_delay_enabled(),
            min_ms: default_min_ms(),
            max_ms: default_max_ms(),
        }
    }
}

fn default_delay_enabled() -> bool {
    true
}
fn default_min_ms() -> u64 {
    300
}
fn default_max_ms() -> u64 {
    700
}

impl Config {
    /// A configuration with defaults everywhere and the delay disabled.
    pub fn minimal(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db: DbConfig {
                path: db_path.into(),
                max_connections: default_max_connections(),
            },
            server: ServerConfig::default(),
            delay: DelayConfig {
                enabled: false,
                ..DelayConfig::default()
            },
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_config(&content)
}

pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;

    if config.db.max_connections == 0 {
        anyhow::bail!("db.max_connections must be >= 1");
    }

    if config.delay.min_ms > config.delay.max_ms {
        anyhow::bail!(
            "delay.min_ms ({}) must not exceed delay.max_ms ({})",
            config.delay.min_ms,
            config.delay.max_ms
        );
    }

    Ok(config)
}
