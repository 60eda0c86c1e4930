//! Agent configuration
//!
//! Layered with the `config` crate: an optional TOML file
//! (`EDGE_HEALER_CONFIG`, default `edge-healer.toml`) overridden by
//! `HEALER__`-prefixed environment variables, e.g.
//! `HEALER__POWER__HIGH_THRESHOLD=90`. Every field has a default.

use anyhow::{Context, Result};
use healer_lib::alerts::{ForwardConfig, StoreConfig};
use healer_lib::scenario::{
    DutyCycleConfig, LinkQualityConfig, PowerConfig, ReachabilityConfig, SensorConfig,
};
use serde::Deserialize;
use std::path::Path;

/// Environment variable naming the configuration file
pub const CONFIG_PATH_ENV: &str = "EDGE_HEALER_CONFIG";

const DEFAULT_CONFIG_PATH: &str = "edge-healer.toml";

/// Agent configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Port for the alerts/health/metrics API
    pub api_port: u16,

    /// Fixed device id; the primary MAC address is used when unset
    pub device_id: Option<String>,

    /// Device id used when no MAC address can be read
    pub fallback_device_id: String,

    pub alerts: StoreConfig,
    pub forward: ForwardConfig,
    pub power: PowerConfig,
    pub sensor: SensorConfig,
    pub link_quality: LinkQualityConfig,
    pub duty_cycle: DutyCycleConfig,
    pub reachability: ReachabilityConfig,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            api_port: 8500,
            device_id: None,
            fallback_device_id: "fa:16:3e:5e:25:ef".to_string(),
            alerts: StoreConfig::default(),
            forward: ForwardConfig::default(),
            power: PowerConfig::default(),
            sensor: SensorConfig::default(),
            link_quality: LinkQualityConfig::default(),
            duty_cycle: DutyCycleConfig::default(),
            reachability: ReachabilityConfig::default(),
        }
    }
}

impl AgentConfig {
    /// Load configuration from the config file and environment
    pub fn load() -> Result<Self> {
        let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from(Path::new(&path))
    }

    /// Load from `path` (skipped when missing) plus the environment
    pub fn load_from(path: &Path) -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::from(path).required(false))
            .add_source(
                config::Environment::with_prefix("HEALER")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()
            .with_context(|| format!("Failed to read configuration from {:?}", path))?;

        config
            .try_deserialize()
            .context("Invalid agent configuration")
    }
}
