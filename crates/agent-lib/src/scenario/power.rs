//! Device power/temperature monitoring
//!
//! Fixed two-tier policy: at or above `high_threshold` is HIGH, at or above
//! `low_threshold` is LOW, anything else is NORMAL.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use serde::Deserialize;
use tracing::{debug, warn};

use super::detector::{async_trait, Anomaly, ScenarioDetector, Verdict};
use crate::models::Reading;
use crate::probe::TemperatureSource;

/// Power scenario configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PowerConfig {
    pub enabled: bool,
    pub scenario_name: String,
    pub high_threshold: f64,
    pub low_threshold: f64,
    pub interval_secs: u64,
    pub cooldown_secs: u64,
    pub thermal_zone: PathBuf,
    pub remediation_command: Option<String>,
}

impl Default for PowerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            scenario_name: "Device Power Alert".to_string(),
            high_threshold: 85.0,
            low_threshold: 80.0,
            interval_secs: 60,
            cooldown_secs: 0,
            thermal_zone: PathBuf::from(crate::probe::DEFAULT_THERMAL_ZONE),
            remediation_command: None,
        }
    }
}

/// Power status tiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerStatus {
    Normal,
    Low,
    High,
}

impl std::fmt::Display for PowerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PowerStatus::Normal => write!(f, "NORMAL OPERATION"),
            PowerStatus::Low => write!(f, "LOW THRESHOLD"),
            PowerStatus::High => write!(f, "HIGH THRESHOLD"),
        }
    }
}

/// Detects device temperature crossing the configured tiers
pub struct PowerDetector {
    config: PowerConfig,
    source: Box<dyn TemperatureSource>,
}

impl PowerDetector {
    pub fn new(config: PowerConfig, source: Box<dyn TemperatureSource>) -> Self {
        Self { config, source }
    }

    /// Classify a temperature. Both boundaries are inclusive on the
    /// higher tier.
    pub fn classify(&self, value: f64) -> PowerStatus {
        if value >= self.config.high_threshold {
            PowerStatus::High
        } else if value >= self.config.low_threshold {
            PowerStatus::Low
        } else {
            PowerStatus::Normal
        }
    }
}

#[async_trait]
impl ScenarioDetector for PowerDetector {
    type Sample = Reading;

    fn name(&self) -> &str {
        &self.config.scenario_name
    }

    async fn sample(&mut self) -> Reading {
        match self.source.read_celsius().await {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(scenario = %self.config.scenario_name, error = %e, "Failed to read temperature");
                None
            }
        }
    }

    fn sample_missing(&self, sample: &Reading) -> bool {
        sample.is_none()
    }

    fn evaluate(&mut self, sample: Reading, _now: Instant) -> Verdict {
        let Some(value) = sample else {
            debug!(scenario = %self.config.scenario_name, "No temperature reading this round");
            return Verdict::Normal;
        };

        match self.classify(value) {
            PowerStatus::Normal => {
                debug!(temperature = value, "Power status normal");
                Verdict::Normal
            }
            // Only the high tier warrants restarting the unit
            status @ PowerStatus::High => Verdict::Anomalous(Anomaly::new(format!(
                "{}: {:.1}°C exceeds {:.1}°C",
                status, value, self.config.high_threshold
            ))),
            status @ PowerStatus::Low => Verdict::Anomalous(Anomaly::alert_only(format!(
                "{}: {:.1}°C exceeds {:.1}°C",
                status, value, self.config.low_threshold
            ))),
        }
    }

    fn cooldown(&self) -> Duration {
        Duration::from_secs(self.config.cooldown_secs)
    }
}
