//! Peer reachability monitoring

use std::time::{Duration, Instant};

use serde::Deserialize;
use tracing::{debug, warn};

use super::detector::{async_trait, Anomaly, ScenarioDetector, Verdict};
use crate::probe::ReachabilityProbe;

/// Reachability scenario configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReachabilityConfig {
    pub enabled: bool,
    pub scenario_name: String,
    pub device_ip: String,
    pub device_name: String,
    pub ping_count: u32,
    pub ping_timeout_secs: u64,
    pub interval_secs: u64,
    pub cooldown_secs: u64,
    pub remediation_command: Option<String>,
}

impl Default for ReachabilityConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            scenario_name: "Communication Failure Indication".to_string(),
            device_ip: "10.0.0.238".to_string(),
            device_name: "Node".to_string(),
            ping_count: 2,
            ping_timeout_secs: 1,
            interval_secs: 60,
            cooldown_secs: 0,
            remediation_command: None,
        }
    }
}

/// Detects a peer that stops answering pings
pub struct ReachabilityDetector {
    config: ReachabilityConfig,
    probe: Box<dyn ReachabilityProbe>,
}

impl ReachabilityDetector {
    pub fn new(config: ReachabilityConfig, probe: Box<dyn ReachabilityProbe>) -> Self {
        Self { config, probe }
    }
}

#[async_trait]
impl ScenarioDetector for ReachabilityDetector {
    type Sample = bool;

    fn name(&self) -> &str {
        &self.config.scenario_name
    }

    async fn sample(&mut self) -> bool {
        match self.probe.is_reachable().await {
            Ok(reachable) => reachable,
            Err(e) => {
                warn!(device_ip = %self.config.device_ip, error = %e, "Reachability probe failed");
                false
            }
        }
    }

    fn evaluate(&mut self, reachable: bool, _now: Instant) -> Verdict {
        if reachable {
            debug!(device_ip = %self.config.device_ip, "Device reachable");
            return Verdict::Normal;
        }

        Verdict::Anomalous(Anomaly::new(format!(
            "Communication failure detected for device {} at {}.",
            self.config.device_name, self.config.device_ip
        )))
    }

    fn cooldown(&self) -> Duration {
        Duration::from_secs(self.config.cooldown_secs)
    }
}
