//! Duty cycle accounting for regulated transmitters
//!
//! Active transmission time is estimated per round from the transmitted
//! packet delta and the current bitrate, and accumulated over a fixed cycle
//! period. Reaching `cycle_period * dc_limit` is a violation.

use std::time::{Duration, Instant};

use serde::Deserialize;
use tracing::{debug, warn};

use super::detector::{async_trait, Anomaly, ScenarioDetector, Verdict};
use crate::models::Reading;
use crate::probe::InterfaceCounters;

/// Used when the interface bitrate cannot be determined (1 Mbit/s)
pub const FALLBACK_RATE_BYTES_PER_SEC: f64 = 125_000.0;

/// Duty cycle scenario configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DutyCycleConfig {
    pub enabled: bool,
    pub scenario_name: String,
    /// Allowed fraction of the cycle spent transmitting
    pub dc_limit: f64,
    pub cycle_period_secs: u64,
    /// Average packet size in bytes
    pub avg_packet_size: u64,
    pub measure_window_secs: u64,
    pub interface: Option<String>,
    pub interval_secs: u64,
    pub cooldown_secs: u64,
    pub remediation_command: Option<String>,
}

impl Default for DutyCycleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            scenario_name: "Network Protocol Violation".to_string(),
            dc_limit: 0.001,
            cycle_period_secs: 30,
            avg_packet_size: 1500,
            measure_window_secs: 1,
            interface: None,
            interval_secs: 60,
            cooldown_secs: 30,
            remediation_command: None,
        }
    }
}

/// Detects transmitters exceeding their duty cycle budget
pub struct DutyCycleDetector {
    config: DutyCycleConfig,
    counters: Box<dyn InterfaceCounters>,
    transmit_duration: f64,
    cycle_start: Option<Instant>,
}

impl DutyCycleDetector {
    pub fn new(config: DutyCycleConfig, counters: Box<dyn InterfaceCounters>) -> Self {
        Self {
            config,
            counters,
            transmit_duration: 0.0,
            cycle_start: None,
        }
    }

    /// Seconds of transmission accumulated in the current cycle
    pub fn transmit_duration(&self) -> f64 {
        self.transmit_duration
    }

    /// Seconds of transmission allowed per cycle
    pub fn max_transmit_time(&self) -> f64 {
        self.config.cycle_period_secs as f64 * self.config.dc_limit
    }

    fn cycle_period(&self) -> Duration {
        Duration::from_secs(self.config.cycle_period_secs)
    }

    fn reset_cycle(&mut self, now: Instant) {
        self.transmit_duration = 0.0;
        self.cycle_start = Some(now);
    }

    async fn measure(&self) -> anyhow::Result<f64> {
        let rate = match self.counters.tx_rate_bytes_per_sec().await {
            Ok(rate) if rate > 0.0 => rate,
            Ok(_) => FALLBACK_RATE_BYTES_PER_SEC,
            Err(e) => {
                debug!(error = %e, "Transmission speed unavailable, using default");
                FALLBACK_RATE_BYTES_PER_SEC
            }
        };

        let before = self.counters.tx_packets().await?;
        tokio::time::sleep(Duration::from_secs(self.config.measure_window_secs)).await;
        let after = self.counters.tx_packets().await?;

        let packets = after.saturating_sub(before);
        Ok(transmit_seconds(packets, self.config.avg_packet_size, rate))
    }
}

/// Air time for `packets` of `avg_packet_size` bytes at `rate` bytes/s
fn transmit_seconds(packets: u64, avg_packet_size: u64, rate: f64) -> f64 {
    packets as f64 * avg_packet_size as f64 / rate
}

#[async_trait]
impl ScenarioDetector for DutyCycleDetector {
    /// Seconds of active transmission observed this round
    type Sample = Reading;

    fn sample_missing(&self, sample: &Reading) -> bool {
        sample.is_none()
    }

    fn name(&self) -> &str {
        &self.config.scenario_name
    }

    async fn sample(&mut self) -> Reading {
        match self.measure().await {
            Ok(active) => Some(active),
            Err(e) => {
                warn!(scenario = %self.config.scenario_name, error = %e, "Failed to read transmit counters");
                None
            }
        }
    }

    fn evaluate(&mut self, sample: Reading, now: Instant) -> Verdict {
        match self.cycle_start {
            None => self.reset_cycle(now),
            Some(start) if now.duration_since(start) >= self.cycle_period() => {
                debug!(duration = self.transmit_duration, "Duty cycle period elapsed, resetting");
                self.reset_cycle(now);
            }
            Some(_) => {}
        }

        if self.transmit_duration >= self.max_transmit_time() {
            return Verdict::Anomalous(Anomaly::new(
                "Duty Cycle violation detected. Reconfiguring transmission parameters.",
            ));
        }

        if let Some(active) = sample {
            self.transmit_duration += active;
        }
        debug!(
            transmit_duration = self.transmit_duration,
            max = self.max_transmit_time(),
            "Duty cycle updated"
        );
        Verdict::Normal
    }

    fn cooldown(&self) -> Duration {
        Duration::from_secs(self.config.cooldown_secs)
    }

    fn after_alert(&mut self, now: Instant) {
        self.reset_cycle(now);
    }
}
