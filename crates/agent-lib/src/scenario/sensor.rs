//! Climate sensor monitoring
//!
//! A round reads humidity and temperature, retrying up to `check_max` times
//! while either value is missing. Missing values or values at/beyond the
//! configured bands are anomalous.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::Result;
use serde::Deserialize;
use tracing::{debug, warn};

use super::detector::{async_trait, Anomaly, ScenarioDetector, Verdict};
use crate::probe::{ClimateReading, ClimateSensor};

/// What to do when the sensor cannot be opened
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InitFailurePolicy {
    /// Stop scheduling this scenario
    #[default]
    Disable,
    /// Keep running, alert each round and try to reopen the device
    Retry,
}

/// Sensor scenario configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    pub enabled: bool,
    pub scenario_name: String,
    pub low_temperature_threshold: f64,
    pub high_temperature_threshold: f64,
    pub low_humidity_threshold: f64,
    pub high_humidity_threshold: f64,
    /// Read attempts per round
    pub check_max: u32,
    pub retry_delay_secs: u64,
    pub on_init_failure: InitFailurePolicy,
    pub iio_device: PathBuf,
    pub interval_secs: u64,
    pub cooldown_secs: u64,
    pub remediation_command: Option<String>,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            scenario_name: "Sensor Failure".to_string(),
            low_temperature_threshold: -20.0,
            high_temperature_threshold: 60.0,
            low_humidity_threshold: 10.0,
            high_humidity_threshold: 90.0,
            check_max: 5,
            retry_delay_secs: 2,
            on_init_failure: InitFailurePolicy::Disable,
            iio_device: PathBuf::from(crate::probe::DEFAULT_IIO_DEVICE),
            interval_secs: 60,
            cooldown_secs: 0,
            remediation_command: None,
        }
    }
}

/// Outcome of one sensor round
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SensorSample {
    /// Last reading obtained, possibly incomplete after exhausting retries
    Read(ClimateReading),
    /// The device could not be opened
    Unavailable,
}

/// Detects missing or out-of-band climate readings
pub struct SensorDetector {
    config: SensorConfig,
    device: Box<dyn ClimateSensor>,
    initialized: bool,
}

impl SensorDetector {
    pub fn new(config: SensorConfig, device: Box<dyn ClimateSensor>) -> Self {
        Self {
            config,
            device,
            initialized: false,
        }
    }

    /// True when either value is missing or at/beyond its band edge
    pub fn is_outlier(&self, reading: ClimateReading) -> bool {
        let (Some(humidity), Some(temperature)) = (reading.humidity, reading.temperature) else {
            return true;
        };

        temperature <= self.config.low_temperature_threshold
            || temperature >= self.config.high_temperature_threshold
            || humidity <= self.config.low_humidity_threshold
            || humidity >= self.config.high_humidity_threshold
    }

    async fn read_with_retries(&mut self) -> ClimateReading {
        let attempts = self.config.check_max.max(1);
        let mut last = ClimateReading::default();

        for attempt in 1..=attempts {
            match self.device.read().await {
                Ok(reading) if reading.is_complete() => return reading,
                Ok(reading) => last = reading,
                Err(e) => debug!(attempt, error = %e, "Sensor read failed"),
            }

            if attempt < attempts {
                debug!(attempt, "Failed to read sensor data, retrying");
                tokio::time::sleep(Duration::from_secs(self.config.retry_delay_secs)).await;
            }
        }

        warn!(
            scenario = %self.config.scenario_name,
            attempts,
            "Failed to read sensor data after multiple attempts"
        );
        last
    }
}

#[async_trait]
impl ScenarioDetector for SensorDetector {
    type Sample = SensorSample;

    fn sample_missing(&self, sample: &SensorSample) -> bool {
        match sample {
            SensorSample::Read(reading) => !reading.is_complete(),
            SensorSample::Unavailable => true,
        }
    }

    fn name(&self) -> &str {
        &self.config.scenario_name
    }

    async fn initialize(&mut self) -> Result<()> {
        match self.device.initialize().await {
            Ok(()) => {
                self.initialized = true;
                Ok(())
            }
            Err(e) if self.config.on_init_failure == InitFailurePolicy::Retry => {
                warn!(error = %e, "Sensor unavailable, will retry every round");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn sample(&mut self) -> SensorSample {
        if !self.initialized {
            match self.device.initialize().await {
                Ok(()) => self.initialized = true,
                Err(e) => {
                    debug!(error = %e, "Sensor still unavailable");
                    return SensorSample::Unavailable;
                }
            }
        }

        SensorSample::Read(self.read_with_retries().await)
    }

    fn evaluate(&mut self, sample: SensorSample, _now: Instant) -> Verdict {
        match sample {
            SensorSample::Unavailable => Verdict::Anomalous(Anomaly::new(
                "Sensor device unavailable. Please exclude the sensor from monitoring.",
            )),
            SensorSample::Read(reading) if !reading.is_complete() => {
                Verdict::Anomalous(Anomaly::new(format!(
                    "No sensor measurement after {} attempts.",
                    self.config.check_max.max(1)
                )))
            }
            SensorSample::Read(reading) if self.is_outlier(reading) => {
                Verdict::Anomalous(Anomaly::new("Sensor measurement detected as an outlier."))
            }
            SensorSample::Read(reading) => {
                debug!(
                    temperature = ?reading.temperature,
                    humidity = ?reading.humidity,
                    "Sensor measurements within range"
                );
                Verdict::Normal
            }
        }
    }

    fn cooldown(&self) -> Duration {
        Duration::from_secs(self.config.cooldown_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedClimate;

    fn config() -> SensorConfig {
        SensorConfig {
            retry_delay_secs: 0,
            ..Default::default()
        }
    }

    fn reading(humidity: Option<f64>, temperature: Option<f64>) -> ClimateReading {
        ClimateReading {
            humidity,
            temperature,
        }
    }

    #[test]
    fn test_missing_values_are_outliers() {
        let d = SensorDetector::new(config(), Box::new(ScriptedClimate::new(vec![])));

        assert!(d.is_outlier(reading(None, Some(20.0))));
        assert!(d.is_outlier(reading(Some(50.0), None)));
        assert!(d.is_outlier(reading(None, None)));
    }

    #[test]
    fn test_band_edges_are_inclusive() {
        let d = SensorDetector::new(config(), Box::new(ScriptedClimate::new(vec![])));

        assert!(!d.is_outlier(reading(Some(89.0), Some(59.0))));
        assert!(d.is_outlier(reading(Some(90.0), Some(20.0))));
        assert!(d.is_outlier(reading(Some(10.0), Some(20.0))));
        assert!(d.is_outlier(reading(Some(50.0), Some(60.0))));
        assert!(d.is_outlier(reading(Some(50.0), Some(-20.0))));
        assert!(d.is_outlier(reading(Some(91.0), Some(61.0))));
    }

    #[tokio::test]
    async fn test_retries_until_complete_reading() {
        let device = ScriptedClimate::new(vec![
            Err(()),
            Ok(reading(Some(40.0), None)),
            Ok(reading(Some(40.0), Some(22.0))),
        ]);
        let reads = device.reads();
        let mut d = SensorDetector::new(config(), Box::new(device));
        d.initialize().await.unwrap();

        let sample = d.sample().await;
        assert_eq!(sample, SensorSample::Read(reading(Some(40.0), Some(22.0))));
        assert_eq!(reads.load(std::sync::atomic::Ordering::SeqCst), 3);
        assert_eq!(d.evaluate(sample, Instant::now()), Verdict::Normal);
    }

    #[tokio::test]
    async fn test_gives_up_after_check_max() {
        let device = ScriptedClimate::new(vec![]);
        let reads = device.reads();
        let mut d = SensorDetector::new(
            SensorConfig {
                check_max: 3,
                ..config()
            },
            Box::new(device),
        );
        d.initialize().await.unwrap();

        let sample = d.sample().await;
        assert_eq!(reads.load(std::sync::atomic::Ordering::SeqCst), 3);

        let verdict = d.evaluate(sample, Instant::now());
        assert!(verdict.anomaly().unwrap().reason.contains("3 attempts"));
    }

    #[tokio::test]
    async fn test_outlier_round_is_anomalous() {
        let device = ScriptedClimate::new(vec![Ok(reading(Some(95.0), Some(25.0)))]);
        let mut d = SensorDetector::new(config(), Box::new(device));
        d.initialize().await.unwrap();

        let sample = d.sample().await;
        let verdict = d.evaluate(sample, Instant::now());
        assert_eq!(
            verdict.anomaly().unwrap().reason,
            "Sensor measurement detected as an outlier."
        );
    }

    #[tokio::test]
    async fn test_init_failure_disables_by_default() {
        let device = ScriptedClimate::new(vec![]).missing();
        let mut d = SensorDetector::new(config(), Box::new(device));

        assert!(d.initialize().await.is_err());
    }

    #[tokio::test]
    async fn test_init_failure_with_retry_policy_alerts() {
        let device = ScriptedClimate::new(vec![]).missing();
        let mut d = SensorDetector::new(
            SensorConfig {
                on_init_failure: InitFailurePolicy::Retry,
                ..config()
            },
            Box::new(device),
        );

        assert!(d.initialize().await.is_ok());
        let sample = d.sample().await;
        assert_eq!(sample, SensorSample::Unavailable);
        assert!(d.evaluate(sample, Instant::now()).is_anomalous());
    }
}
