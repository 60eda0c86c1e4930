//! Link quality monitoring against adaptive baselines
//!
//! Wifi tracks RSSI and link quality percentage; LoRa tracks RSSI, SNR and
//! spreading factor parsed from the radio's packet lines. Each signal has its
//! own sliding window and margin. The window is updated first, then the
//! current value is compared against `mean(window) - margin`, so a signal with
//! no history can never trigger on its own.

use std::path::PathBuf;
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use anyhow::Result;
use regex::Regex;
use serde::Deserialize;
use tracing::{debug, warn};

use super::baseline::{SlidingWindow, DEFAULT_HISTORY_SIZE};
use super::detector::{async_trait, Anomaly, ScenarioDetector, Verdict};
use crate::models::Reading;
use crate::probe::{RadioSource, WifiLink, WirelessSource};

const ADJUSTING_MESSAGE: &str = "Adjusting transmission parameters.";

/// Link technology being monitored
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommunicationType {
    #[default]
    Wifi,
    Lora,
}

/// Link quality scenario configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LinkQualityConfig {
    pub enabled: bool,
    pub scenario_name: String,
    pub communication_type: CommunicationType,
    /// Wireless interface. Detected from the default route when unset.
    pub interface: Option<String>,
    pub serial_port: PathBuf,
    pub baud_rate: u32,
    pub history_size: usize,
    pub rssi_margin: f64,
    pub link_quality_margin: f64,
    pub snr_margin: f64,
    /// Spreading factor margin. SF is tracked but never triggers when unset.
    pub sf_margin: Option<f64>,
    pub interval_secs: u64,
    pub cooldown_secs: u64,
    pub remediation_command: Option<String>,
}

impl Default for LinkQualityConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            scenario_name: "Link Quality Issues".to_string(),
            communication_type: CommunicationType::Wifi,
            interface: None,
            serial_port: PathBuf::from("/dev/ttyS0"),
            baud_rate: 9600,
            history_size: DEFAULT_HISTORY_SIZE,
            rssi_margin: 5.0,
            link_quality_margin: 10.0,
            snr_margin: 3.0,
            sf_margin: None,
            interval_secs: 60,
            cooldown_secs: 30,
            remediation_command: None,
        }
    }
}

/// Observe `value` into `window`, then report whether it falls below the
/// window's threshold.
fn breaches(window: &mut SlidingWindow, value: Reading, margin: f64) -> bool {
    window.observe(value);

    match (value, window.threshold(margin)) {
        (Some(current), Some(threshold)) => current < threshold,
        _ => false,
    }
}

/// Detects degraded Wifi links
pub struct WifiLinkDetector {
    config: LinkQualityConfig,
    source: Box<dyn WirelessSource>,
    rssi: SlidingWindow,
    link_quality: SlidingWindow,
}

impl WifiLinkDetector {
    pub fn new(config: LinkQualityConfig, source: Box<dyn WirelessSource>) -> Self {
        let capacity = config.history_size;
        Self {
            config,
            source,
            rssi: SlidingWindow::new(capacity),
            link_quality: SlidingWindow::new(capacity),
        }
    }

    pub fn rssi_window(&self) -> &SlidingWindow {
        &self.rssi
    }

    pub fn link_quality_window(&self) -> &SlidingWindow {
        &self.link_quality
    }
}

#[async_trait]
impl ScenarioDetector for WifiLinkDetector {
    type Sample = WifiLink;

    fn sample_missing(&self, sample: &WifiLink) -> bool {
        sample.rssi.is_none() && sample.link_quality_pct.is_none()
    }

    fn name(&self) -> &str {
        &self.config.scenario_name
    }

    async fn sample(&mut self) -> WifiLink {
        match self.source.link().await {
            Ok(link) => link,
            Err(e) => {
                warn!(scenario = %self.config.scenario_name, error = %e, "Failed to read wireless statistics");
                WifiLink::default()
            }
        }
    }

    fn evaluate(&mut self, sample: WifiLink, _now: Instant) -> Verdict {
        let rssi_low = breaches(&mut self.rssi, sample.rssi, self.config.rssi_margin);
        let quality_low = breaches(
            &mut self.link_quality,
            sample.link_quality_pct,
            self.config.link_quality_margin,
        );

        if !(rssi_low || quality_low) {
            debug!(rssi = ?sample.rssi, link_quality = ?sample.link_quality_pct, "Link quality normal");
            return Verdict::Normal;
        }

        let mut signals = Vec::new();
        if rssi_low {
            signals.push("RSSI");
        }
        if quality_low {
            signals.push("link quality");
        }

        Verdict::Anomalous(Anomaly::new(format!(
            "Link quality issue detected ({} below baseline). {}",
            signals.join(", "),
            ADJUSTING_MESSAGE
        )))
    }

    fn cooldown(&self) -> Duration {
        Duration::from_secs(self.config.cooldown_secs)
    }
}

/// Signal values parsed from one LoRa packet line
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LoraSignal {
    pub rssi: Reading,
    pub snr: Reading,
    pub spreading_factor: Reading,
}

fn rssi_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"RSSI: (-?\d+) dBm").expect("valid RSSI pattern"))
}

fn snr_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"SNR: (-?\d+(?:\.\d+)?) dB").expect("valid SNR pattern"))
}

fn sf_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"SF: (\d+)").expect("valid SF pattern"))
}

fn capture(re: &Regex, line: &str) -> Reading {
    re.captures(line)?.get(1)?.as_str().parse().ok()
}

/// Extract RSSI (`RSSI: -87 dBm`), SNR (`SNR: 7.25 dB`) and spreading
/// factor (`SF: 7`) from a packet line. Missing fields are `None`.
pub fn parse_lora_packet(line: &str) -> LoraSignal {
    LoraSignal {
        rssi: capture(rssi_pattern(), line),
        snr: capture(snr_pattern(), line),
        spreading_factor: capture(sf_pattern(), line),
    }
}

/// Detects degraded LoRa links from serial radio packets
pub struct LoraLinkDetector {
    config: LinkQualityConfig,
    radio: Box<dyn RadioSource>,
    rssi: SlidingWindow,
    snr: SlidingWindow,
    spreading_factor: SlidingWindow,
}

impl LoraLinkDetector {
    pub fn new(config: LinkQualityConfig, radio: Box<dyn RadioSource>) -> Self {
        let capacity = config.history_size;
        Self {
            config,
            radio,
            rssi: SlidingWindow::new(capacity),
            snr: SlidingWindow::new(capacity),
            spreading_factor: SlidingWindow::new(capacity),
        }
    }

    pub fn spreading_factor_window(&self) -> &SlidingWindow {
        &self.spreading_factor
    }
}

#[async_trait]
impl ScenarioDetector for LoraLinkDetector {
    type Sample = LoraSignal;

    fn sample_missing(&self, sample: &LoraSignal) -> bool {
        *sample == LoraSignal::default()
    }

    fn name(&self) -> &str {
        &self.config.scenario_name
    }

    async fn initialize(&mut self) -> Result<()> {
        self.radio.initialize().await
    }

    async fn sample(&mut self) -> LoraSignal {
        match self.radio.read_packet().await {
            Ok(Some(line)) => parse_lora_packet(&line),
            Ok(None) => {
                debug!("No LoRa packet received this round");
                LoraSignal::default()
            }
            Err(e) => {
                warn!(scenario = %self.config.scenario_name, error = %e, "Failed to read LoRa packet");
                LoraSignal::default()
            }
        }
    }

    fn evaluate(&mut self, sample: LoraSignal, _now: Instant) -> Verdict {
        let rssi_low = breaches(&mut self.rssi, sample.rssi, self.config.rssi_margin);
        let snr_low = breaches(&mut self.snr, sample.snr, self.config.snr_margin);
        let sf_low = match self.config.sf_margin {
            Some(margin) => breaches(&mut self.spreading_factor, sample.spreading_factor, margin),
            None => {
                self.spreading_factor.observe(sample.spreading_factor);
                false
            }
        };

        if !(rssi_low || snr_low || sf_low) {
            return Verdict::Normal;
        }

        let signals: Vec<&str> = [(rssi_low, "RSSI"), (snr_low, "SNR"), (sf_low, "SF")]
            .into_iter()
            .filter_map(|(low, name)| low.then_some(name))
            .collect();

        Verdict::Anomalous(Anomaly::new(format!(
            "LoRa link quality issue detected ({} below baseline). {}",
            signals.join(", "),
            ADJUSTING_MESSAGE
        )))
    }

    fn cooldown(&self) -> Duration {
        Duration::from_secs(self.config.cooldown_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FixedWireless, ScriptedRadio};

    fn wifi(rssi: f64, quality: f64) -> WifiLink {
        WifiLink {
            rssi: Some(rssi),
            link_quality_pct: Some(quality),
        }
    }

    fn wifi_detector() -> WifiLinkDetector {
        WifiLinkDetector::new(LinkQualityConfig::default(), Box::new(FixedWireless(None)))
    }

    #[test]
    fn test_parse_lora_packet() {
        let signal = parse_lora_packet("RX ok RSSI: -87 dBm, SNR: 7.25 dB, SF: 7");
        assert_eq!(signal.rssi, Some(-87.0));
        assert_eq!(signal.snr, Some(7.25));
        assert_eq!(signal.spreading_factor, Some(7.0));

        let partial = parse_lora_packet("SNR: -3 dB");
        assert_eq!(partial.rssi, None);
        assert_eq!(partial.snr, Some(-3.0));
        assert_eq!(partial.spreading_factor, None);

        assert_eq!(parse_lora_packet("garbage"), LoraSignal::default());
    }

    #[test]
    fn test_first_sample_never_triggers() {
        let mut d = wifi_detector();
        assert_eq!(d.evaluate(wifi(-95.0, 5.0), Instant::now()), Verdict::Normal);
    }

    #[test]
    fn test_rssi_drop_below_baseline_triggers() {
        let mut d = wifi_detector();
        let now = Instant::now();

        // Stable quality so only RSSI can move
        for rssi in [-60.0, -62.0, -61.0, -63.0, -65.0] {
            assert_eq!(d.evaluate(wifi(rssi, 80.0), now), Verdict::Normal);
        }

        // Window becomes [-60,-62,-61,-63,-65,-70], mean -63.5, threshold -68.5
        let verdict = d.evaluate(wifi(-70.0, 80.0), now);
        let anomaly = verdict.anomaly().unwrap();
        assert!(anomaly.reason.contains("RSSI"));
        assert!(anomaly.reason.ends_with(ADJUSTING_MESSAGE));
    }

    #[test]
    fn test_reading_near_baseline_is_normal() {
        let mut d = wifi_detector();
        let now = Instant::now();

        for rssi in [-60.0, -62.0, -61.0, -63.0, -65.0] {
            d.evaluate(wifi(rssi, 80.0), now);
        }

        assert_eq!(d.evaluate(wifi(-65.0, 80.0), now), Verdict::Normal);
        assert_eq!(d.rssi_window().len(), 6);
    }

    #[test]
    fn test_either_signal_triggers_once() {
        let mut d = wifi_detector();
        let now = Instant::now();

        for _ in 0..5 {
            d.evaluate(wifi(-60.0, 80.0), now);
        }

        let verdict = d.evaluate(wifi(-60.0, 40.0), now);
        let reason = &verdict.anomaly().unwrap().reason;
        assert!(reason.contains("link quality"));
        assert!(!reason.contains("RSSI"));
    }

    #[test]
    fn test_absent_values_are_not_recorded() {
        let mut d = wifi_detector();
        d.evaluate(WifiLink::default(), Instant::now());

        assert!(d.rssi_window().is_empty());
        assert!(d.link_quality_window().is_empty());
    }

    #[tokio::test]
    async fn test_lora_missing_port_fails_initialize() {
        let mut d = LoraLinkDetector::new(
            LinkQualityConfig::default(),
            Box::new(ScriptedRadio::new(vec![]).missing()),
        );

        assert!(d.initialize().await.is_err());
    }

    #[tokio::test]
    async fn test_lora_snr_drop_triggers() {
        let mut lines: Vec<Option<String>> = (0..4)
            .map(|_| Some("RSSI: -80 dBm, SNR: 9.0 dB, SF: 7".to_string()))
            .collect();
        lines.push(Some("RSSI: -80 dBm, SNR: 2.0 dB, SF: 7".to_string()));

        let mut d = LoraLinkDetector::new(
            LinkQualityConfig {
                communication_type: CommunicationType::Lora,
                ..Default::default()
            },
            Box::new(ScriptedRadio::new(lines)),
        );
        d.initialize().await.unwrap();

        let now = Instant::now();
        for _ in 0..4 {
            let sample = d.sample().await;
            assert_eq!(d.evaluate(sample, now), Verdict::Normal);
        }

        let sample = d.sample().await;
        let verdict = d.evaluate(sample, now);
        assert!(verdict.anomaly().unwrap().reason.contains("SNR"));
        // SF tracked without a margin
        assert_eq!(d.spreading_factor_window().len(), 5);
    }

    #[tokio::test]
    async fn test_lora_no_packet_is_normal() {
        let mut d = LoraLinkDetector::new(
            LinkQualityConfig::default(),
            Box::new(ScriptedRadio::new(vec![None])),
        );
        d.initialize().await.unwrap();

        let sample = d.sample().await;
        assert_eq!(sample, LoraSignal::default());
        assert_eq!(d.evaluate(sample, Instant::now()), Verdict::Normal);
    }
}
