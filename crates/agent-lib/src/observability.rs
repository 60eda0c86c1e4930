//! Observability infrastructure for the self-healing agent
//!
//! Provides:
//! - Prometheus metrics (per-scenario rounds and anomalies, remediation
//!   outcomes, alert store and forwarding counters, round latency)
//! - Structured JSON lifecycle events with tracing

use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, register_int_gauge,
    HistogramVec, IntCounter, IntCounterVec, IntGauge,
};
use std::sync::OnceLock;
use tracing::{error, info, warn};

/// Histogram buckets for round latency (in seconds). Rounds include sensor
/// retries and measurement windows, so they span milliseconds to minutes.
const ROUND_LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.01, 0.05, 0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<AgentMetricsInner> = OnceLock::new();

struct AgentMetricsInner {
    rounds_total: IntCounterVec,
    anomalies_total: IntCounterVec,
    sample_failures_total: IntCounterVec,
    remediations_total: IntCounterVec,
    round_latency_seconds: HistogramVec,
    alerts_stored: IntGauge,
    alert_store_errors: IntCounter,
    alerts_forwarded: IntCounter,
    alert_forward_failures: IntCounter,
    alert_forwards_dropped: IntCounter,
}

impl AgentMetricsInner {
    fn new() -> Self {
        Self {
            rounds_total: register_int_counter_vec!(
                "edge_healer_rounds_total",
                "Monitoring rounds completed per scenario",
                &["scenario"]
            )
            .expect("Failed to register rounds_total"),

            anomalies_total: register_int_counter_vec!(
                "edge_healer_anomalies_total",
                "Anomalies detected per scenario",
                &["scenario"]
            )
            .expect("Failed to register anomalies_total"),

            sample_failures_total: register_int_counter_vec!(
                "edge_healer_sample_failures_total",
                "Scenario initialization or sampling failures",
                &["scenario"]
            )
            .expect("Failed to register sample_failures_total"),

            remediations_total: register_int_counter_vec!(
                "edge_healer_remediations_total",
                "Remediation triggers per scenario and outcome",
                &["scenario", "outcome"]
            )
            .expect("Failed to register remediations_total"),

            round_latency_seconds: register_histogram_vec!(
                "edge_healer_round_latency_seconds",
                "Time spent sampling and evaluating one round",
                &["scenario"],
                ROUND_LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register round_latency_seconds"),

            alerts_stored: register_int_gauge!(
                "edge_healer_alerts_stored",
                "Alert records currently held in the local store"
            )
            .expect("Failed to register alerts_stored"),

            alert_store_errors: register_int_counter!(
                "edge_healer_alert_store_errors_total",
                "Failed writes of the local alert store"
            )
            .expect("Failed to register alert_store_errors"),

            alerts_forwarded: register_int_counter!(
                "edge_healer_alerts_forwarded_total",
                "Alerts delivered to the downstream collector"
            )
            .expect("Failed to register alerts_forwarded"),

            alert_forward_failures: register_int_counter!(
                "edge_healer_alert_forward_failures_total",
                "Alerts the downstream collector did not accept"
            )
            .expect("Failed to register alert_forward_failures"),

            alert_forwards_dropped: register_int_counter!(
                "edge_healer_alert_forwards_dropped_total",
                "Alerts dropped because the forward queue was full"
            )
            .expect("Failed to register alert_forwards_dropped"),
        }
    }
}

/// Remediation trigger outcome label
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemediationOutcome {
    Fired,
    Suppressed,
}

impl RemediationOutcome {
    fn as_str(&self) -> &'static str {
        match self {
            RemediationOutcome::Fired => "fired",
            RemediationOutcome::Suppressed => "suppressed",
        }
    }
}

/// Agent metrics for Prometheus exposition
///
/// This is a lightweight handle to the global metrics instance.
/// Multiple clones share the same underlying metrics.
#[derive(Clone)]
pub struct AgentMetrics {
    _private: (),
}

impl Default for AgentMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(AgentMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &AgentMetricsInner {
        GLOBAL_METRICS.get_or_init(AgentMetricsInner::new)
    }

    /// Record a completed round and its latency
    pub fn observe_round(&self, scenario: &str, duration_secs: f64) {
        self.inner().rounds_total.with_label_values(&[scenario]).inc();
        self.inner()
            .round_latency_seconds
            .with_label_values(&[scenario])
            .observe(duration_secs);
    }

    pub fn inc_anomalies(&self, scenario: &str) {
        self.inner().anomalies_total.with_label_values(&[scenario]).inc();
    }

    pub fn inc_sample_failures(&self, scenario: &str) {
        self.inner()
            .sample_failures_total
            .with_label_values(&[scenario])
            .inc();
    }

    pub fn inc_remediation(&self, scenario: &str, outcome: RemediationOutcome) {
        self.inner()
            .remediations_total
            .with_label_values(&[scenario, outcome.as_str()])
            .inc();
    }

    pub fn set_alerts_stored(&self, count: i64) {
        self.inner().alerts_stored.set(count);
    }

    pub fn inc_alert_store_errors(&self) {
        self.inner().alert_store_errors.inc();
    }

    pub fn inc_alerts_forwarded(&self) {
        self.inner().alerts_forwarded.inc();
    }

    pub fn inc_alert_forward_failures(&self) {
        self.inner().alert_forward_failures.inc();
    }

    pub fn inc_alert_forwards_dropped(&self) {
        self.inner().alert_forwards_dropped.inc();
    }
}

/// Structured logger for agent events
///
/// Emits canonical `event = ...` records tagged with the device id so
/// alerts from many nodes can be correlated downstream.
#[derive(Clone)]
pub struct StructuredLogger {
    device_id: String,
}

impl StructuredLogger {
    pub fn new(device_id: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
        }
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Log agent startup
    pub fn log_startup(&self, version: &str, scenarios: &[String]) {
        info!(
            event = "agent_started",
            device_id = %self.device_id,
            agent_version = %version,
            scenarios = ?scenarios,
            "Edge healer started"
        );
    }

    /// Log agent shutdown
    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "agent_shutdown",
            device_id = %self.device_id,
            reason = %reason,
            "Edge healer shutting down"
        );
    }

    pub fn log_anomaly(&self, scenario: &str, reason: &str) {
        warn!(
            event = "anomaly_detected",
            device_id = %self.device_id,
            scenario = %scenario,
            reason = %reason,
            "Anomaly detected"
        );
    }

    pub fn log_remediation(&self, scenario: &str, action: &str, outcome: RemediationOutcome) {
        match outcome {
            RemediationOutcome::Fired => info!(
                event = "remediation_fired",
                device_id = %self.device_id,
                scenario = %scenario,
                action = %action,
                "Remediation triggered"
            ),
            RemediationOutcome::Suppressed => info!(
                event = "remediation_suppressed",
                device_id = %self.device_id,
                scenario = %scenario,
                action = %action,
                "Remediation suppressed by cooldown"
            ),
        }
    }

    /// Log a scenario that stopped scheduling after failing to initialize
    pub fn log_scenario_disabled(&self, scenario: &str, reason: &str) {
        error!(
            event = "scenario_disabled",
            device_id = %self.device_id,
            scenario = %scenario,
            reason = %reason,
            "Scenario disabled"
        );
    }

    /// Log the outcome of forwarding one alert downstream
    pub fn log_forward(&self, scenario: &str, delivered: bool, detail: &str) {
        if delivered {
            info!(
                event = "alert_forwarded",
                device_id = %self.device_id,
                scenario = %scenario,
                "Alert forwarded"
            );
        } else {
            warn!(
                event = "alert_forward_failed",
                device_id = %self.device_id,
                scenario = %scenario,
                error = %detail,
                "Failed to forward alert"
            );
        }
    }
}
