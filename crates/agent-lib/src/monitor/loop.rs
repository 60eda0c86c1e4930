//! Per-scenario monitoring loop
//!
//! Each scenario runs its own loop: sample, evaluate, act, sleep. Rounds of
//! one scenario never overlap. Shutdown is honoured while sampling or
//! sleeping; an evaluation or action phase in progress always completes.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::broadcast;
use tracing::{debug, info};

use super::actuator::{CooldownActuator, Remediation, Trigger};
use crate::alerts::AlertDispatcher;
use crate::health::HealthRegistry;
use crate::models::AlertRecord;
use crate::observability::{AgentMetrics, RemediationOutcome, StructuredLogger};
use crate::scenario::{ScenarioDetector, Verdict};

/// Phase of a monitor loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Sampling,
    Evaluating,
    Acting,
    Sleeping,
    /// Initialization failed; the loop no longer runs
    Disabled,
    Stopped,
}

/// What happened in one round
#[derive(Debug, Clone)]
pub struct RoundOutcome {
    pub verdict: Verdict,
    pub trigger: Option<Trigger>,
    pub alert: Option<AlertRecord>,
}

/// Drives one detector on a fixed interval
pub struct MonitorLoop<D: ScenarioDetector> {
    scenario: String,
    detector: D,
    actuator: CooldownActuator,
    dispatcher: AlertDispatcher,
    interval: Duration,
    state: LoopState,
    health: Option<HealthRegistry>,
    metrics: Option<AgentMetrics>,
    logger: Option<StructuredLogger>,
}

impl<D: ScenarioDetector> MonitorLoop<D> {
    /// Create a loop; the actuator uses the detector's cooldown.
    pub fn new(
        detector: D,
        remediation: Arc<dyn Remediation>,
        dispatcher: AlertDispatcher,
        interval: Duration,
    ) -> Self {
        let actuator = CooldownActuator::new(remediation, detector.cooldown());
        Self {
            scenario: detector.name().to_string(),
            detector,
            actuator,
            dispatcher,
            interval,
            state: LoopState::Sampling,
            health: None,
            metrics: None,
            logger: None,
        }
    }

    pub fn with_health(mut self, health: HealthRegistry) -> Self {
        self.health = Some(health);
        self
    }

    pub fn with_metrics(mut self, metrics: AgentMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn with_logger(mut self, logger: StructuredLogger) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn scenario(&self) -> &str {
        &self.scenario
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn detector(&self) -> &D {
        &self.detector
    }

    /// Run until shutdown. Returns the final state: `Disabled` when the
    /// detector could not be initialized, `Stopped` otherwise.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) -> LoopState {
        if let Some(health) = &self.health {
            health.register(&self.scenario).await;
        }

        if let Err(e) = self.detector.initialize().await {
            self.disable(&format!("{:#}", e)).await;
            return self.state;
        }

        info!(
            scenario = %self.scenario,
            interval_secs = self.interval.as_secs(),
            "Starting monitor loop"
        );

        loop {
            self.state = LoopState::Sampling;
            let sample = tokio::select! {
                sample = self.detector.sample() => sample,
                _ = shutdown.recv() => break,
            };

            self.complete_round(sample).await;

            self.state = LoopState::Sleeping;
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = shutdown.recv() => break,
            }
        }

        info!(scenario = %self.scenario, "Shutting down monitor loop");
        self.state = LoopState::Stopped;
        self.state
    }

    /// Run a single round without sleeping
    pub async fn run_round(&mut self) -> RoundOutcome {
        self.state = LoopState::Sampling;
        let sample = self.detector.sample().await;
        self.complete_round(sample).await
    }

    async fn complete_round(&mut self, sample: D::Sample) -> RoundOutcome {
        let started = Instant::now();
        self.state = LoopState::Evaluating;

        if self.detector.sample_missing(&sample) {
            if let Some(metrics) = &self.metrics {
                metrics.inc_sample_failures(&self.scenario);
            }
        }

        let verdict = self.detector.evaluate(sample, started);
        let mut outcome = RoundOutcome {
            verdict: verdict.clone(),
            trigger: None,
            alert: None,
        };

        if let Verdict::Anomalous(anomaly) = verdict {
            self.state = LoopState::Acting;

            if let Some(metrics) = &self.metrics {
                metrics.inc_anomalies(&self.scenario);
            }
            match &self.logger {
                Some(logger) => logger.log_anomaly(&self.scenario, &anomaly.reason),
                None => info!(scenario = %self.scenario, reason = %anomaly.reason, "Anomaly detected"),
            }

            // The alert is stored and queued before the action runs
            outcome.alert = Some(self.dispatcher.emit(&self.scenario, &anomaly.reason).await);

            if anomaly.remediate {
                let trigger = self.actuator.trigger(started).await;
                self.record_trigger(trigger);
                outcome.trigger = Some(trigger);
            }

            self.detector.after_alert(started);
        } else {
            debug!(scenario = %self.scenario, "Round normal");
        }

        if let Some(metrics) = &self.metrics {
            metrics.observe_round(&self.scenario, started.elapsed().as_secs_f64());
        }

        outcome
    }

    fn record_trigger(&self, trigger: Trigger) {
        let outcome = match trigger {
            Trigger::Fired => RemediationOutcome::Fired,
            Trigger::Suppressed => RemediationOutcome::Suppressed,
        };

        if let Some(metrics) = &self.metrics {
            metrics.inc_remediation(&self.scenario, outcome);
        }
        if let Some(logger) = &self.logger {
            logger.log_remediation(&self.scenario, &self.actuator.describe(), outcome);
        }
    }

    async fn disable(&mut self, reason: &str) {
        self.state = LoopState::Disabled;

        match &self.logger {
            Some(logger) => logger.log_scenario_disabled(&self.scenario, reason),
            None => tracing::error!(scenario = %self.scenario, reason, "Scenario disabled"),
        }
        if let Some(metrics) = &self.metrics {
            metrics.inc_sample_failures(&self.scenario);
        }
        if let Some(health) = &self.health {
            health.set_disabled(&self.scenario, reason).await;
        }
    }
}
