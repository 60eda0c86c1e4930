//! Common detector capability driven by the monitor loop

use std::time::{Duration, Instant};

use anyhow::Result;

pub use async_trait::async_trait;

/// Why a round was classified as anomalous
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Anomaly {
    /// Alert message
    pub reason: String,
    /// Whether the remediation action should be attempted for this anomaly
    pub remediate: bool,
}

impl Anomaly {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            remediate: true,
        }
    }

    /// An anomaly that is alerted but does not warrant remediation
    pub fn alert_only(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            remediate: false,
        }
    }
}

/// Classification of one sampling round
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Normal,
    Anomalous(Anomaly),
}

impl Verdict {
    pub fn is_anomalous(&self) -> bool {
        matches!(self, Verdict::Anomalous(_))
    }

    pub fn anomaly(&self) -> Option<&Anomaly> {
        match self {
            Verdict::Anomalous(anomaly) => Some(anomaly),
            Verdict::Normal => None,
        }
    }
}

/// One monitored condition: sample, update baselines, classify
///
/// `sample` talks to the outside world and must never fail; collaborator
/// errors degrade to absent readings inside the sample. `evaluate` is pure
/// bookkeeping on the detector's own state.
#[async_trait]
pub trait ScenarioDetector: Send {
    /// Readings collected in one round
    type Sample: Send;

    /// Scenario name, used as the alert category
    fn name(&self) -> &str;

    /// Acquire the underlying device. An error disables this scenario.
    async fn initialize(&mut self) -> Result<()> {
        Ok(())
    }

    /// Collect this round's readings
    async fn sample(&mut self) -> Self::Sample;

    /// Whether the collaborator produced nothing usable this round
    fn sample_missing(&self, _sample: &Self::Sample) -> bool {
        false
    }

    /// Classify the round, updating baselines before comparing
    fn evaluate(&mut self, sample: Self::Sample, now: Instant) -> Verdict;

    /// Minimum time between two remediation actions
    fn cooldown(&self) -> Duration {
        Duration::ZERO
    }

    /// Called once an anomaly has been alerted and acted upon
    fn after_alert(&mut self, _now: Instant) {}
}
