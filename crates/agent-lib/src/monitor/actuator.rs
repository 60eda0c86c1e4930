//! Cooldown-gated remediation

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use tokio::process::Command;
use tracing::{info, warn};

/// Local corrective action for a scenario
#[async_trait]
pub trait Remediation: Send + Sync {
    /// Short description for logs
    fn describe(&self) -> String;

    async fn remediate(&self) -> Result<()>;
}

/// Announces the action without touching the system
pub struct LogRemediation {
    action: String,
}

impl LogRemediation {
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
        }
    }
}

#[async_trait]
impl Remediation for LogRemediation {
    fn describe(&self) -> String {
        self.action.clone()
    }

    async fn remediate(&self) -> Result<()> {
        info!(action = %self.action, "Remediation requested");
        Ok(())
    }
}

/// Runs an operator-configured shell command
pub struct CommandRemediation {
    command: String,
    timeout: Duration,
}

impl CommandRemediation {
    pub fn new(command: impl Into<String>, timeout: Duration) -> Self {
        Self {
            command: command.into(),
            timeout,
        }
    }
}

#[async_trait]
impl Remediation for CommandRemediation {
    fn describe(&self) -> String {
        self.command.clone()
    }

    async fn remediate(&self) -> Result<()> {
        let output = tokio::time::timeout(
            self.timeout,
            Command::new("sh").arg("-c").arg(&self.command).output(),
        )
        .await
        .with_context(|| format!("Remediation timed out: {}", self.command))?
        .with_context(|| format!("Failed to run remediation: {}", self.command))?;

        if !output.status.success() {
            bail!(
                "Remediation exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        Ok(())
    }
}

/// Whether a trigger ran the remediation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Fired,
    Suppressed,
}

/// Fires a remediation at most once per cooldown window
pub struct CooldownActuator {
    remediation: Arc<dyn Remediation>,
    cooldown: Duration,
    last_fired: Option<Instant>,
}

impl CooldownActuator {
    pub fn new(remediation: Arc<dyn Remediation>, cooldown: Duration) -> Self {
        Self {
            remediation,
            cooldown,
            last_fired: None,
        }
    }

    pub fn describe(&self) -> String {
        self.remediation.describe()
    }

    pub fn last_fired(&self) -> Option<Instant> {
        self.last_fired
    }

    /// Run the remediation unless it fired less than `cooldown` ago.
    ///
    /// A failed remediation still counts as fired.
    pub async fn trigger(&mut self, now: Instant) -> Trigger {
        if let Some(last) = self.last_fired {
            if now.saturating_duration_since(last) < self.cooldown {
                return Trigger::Suppressed;
            }
        }

        self.last_fired = Some(now);
        if let Err(e) = self.remediation.remediate().await {
            warn!(action = %self.remediation.describe(), error = %e, "Remediation failed");
        }

        Trigger::Fired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::CountingRemediation;

    #[tokio::test]
    async fn test_first_trigger_always_fires() {
        let remediation = Arc::new(CountingRemediation::default());
        let mut actuator = CooldownActuator::new(remediation.clone(), Duration::from_secs(3600));

        assert_eq!(actuator.trigger(Instant::now()).await, Trigger::Fired);
        assert_eq!(remediation.calls(), 1);
    }

    #[tokio::test]
    async fn test_cooldown_suppresses_until_elapsed() {
        let remediation = Arc::new(CountingRemediation::default());
        let mut actuator = CooldownActuator::new(remediation.clone(), Duration::from_secs(30));
        let start = Instant::now();

        assert_eq!(actuator.trigger(start).await, Trigger::Fired);
        assert_eq!(
            actuator.trigger(start + Duration::from_secs(10)).await,
            Trigger::Suppressed
        );
        assert_eq!(
            actuator.trigger(start + Duration::from_secs(30)).await,
            Trigger::Fired
        );
        assert_eq!(remediation.calls(), 2);
    }

    #[tokio::test]
    async fn test_zero_cooldown_fires_every_time() {
        let remediation = Arc::new(CountingRemediation::default());
        let mut actuator = CooldownActuator::new(remediation.clone(), Duration::ZERO);
        let now = Instant::now();

        for _ in 0..3 {
            assert_eq!(actuator.trigger(now).await, Trigger::Fired);
        }
        assert_eq!(remediation.calls(), 3);
    }

    #[tokio::test]
    async fn test_failed_remediation_counts_as_fired() {
        let remediation = Arc::new(CountingRemediation::failing());
        let mut actuator = CooldownActuator::new(remediation.clone(), Duration::from_secs(30));
        let start = Instant::now();

        assert_eq!(actuator.trigger(start).await, Trigger::Fired);
        assert_eq!(actuator.last_fired(), Some(start));
        assert_eq!(
            actuator.trigger(start + Duration::from_secs(1)).await,
            Trigger::Suppressed
        );
    }

    #[tokio::test]
    async fn test_command_remediation_reports_exit_status() {
        let ok = CommandRemediation::new("true", Duration::from_secs(5));
        tokio_test::assert_ok!(ok.remediate().await);

        let failing = CommandRemediation::new("exit 3", Duration::from_secs(5));
        tokio_test::assert_err!(failing.remediate().await);
    }
}
