//! Scenario scheduling and remediation
//!
//! One [`MonitorLoop`] per enabled scenario, each gated by its own
//! [`CooldownActuator`].

mod actuator;
mod r#loop;

pub use actuator::{CommandRemediation, CooldownActuator, LogRemediation, Remediation, Trigger};
pub use r#loop::{LoopState, MonitorLoop, RoundOutcome};
