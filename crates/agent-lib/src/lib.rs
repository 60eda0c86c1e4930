//! Self-healing agent library for edge nodes
//!
//! This crate provides the core functionality for:
//! - Sampling device, sensor and network state (probes)
//! - Adaptive per-scenario anomaly detection
//! - Cooldown-gated remediation driven by per-scenario loops
//! - Durable alert storage and best-effort forwarding
//! - Health checks and observability

pub mod alerts;
pub mod health;
pub mod models;
pub mod monitor;
pub mod observability;
pub mod probe;
pub mod scenario;

#[cfg(test)]
mod testing;

pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::{AgentMetrics, RemediationOutcome, StructuredLogger};
