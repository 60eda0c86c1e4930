//! Scenario detectors
//!
//! Each detector owns its baselines and collaborators. The monitor loop
//! drives them through [`ScenarioDetector`].

pub mod baseline;
pub mod detector;
pub mod duty_cycle;
pub mod link_quality;
pub mod power;
pub mod reachability;
pub mod sensor;

pub use baseline::{SlidingWindow, DEFAULT_HISTORY_SIZE};
pub use detector::{Anomaly, ScenarioDetector, Verdict};
pub use duty_cycle::{DutyCycleConfig, DutyCycleDetector};
pub use link_quality::{
    parse_lora_packet, CommunicationType, LinkQualityConfig, LoraLinkDetector, LoraSignal,
    WifiLinkDetector,
};
pub use power::{PowerConfig, PowerDetector, PowerStatus};
pub use reachability::{ReachabilityConfig, ReachabilityDetector};
pub use sensor::{InitFailurePolicy, SensorConfig, SensorDetector, SensorSample};
