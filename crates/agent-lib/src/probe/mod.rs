//! Sampling collaborators
//!
//! Each scenario reads its signals through one of these traits. The Linux
//! implementations read sysfs/procfs or shell out to standard tools; tests
//! substitute in-memory fakes. Every call returns `anyhow::Result` so the
//! detector can degrade a failure to an absent reading.

mod command;
mod serial;
mod sysfs;


pub use command::{detect_primary_interface, parse_tx_bitrate, PingProbe, FALLBACK_INTERFACE};
pub use serial::SerialRadio;
pub use sysfs::{
    parse_proc_wireless, IioClimateSensor, LinuxInterface, ProcWireless, ThermalZone,
    DEFAULT_IIO_DEVICE, DEFAULT_THERMAL_ZONE,
};

use anyhow::Result;

use crate::models::Reading;

pub use async_trait::async_trait;

/// Humidity/temperature pair from a climate sensor
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ClimateReading {
    pub humidity: Reading,
    pub temperature: Reading,
}

impl ClimateReading {
    /// Both values were read
    pub fn is_complete(&self) -> bool {
        self.humidity.is_some() && self.temperature.is_some()
    }
}

/// Wireless link statistics for one interface
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WifiLink {
    /// Signal level in dBm
    pub rssi: Reading,
    /// Link quality as a percentage of the driver maximum
    pub link_quality_pct: Reading,
}

/// Device/CPU temperature reader
#[async_trait]
pub trait TemperatureSource: Send + Sync {
    async fn read_celsius(&self) -> Result<f64>;
}

/// Humidity/temperature sensor that must be opened before reading
#[async_trait]
pub trait ClimateSensor: Send + Sync {
    /// Acquire the device. Fails when the hardware is absent.
    async fn initialize(&mut self) -> Result<()>;

    async fn read(&mut self) -> Result<ClimateReading>;
}

/// Wireless interface statistics
#[async_trait]
pub trait WirelessSource: Send + Sync {
    async fn link(&self) -> Result<WifiLink>;
}

/// Serial radio delivering one text packet per line
#[async_trait]
pub trait RadioSource: Send + Sync {
    /// Open the port. Fails when the port is missing.
    async fn initialize(&mut self) -> Result<()>;

    /// Next packet line, or `None` when nothing arrived in time
    async fn read_packet(&mut self) -> Result<Option<String>>;
}

/// Transmit counters for a network interface
#[async_trait]
pub trait InterfaceCounters: Send + Sync {
    /// Cumulative transmitted packet count
    async fn tx_packets(&self) -> Result<u64>;

    /// Current transmission speed in bytes per second
    async fn tx_rate_bytes_per_sec(&self) -> Result<f64>;
}

/// Connectivity check against a peer
#[async_trait]
pub trait ReachabilityProbe: Send + Sync {
    async fn is_reachable(&self) -> Result<bool>;
}
