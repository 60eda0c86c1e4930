//! File-backed probes (sysfs and procfs)

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::fs;
use tracing::debug;

use super::{
    async_trait, command, ClimateReading, ClimateSensor, InterfaceCounters, TemperatureSource,
    WifiLink, WirelessSource,
};

/// Default thermal zone for the SoC temperature
pub const DEFAULT_THERMAL_ZONE: &str = "/sys/class/thermal/thermal_zone0/temp";

/// Default IIO device exposed by the kernel DHT11/DHT22 driver
pub const DEFAULT_IIO_DEVICE: &str = "/sys/bus/iio/devices/iio:device0";

/// Maximum link quality reported by most wireless drivers
const DEFAULT_MAX_LINK_QUALITY: f64 = 70.0;

/// Read a file holding one integer in milli-units
async fn read_milli(path: &Path) -> Result<f64> {
    let content = fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let raw: i64 = content
        .trim()
        .parse()
        .with_context(|| format!("Failed to parse {}", path.display()))?;

    Ok(raw as f64 / 1000.0)
}

/// Temperature from a thermal zone (`temp` file in milli-degrees)
pub struct ThermalZone {
    path: PathBuf,
}

impl ThermalZone {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Default for ThermalZone {
    fn default() -> Self {
        Self::new(DEFAULT_THERMAL_ZONE)
    }
}

#[async_trait]
impl TemperatureSource for ThermalZone {
    async fn read_celsius(&self) -> Result<f64> {
        read_milli(&self.path).await
    }
}

/// DHT-class sensor through the Linux IIO interface
pub struct IioClimateSensor {
    device_dir: PathBuf,
    ready: bool,
}

impl IioClimateSensor {
    pub fn new(device_dir: impl Into<PathBuf>) -> Self {
        Self {
            device_dir: device_dir.into(),
            ready: false,
        }
    }

    async fn read_channel(&self, file: &str) -> Option<f64> {
        match read_milli(&self.device_dir.join(file)).await {
            Ok(value) => Some(value),
            Err(e) => {
                // The DHT driver returns EIO on checksum/timing errors
                debug!(error = %e, "Sensor channel read failed");
                None
            }
        }
    }
}

#[async_trait]
impl ClimateSensor for IioClimateSensor {
    async fn initialize(&mut self) -> Result<()> {
        let metadata = fs::metadata(&self.device_dir)
            .await
            .with_context(|| format!("Sensor device {} not found", self.device_dir.display()))?;

        if !metadata.is_dir() {
            anyhow::bail!("Sensor device {} is not a directory", self.device_dir.display());
        }

        self.ready = true;
        Ok(())
    }

    async fn read(&mut self) -> Result<ClimateReading> {
        if !self.ready {
            anyhow::bail!("Sensor not initialized");
        }

        Ok(ClimateReading {
            humidity: self.read_channel("in_humidityrelative_input").await,
            temperature: self.read_channel("in_temp_input").await,
        })
    }
}

/// Wireless statistics from `/proc/net/wireless`
pub struct ProcWireless {
    interface: String,
    path: PathBuf,
}

impl ProcWireless {
    pub fn new(interface: impl Into<String>) -> Self {
        Self::with_path(interface, "/proc/net/wireless")
    }

    pub fn with_path(interface: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            interface: interface.into(),
            path: path.into(),
        }
    }
}

#[async_trait]
impl WirelessSource for ProcWireless {
    async fn link(&self) -> Result<WifiLink> {
        let content = fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read {}", self.path.display()))?;

        parse_proc_wireless(&content, &self.interface)
            .ok_or_else(|| anyhow::anyhow!("Interface {} not listed in {}", self.interface, self.path.display()))
    }
}

/// Parse the row for `interface` out of `/proc/net/wireless`.
///
/// Row layout: `wlan0: 0000   54.  -56.  -256  0 0 0 0 0 0`
/// (status, link quality, signal level, noise, ...).
pub fn parse_proc_wireless(content: &str, interface: &str) -> Option<WifiLink> {
    let row = content.lines().find_map(|line| {
        let (name, rest) = line.trim().split_once(':')?;
        (name == interface).then_some(rest)
    })?;

    let mut fields = row.split_whitespace().skip(1);
    let parse = |field: Option<&str>| -> Option<f64> { field?.trim_end_matches('.').parse().ok() };

    let link_quality = parse(fields.next());
    let rssi = parse(fields.next());

    Some(WifiLink {
        rssi,
        link_quality_pct: link_quality
            .map(|q| ((q / DEFAULT_MAX_LINK_QUALITY) * 100.0 * 100.0).round() / 100.0),
    })
}

/// Network interface counters from sysfs plus bitrate from `iw`
pub struct LinuxInterface {
    name: String,
    sys_net: PathBuf,
}

impl LinuxInterface {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_sys_root(name, "/sys/class/net")
    }

    pub fn with_sys_root(name: impl Into<String>, sys_net: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            sys_net: sys_net.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

#[async_trait]
impl InterfaceCounters for LinuxInterface {
    async fn tx_packets(&self) -> Result<u64> {
        let path = self
            .sys_net
            .join(&self.name)
            .join("statistics")
            .join("tx_packets");

        let content = fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;

        content
            .trim()
            .parse()
            .with_context(|| format!("Failed to parse {}", path.display()))
    }

    async fn tx_rate_bytes_per_sec(&self) -> Result<f64> {
        let output = tokio::process::Command::new("iw")
            .args(["dev", &self.name, "link"])
            .output()
            .await
            .context("Failed to run iw")?;

        if !output.status.success() {
            anyhow::bail!("iw exited with {}", output.status);
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let mbps = command::parse_tx_bitrate(&stdout)
            .ok_or_else(|| anyhow::anyhow!("No tx bitrate reported for {}", self.name))?;

        Ok(mbps * 1e6 / 8.0)
    }
}
