//! Probes backed by external commands

use std::time::Duration;

use anyhow::{Context, Result};
use tokio::process::Command;
use tracing::{debug, warn};

use super::{async_trait, ReachabilityProbe};

/// Interface used when the default route cannot be determined
pub const FALLBACK_INTERFACE: &str = "eth0";

/// ICMP reachability check through the system `ping`
pub struct PingProbe {
    target: String,
    count: u32,
    timeout: Duration,
}

impl PingProbe {
    pub fn new(target: impl Into<String>, count: u32, timeout: Duration) -> Self {
        Self {
            target: target.into(),
            count: count.max(1),
            timeout,
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    fn args(&self) -> Vec<String> {
        vec![
            "-c".to_string(),
            self.count.to_string(),
            "-W".to_string(),
            self.timeout.as_secs().max(1).to_string(),
            self.target.clone(),
        ]
    }
}

#[async_trait]
impl ReachabilityProbe for PingProbe {
    async fn is_reachable(&self) -> Result<bool> {
        let output = Command::new("ping")
            .args(self.args())
            .output()
            .await
            .context("Failed to run ping")?;

        if !output.status.success() {
            debug!(
                target = %self.target,
                status = %output.status,
                "Ping did not get a reply"
            );
        }

        Ok(output.status.success())
    }
}

/// Extract the transmit bitrate in Mbit/s from `iw dev <if> link` output
/// (`tx bitrate: 72.2 MBit/s`) or `iwconfig` output (`Bit Rate=72.2 Mb/s`).
pub fn parse_tx_bitrate(output: &str) -> Option<f64> {
    output.lines().find_map(|line| {
        let line = line.trim();
        let value = line
            .strip_prefix("tx bitrate:")
            .or_else(|| line.split_once("Bit Rate=").map(|(_, rest)| rest))?;

        value.split_whitespace().next()?.parse().ok()
    })
}

/// Find the interface carrying the default route (`ip route`), falling
/// back to `eth0`.
pub async fn detect_primary_interface() -> String {
    match Command::new("ip").arg("route").output().await {
        Ok(output) if output.status.success() => {
            let stdout = String::from_utf8_lossy(&output.stdout);
            if let Some(iface) = parse_default_route(&stdout) {
                return iface;
            }
            warn!("No default route found, using {}", FALLBACK_INTERFACE);
        }
        Ok(output) => {
            warn!(status = %output.status, "ip route failed, using {}", FALLBACK_INTERFACE);
        }
        Err(e) => {
            warn!(error = %e, "Error detecting network interface, using {}", FALLBACK_INTERFACE);
        }
    }

    FALLBACK_INTERFACE.to_string()
}

/// `default via 192.168.1.1 dev wlan0 proto dhcp ...` -> `wlan0`
pub(crate) fn parse_default_route(output: &str) -> Option<String> {
    output
        .lines()
        .filter(|line| line.starts_with("default"))
        .find_map(|line| {
            let mut words = line.split_whitespace();
            words.find(|w| *w == "dev")?;
            words.next().map(str::to_string)
        })
}
