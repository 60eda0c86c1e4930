//! In-memory collaborators for unit tests

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};

use crate::monitor::Remediation;
use crate::probe::{
    async_trait, ClimateReading, ClimateSensor, InterfaceCounters, RadioSource,
    ReachabilityProbe, TemperatureSource, WifiLink, WirelessSource,
};

/// Temperature source returning a fixed value, or an error when `None`
pub struct FixedTemperature(pub Option<f64>);

#[async_trait]
impl TemperatureSource for FixedTemperature {
    async fn read_celsius(&self) -> Result<f64> {
        self.0.ok_or_else(|| anyhow!("thermal zone unavailable"))
    }
}

/// Climate sensor replaying scripted reads. `Err(())` simulates a failed
/// read; an exhausted script yields empty readings.
pub struct ScriptedClimate {
    script: VecDeque<std::result::Result<ClimateReading, ()>>,
    present: bool,
    reads: Arc<AtomicUsize>,
}

impl ScriptedClimate {
    pub fn new(script: Vec<std::result::Result<ClimateReading, ()>>) -> Self {
        Self {
            script: script.into(),
            present: true,
            reads: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Device that cannot be opened
    pub fn missing(mut self) -> Self {
        self.present = false;
        self
    }

    pub fn reads(&self) -> Arc<AtomicUsize> {
        self.reads.clone()
    }
}

#[async_trait]
impl ClimateSensor for ScriptedClimate {
    async fn initialize(&mut self) -> Result<()> {
        if self.present {
            Ok(())
        } else {
            Err(anyhow!("Resource unavailable"))
        }
    }

    async fn read(&mut self) -> Result<ClimateReading> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        match self.script.pop_front() {
            Some(Ok(reading)) => Ok(reading),
            Some(Err(())) => Err(anyhow!("checksum error")),
            None => Ok(ClimateReading::default()),
        }
    }
}

/// Wireless source returning a fixed link, or an error when `None`
pub struct FixedWireless(pub Option<WifiLink>);

#[async_trait]
impl WirelessSource for FixedWireless {
    async fn link(&self) -> Result<WifiLink> {
        self.0.ok_or_else(|| anyhow!("interface not wireless"))
    }
}

/// Serial radio replaying scripted packet lines
pub struct ScriptedRadio {
    lines: VecDeque<Option<String>>,
    present: bool,
}

impl ScriptedRadio {
    pub fn new(lines: Vec<Option<String>>) -> Self {
        Self {
            lines: lines.into(),
            present: true,
        }
    }

    pub fn missing(mut self) -> Self {
        self.present = false;
        self
    }
}

#[async_trait]
impl RadioSource for ScriptedRadio {
    async fn initialize(&mut self) -> Result<()> {
        if self.present {
            Ok(())
        } else {
            Err(anyhow!("Serial port not available"))
        }
    }

    async fn read_packet(&mut self) -> Result<Option<String>> {
        Ok(self.lines.pop_front().flatten())
    }
}

/// Interface counters replaying a sequence of `tx_packets` values
pub struct FakeCounters {
    tx: Mutex<VecDeque<u64>>,
    rate: Option<f64>,
}

impl FakeCounters {
    pub fn new(tx: Vec<u64>, rate: Option<f64>) -> Self {
        Self {
            tx: Mutex::new(tx.into()),
            rate,
        }
    }
}

#[async_trait]
impl InterfaceCounters for FakeCounters {
    async fn tx_packets(&self) -> Result<u64> {
        self.tx
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| anyhow!("no such interface"))
    }

    async fn tx_rate_bytes_per_sec(&self) -> Result<f64> {
        self.rate.ok_or_else(|| anyhow!("iw not available"))
    }
}

/// Reachability probe with a fixed answer, or an error when `None`
pub struct FakeReachability(pub Option<bool>);

#[async_trait]
impl ReachabilityProbe for FakeReachability {
    async fn is_reachable(&self) -> Result<bool> {
        self.0.ok_or_else(|| anyhow!("ping not found"))
    }
}

/// Remediation counting its invocations
#[derive(Default)]
pub struct CountingRemediation {
    calls: AtomicUsize,
    fail: bool,
}

impl CountingRemediation {
    pub fn failing() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail: true,
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Remediation for CountingRemediation {
    fn describe(&self) -> String {
        "count".to_string()
    }

    async fn remediate(&self) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            Err(anyhow!("restart failed"))
        } else {
            Ok(())
        }
    }
}
