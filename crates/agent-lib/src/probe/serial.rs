//! Serial radio reader
//!
//! The LoRa module prints one line per received frame, e.g.
//! `RSSI: -87 dBm, SNR: 7.25 dB, SF: 7`. The port is opened once; line
//! settings are applied with `stty` on open. Bytes are accumulated across
//! reads so a frame split by a read timeout is completed on the next round,
//! and each round reports the newest complete frame.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tracing::{debug, warn};

use super::{async_trait, RadioSource};

const READ_CHUNK: usize = 4096;

type Port = Box<dyn AsyncRead + Send + Sync + Unpin>;

/// Serial port carrying radio packets
pub struct SerialRadio {
    path: PathBuf,
    baud_rate: u32,
    read_timeout: Duration,
    port: Option<Port>,
    pending: Vec<u8>,
}

impl SerialRadio {
    pub fn new(path: impl Into<PathBuf>, baud_rate: u32) -> Self {
        Self {
            path: path.into(),
            baud_rate,
            read_timeout: Duration::from_secs(1),
            port: None,
            pending: Vec::new(),
        }
    }

    /// Use an already-open port instead of opening `path`
    pub fn with_port(
        path: impl Into<PathBuf>,
        port: impl AsyncRead + Send + Sync + Unpin + 'static,
    ) -> Self {
        let mut radio = Self::new(path, 0);
        radio.port = Some(Box::new(port));
        radio
    }

    /// Set how long a read waits for a packet
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    async fn configure_line(&self) {
        let result = Command::new("stty")
            .arg("-F")
            .arg(&self.path)
            .args([self.baud_rate.to_string().as_str(), "raw", "-echo"])
            .output()
            .await;

        match result {
            Ok(output) if output.status.success() => {}
            Ok(output) => debug!(
                port = %self.path.display(),
                status = %output.status,
                "stty rejected port settings"
            ),
            Err(e) => debug!(error = %e, "stty unavailable, using current port settings"),
        }
    }
}

/// Remove every complete line from `pending` and return the last non-empty
/// one. A trailing partial line stays buffered.
fn take_newest_line(pending: &mut Vec<u8>) -> Option<String> {
    let end = pending.iter().rposition(|b| *b == b'\n')?;
    let complete: Vec<u8> = pending.drain(..=end).collect();

    String::from_utf8_lossy(&complete)
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .last()
        .map(str::to_string)
}

#[async_trait]
impl RadioSource for SerialRadio {
    async fn initialize(&mut self) -> Result<()> {
        if self.port.is_some() {
            return Ok(());
        }

        let file = File::open(&self.path)
            .await
            .with_context(|| format!("Serial port {} not available", self.path.display()))?;

        self.configure_line().await;
        self.port = Some(Box::new(file));
        Ok(())
    }

    async fn read_packet(&mut self) -> Result<Option<String>> {
        let port = self
            .port
            .as_mut()
            .ok_or_else(|| anyhow::anyhow!("Serial port not initialized"))?;

        let deadline = tokio::time::Instant::now() + self.read_timeout;
        let mut chunk = [0u8; READ_CHUNK];

        // Wait for at least one complete line
        while !self.pending.contains(&b'\n') {
            match tokio::time::timeout_at(deadline, port.read(&mut chunk)).await {
                Ok(Ok(0)) | Err(_) => break,
                Ok(Ok(n)) => self.pending.extend_from_slice(&chunk[..n]),
                Ok(Err(e)) => {
                    warn!(port = %self.path.display(), error = %e, "Serial read failed");
                    return Err(anyhow::Error::new(e).context("Failed to read serial port"));
                }
            }
        }

        // Drain whatever else is already waiting so the newest frame wins
        while self.pending.contains(&b'\n') {
            match tokio::time::timeout(Duration::ZERO, port.read(&mut chunk)).await {
                Ok(Ok(n)) if n > 0 => self.pending.extend_from_slice(&chunk[..n]),
                _ => break,
            }
        }

        let packet = take_newest_line(&mut self.pending);
        if let Some(packet) = &packet {
            debug!(packet = %packet, "Received radio packet");
        }
        Ok(packet)
    }
}
