//! Best-effort alert forwarding to the downstream collector
//!
//! Alerts are handed to a bounded queue and delivered by a single worker
//! task. Each alert gets exactly one attempt: timeouts, transport errors and
//! unexpected statuses are logged and the alert is dropped. A full queue
//! drops the alert immediately so emitters never wait on the network.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use crate::health::{components, HealthRegistry};
use crate::models::AlertRecord;
use crate::observability::{AgentMetrics, StructuredLogger};

/// Body posted downstream
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadShape {
    /// The full alert record including device identity
    #[default]
    Record,
    /// `{timestamp, scenario, message}`, accepted by another agent's `/alerts`
    Submission,
}

/// Downstream forwarding configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ForwardConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
    pub path: String,
    pub timeout_secs: u64,
    pub queue_size: usize,
    pub payload: PayloadShape,
}

impl Default for ForwardConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "10.254.102.73".to_string(),
            port: 3000,
            path: "/health".to_string(),
            timeout_secs: 15,
            queue_size: 256,
            payload: PayloadShape::Record,
        }
    }
}

impl ForwardConfig {
    pub fn endpoint(&self) -> String {
        let path = if self.path.starts_with('/') {
            self.path.clone()
        } else {
            format!("/{}", self.path)
        };
        format!("http://{}:{}{}", self.host, self.port, path)
    }
}

/// Why a forward attempt failed
#[derive(Debug, thiserror::Error)]
pub enum ForwardError {
    #[error("request failed: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("request timed out")]
    Timeout,

    #[error("downstream returned HTTP {0}")]
    Status(u16),
}

impl From<reqwest::Error> for ForwardError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ForwardError::Timeout
        } else {
            ForwardError::Transport(e)
        }
    }
}

/// Destination for forwarded alerts
#[async_trait]
pub trait AlertSink: Send + Sync {
    /// Deliver one alert. Called at most once per alert.
    async fn forward(&self, record: &AlertRecord) -> Result<(), ForwardError>;

    /// Human-readable destination for logs
    fn endpoint(&self) -> &str;
}

/// JSON-over-HTTP forwarding client
pub struct HttpForwarder {
    client: reqwest::Client,
    endpoint: String,
    payload: PayloadShape,
}

impl HttpForwarder {
    pub fn new(config: &ForwardConfig) -> anyhow::Result<Self> {
        Self::with_endpoint(
            config.endpoint(),
            config.payload,
            Duration::from_secs(config.timeout_secs),
        )
    }

    pub fn with_endpoint(
        endpoint: impl Into<String>,
        payload: PayloadShape,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            payload,
        })
    }

    /// POST any JSON body to the endpoint; 200 and 201 are success
    pub async fn post_json<T: Serialize + ?Sized>(&self, body: &T) -> Result<(), ForwardError> {
        let response = self.client.post(&self.endpoint).json(body).send().await?;

        match response.status().as_u16() {
            200 | 201 => Ok(()),
            status => Err(ForwardError::Status(status)),
        }
    }
}

#[async_trait]
impl AlertSink for HttpForwarder {
    async fn forward(&self, record: &AlertRecord) -> Result<(), ForwardError> {
        match self.payload {
            PayloadShape::Record => self.post_json(record).await,
            PayloadShape::Submission => self.post_json(&record.submission()).await,
        }
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

/// Counters for forwarding outcomes
#[derive(Debug, Default)]
pub struct ForwardStats {
    pub delivered: AtomicU64,
    pub failed: AtomicU64,
    pub dropped: AtomicU64,
}

impl ForwardStats {
    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Sending half of the forward queue
#[derive(Clone)]
pub struct ForwardQueue {
    sender: mpsc::Sender<AlertRecord>,
    stats: Arc<ForwardStats>,
    metrics: Option<AgentMetrics>,
}

impl ForwardQueue {
    pub fn new(queue_size: usize) -> (Self, mpsc::Receiver<AlertRecord>) {
        let (sender, receiver) = mpsc::channel(queue_size.max(1));
        let queue = Self {
            sender,
            stats: Arc::new(ForwardStats::default()),
            metrics: None,
        };
        (queue, receiver)
    }

    pub fn with_metrics(mut self, metrics: AgentMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Queue a record without blocking. Returns false when it was dropped.
    pub fn try_enqueue(&self, record: AlertRecord) -> bool {
        match self.sender.try_send(record) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(record)) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                if let Some(metrics) = &self.metrics {
                    metrics.inc_alert_forwards_dropped();
                }
                warn!(scenario = %record.scenario, "Forward queue full, dropping alert");
                false
            }
            Err(mpsc::error::TrySendError::Closed(record)) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                debug!(scenario = %record.scenario, "Forward worker stopped, dropping alert");
                false
            }
        }
    }

    /// Shared statistics handle, also updated by the worker
    pub fn stats(&self) -> Arc<ForwardStats> {
        self.stats.clone()
    }
}

/// Worker delivering queued alerts one at a time
pub struct ForwardWorker {
    receiver: mpsc::Receiver<AlertRecord>,
    sink: Arc<dyn AlertSink>,
    stats: Arc<ForwardStats>,
    health: Option<HealthRegistry>,
    metrics: Option<AgentMetrics>,
    logger: Option<StructuredLogger>,
}

impl ForwardWorker {
    pub fn new(
        receiver: mpsc::Receiver<AlertRecord>,
        sink: Arc<dyn AlertSink>,
        stats: Arc<ForwardStats>,
    ) -> Self {
        Self {
            receiver,
            sink,
            stats,
            health: None,
            metrics: None,
            logger: None,
        }
    }

    pub fn with_health(mut self, health: HealthRegistry) -> Self {
        self.health = Some(health);
        self
    }

    pub fn with_metrics(mut self, metrics: AgentMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn with_logger(mut self, logger: StructuredLogger) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Deliver queued alerts until shutdown or until every queue handle is
    /// dropped.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        info!(endpoint = %self.sink.endpoint(), "Starting alert forward worker");

        loop {
            tokio::select! {
                next = self.receiver.recv() => match next {
                    Some(record) => self.deliver(record).await,
                    None => break,
                },
                _ = shutdown.recv() => {
                    info!("Shutting down alert forward worker");
                    break;
                }
            }
        }
    }

    async fn deliver(&self, record: AlertRecord) {
        match self.sink.forward(&record).await {
            Ok(()) => {
                self.stats.delivered.fetch_add(1, Ordering::Relaxed);
                if let Some(metrics) = &self.metrics {
                    metrics.inc_alerts_forwarded();
                }
                if let Some(logger) = &self.logger {
                    logger.log_forward(&record.scenario, true, "");
                }
                if let Some(health) = &self.health {
                    health.set_healthy(components::FORWARDER).await;
                }
            }
            Err(e) => {
                self.stats.failed.fetch_add(1, Ordering::Relaxed);
                if let Some(metrics) = &self.metrics {
                    metrics.inc_alert_forward_failures();
                }
                match &self.logger {
                    Some(logger) => logger.log_forward(&record.scenario, false, &e.to_string()),
                    None => warn!(
                        endpoint = %self.sink.endpoint(),
                        scenario = %record.scenario,
                        error = %e,
                        "Failed to forward alert"
                    ),
                }
                if let Some(health) = &self.health {
                    health
                        .set_degraded(components::FORWARDER, e.to_string())
                        .await;
                }
            }
        }
    }
}
