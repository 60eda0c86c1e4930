//! Turns anomalies into alert records

use std::sync::Arc;

use tracing::{debug, error, warn};

use super::forwarder::ForwardQueue;
use super::store::{AlertStore, StoreError};
use crate::health::{components, HealthRegistry};
use crate::models::AlertRecord;
use crate::observability::AgentMetrics;

/// Creates, stores and forwards alerts on behalf of every scenario
///
/// Cloning is cheap; all clones share the same store and queue.
#[derive(Clone)]
pub struct AlertDispatcher {
    store: Arc<AlertStore>,
    queue: Option<ForwardQueue>,
    device_id: String,
    health: Option<HealthRegistry>,
    metrics: Option<AgentMetrics>,
}

impl AlertDispatcher {
    pub fn new(store: Arc<AlertStore>, device_id: impl Into<String>) -> Self {
        Self {
            store,
            queue: None,
            device_id: device_id.into(),
            health: None,
            metrics: None,
        }
    }

    /// Forward every published alert through `queue`
    pub fn with_forwarding(mut self, queue: ForwardQueue) -> Self {
        self.queue = Some(queue);
        self
    }

    pub fn with_health(mut self, health: HealthRegistry) -> Self {
        self.health = Some(health);
        self
    }

    pub fn with_metrics(mut self, metrics: AgentMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn store(&self) -> &Arc<AlertStore> {
        &self.store
    }

    /// Build a record for this node, stamped now
    pub fn create_alert(&self, scenario: &str, message: &str) -> AlertRecord {
        AlertRecord::new(scenario, message, self.device_id.as_str())
    }

    /// Create, store and forward an alert. Never blocks on the network and
    /// never fails; storage problems are logged.
    pub async fn emit(&self, scenario: &str, message: &str) -> AlertRecord {
        let record = self.create_alert(scenario, message);
        if let Err(e) = self.publish(record.clone()).await {
            error!(scenario = %scenario, error = %e, "Failed to persist alert");
        }
        record
    }

    /// Store an already-built record and queue it for forwarding.
    ///
    /// Persistence is fail-open: when writing the log fails the record is
    /// still kept in memory and forwarded, and the error is returned for
    /// reporting only.
    pub async fn publish(&self, record: AlertRecord) -> Result<(), StoreError> {
        let stored = self.store.append(record.clone());

        if let Some(metrics) = &self.metrics {
            metrics.set_alerts_stored(self.store.len() as i64);
            if stored.is_err() {
                metrics.inc_alert_store_errors();
            }
        }

        match &self.queue {
            Some(queue) => {
                queue.try_enqueue(record);
            }
            None => debug!(scenario = %record.scenario, "Forwarding disabled"),
        }

        if let Some(health) = &self.health {
            match &stored {
                Ok(()) => health.set_healthy(components::ALERT_STORE).await,
                Err(e) => health.set_degraded(components::ALERT_STORE, e.to_string()).await,
            }
        }

        stored
    }
}

/// Identify this node: the configured override, else the primary MAC
/// address (lowercase, colon separated), else `fallback`.
pub fn resolve_device_id(configured: Option<&str>, fallback: &str) -> String {
    if let Some(id) = configured.map(str::trim).filter(|id| !id.is_empty()) {
        return id.to_string();
    }

    match mac_address::get_mac_address() {
        Ok(Some(mac)) => mac.to_string().to_lowercase(),
        Ok(None) => {
            warn!(fallback, "No MAC address found, using fallback device id");
            fallback.to_string()
        }
        Err(e) => {
            warn!(fallback, error = %e, "Failed to read MAC address, using fallback device id");
            fallback.to_string()
        }
    }
}
