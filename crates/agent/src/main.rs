//! Edge Healer - self-healing agent for edge nodes
//!
//! Runs one monitoring loop per enabled scenario, stores alerts locally,
//! forwards them downstream and serves the alerts/health/metrics API.

use healer_lib::{
    alerts::{
        resolve_device_id, AlertDispatcher, AlertStore, ForwardQueue, ForwardWorker,
        HttpForwarder,
    },
    health::{components, HealthRegistry},
    monitor::{CommandRemediation, LogRemediation, LoopState, MonitorLoop, Remediation},
    observability::{AgentMetrics, StructuredLogger},
    probe::{
        detect_primary_interface, IioClimateSensor, LinuxInterface, PingProbe, ProcWireless,
        SerialRadio, ThermalZone,
    },
    scenario::{
        CommunicationType, DutyCycleDetector, LoraLinkDetector, PowerDetector,
        ReachabilityDetector, ScenarioDetector, SensorDetector, WifiLinkDetector,
    },
};
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod api;
mod config;

const AGENT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Upper bound for an operator-configured remediation command
const REMEDIATION_TIMEOUT: Duration = Duration::from_secs(60);

/// Shared handles every monitor loop is wired to
struct LoopContext {
    dispatcher: AlertDispatcher,
    health: HealthRegistry,
    metrics: AgentMetrics,
    logger: StructuredLogger,
    shutdown: broadcast::Sender<()>,
}

impl LoopContext {
    fn spawn<D>(
        &self,
        detector: D,
        remediation: Arc<dyn Remediation>,
        interval_secs: u64,
    ) -> JoinHandle<LoopState>
    where
        D: ScenarioDetector + 'static,
    {
        let monitor = MonitorLoop::new(
            detector,
            remediation,
            self.dispatcher.clone(),
            Duration::from_secs(interval_secs),
        )
        .with_health(self.health.clone())
        .with_metrics(self.metrics.clone())
        .with_logger(self.logger.clone());

        tokio::spawn(monitor.run(self.shutdown.subscribe()))
    }
}

/// The configured command, or a log-only action
fn remediation_for(command: &Option<String>, action: &str) -> Arc<dyn Remediation> {
    match command {
        Some(command) => Arc::new(CommandRemediation::new(command.as_str(), REMEDIATION_TIMEOUT)),
        None => Arc::new(LogRemediation::new(action)),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting edge-healer");

    let config = config::AgentConfig::load()?;
    let device_id = resolve_device_id(config.device_id.as_deref(), &config.fallback_device_id);
    info!(device_id = %device_id, api_port = config.api_port, "Agent configured");

    let health_registry = HealthRegistry::new();
    health_registry.register(components::ALERT_STORE).await;
    health_registry.register(components::API).await;

    let metrics = AgentMetrics::new();
    let logger = StructuredLogger::new(&device_id);
    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    // Alert pipeline
    let store = Arc::new(AlertStore::open(&config.alerts));
    metrics.set_alerts_stored(store.len() as i64);

    let mut dispatcher = AlertDispatcher::new(store, &device_id)
        .with_health(health_registry.clone())
        .with_metrics(metrics.clone());

    let mut forward_handle = None;
    if config.forward.enabled {
        health_registry.register(components::FORWARDER).await;

        let forwarder = Arc::new(HttpForwarder::new(&config.forward)?);
        let (queue, receiver) = ForwardQueue::new(config.forward.queue_size);
        let worker = ForwardWorker::new(receiver, forwarder, queue.stats())
            .with_health(health_registry.clone())
            .with_metrics(metrics.clone())
            .with_logger(logger.clone());

        forward_handle = Some(tokio::spawn(worker.run(shutdown_tx.subscribe())));
        dispatcher = dispatcher.with_forwarding(queue.with_metrics(metrics.clone()));
        info!(endpoint = %config.forward.endpoint(), "Alert forwarding enabled");
    }

    // Scenario loops
    let ctx = LoopContext {
        dispatcher: dispatcher.clone(),
        health: health_registry.clone(),
        metrics: metrics.clone(),
        logger: logger.clone(),
        shutdown: shutdown_tx.clone(),
    };
    let mut loops = Vec::new();
    let mut scenarios = Vec::new();

    if config.power.enabled {
        let cfg = config.power.clone();
        scenarios.push(cfg.scenario_name.clone());
        let remediation = remediation_for(&cfg.remediation_command, "restart device");
        let interval = cfg.interval_secs;
        let source = ThermalZone::new(cfg.thermal_zone.clone());
        loops.push(ctx.spawn(PowerDetector::new(cfg, Box::new(source)), remediation, interval));
    }

    if config.sensor.enabled {
        let cfg = config.sensor.clone();
        scenarios.push(cfg.scenario_name.clone());
        let remediation = remediation_for(&cfg.remediation_command, "exclude sensor from monitoring");
        let interval = cfg.interval_secs;
        let device = IioClimateSensor::new(cfg.iio_device.clone());
        loops.push(ctx.spawn(SensorDetector::new(cfg, Box::new(device)), remediation, interval));
    }

    if config.link_quality.enabled {
        let cfg = config.link_quality.clone();
        scenarios.push(cfg.scenario_name.clone());
        let remediation =
            remediation_for(&cfg.remediation_command, "adjust transmission parameters");
        let interval = cfg.interval_secs;

        let handle = match cfg.communication_type {
            CommunicationType::Wifi => {
                let interface = match &cfg.interface {
                    Some(interface) => interface.clone(),
                    None => detect_primary_interface().await,
                };
                let source = ProcWireless::new(interface);
                ctx.spawn(WifiLinkDetector::new(cfg, Box::new(source)), remediation, interval)
            }
            CommunicationType::Lora => {
                let radio = SerialRadio::new(cfg.serial_port.clone(), cfg.baud_rate);
                ctx.spawn(LoraLinkDetector::new(cfg, Box::new(radio)), remediation, interval)
            }
        };
        loops.push(handle);
    }

    if config.duty_cycle.enabled {
        let cfg = config.duty_cycle.clone();
        scenarios.push(cfg.scenario_name.clone());
        let remediation =
            remediation_for(&cfg.remediation_command, "reconfigure transmission parameters");
        let interval = cfg.interval_secs;
        let interface = match &cfg.interface {
            Some(interface) => interface.clone(),
            None => detect_primary_interface().await,
        };
        let counters = LinuxInterface::new(interface);
        loops.push(ctx.spawn(DutyCycleDetector::new(cfg, Box::new(counters)), remediation, interval));
    }

    if config.reachability.enabled {
        let cfg = config.reachability.clone();
        scenarios.push(cfg.scenario_name.clone());
        let remediation = remediation_for(&cfg.remediation_command, "restart network service");
        let interval = cfg.interval_secs;
        let probe = PingProbe::new(
            cfg.device_ip.clone(),
            cfg.ping_count,
            Duration::from_secs(cfg.ping_timeout_secs),
        );
        loops.push(ctx.spawn(ReachabilityDetector::new(cfg, Box::new(probe)), remediation, interval));
    }

    if scenarios.is_empty() {
        warn!("No scenarios enabled; serving the alert API only");
    }
    logger.log_startup(AGENT_VERSION, &scenarios);

    // API server
    let app_state = Arc::new(api::AppState::new(
        health_registry.clone(),
        metrics.clone(),
        dispatcher,
    ));
    let mut api_handle = tokio::spawn(api::serve(
        config.api_port,
        app_state,
        shutdown_tx.subscribe(),
    ));

    health_registry.set_ready(true).await;

    // Wait for shutdown signal, or the API server dying
    let mut api_finished = false;
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result?;
            logger.log_shutdown("SIGINT received");
        }
        result = &mut api_handle => {
            api_finished = true;
            let reason = match result {
                Ok(Ok(())) => "API server stopped".to_string(),
                Ok(Err(e)) => format!("API server failed: {:#}", e),
                Err(e) => format!("API server task failed: {}", e),
            };
            health_registry.set_unhealthy(components::API, reason.as_str()).await;
            logger.log_shutdown(&reason);
        }
    }

    let _ = shutdown_tx.send(());
    for handle in loops {
        let _ = handle.await;
    }
    if let Some(handle) = forward_handle {
        let _ = handle.await;
    }
    if !api_finished {
        let _ = api_handle.await;
    }

    info!("Shutdown complete");
    Ok(())
}
