//! HTTP API for alerts, health checks and Prometheus metrics

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use healer_lib::{
    alerts::AlertDispatcher,
    health::{ComponentStatus, HealthRegistry},
    models::{parse_since, AlertRecord},
    observability::AgentMetrics,
};
use prometheus::{Encoder, TextEncoder};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub health_registry: HealthRegistry,
    pub metrics: AgentMetrics,
    pub dispatcher: AlertDispatcher,
}

impl AppState {
    pub fn new(
        health_registry: HealthRegistry,
        metrics: AgentMetrics,
        dispatcher: AlertDispatcher,
    ) -> Self {
        Self {
            health_registry,
            metrics,
            dispatcher,
        }
    }
}

/// Failure body shared by every endpoint
#[derive(Debug, Serialize)]
struct ErrorBody {
    detail: String,
}

fn internal_error(detail: impl std::fmt::Display) -> Response {
    error!(error = %detail, "Request failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorBody {
            detail: format!("Internal Server Error: {}", detail),
        }),
    )
        .into_response()
}

#[derive(Debug, Deserialize)]
struct AlertsQuery {
    since: Option<String>,
}

/// Submission body. `timestamp` is accepted in any form and ignored.
#[derive(Debug, Deserialize)]
struct SubmitAlert {
    #[serde(default)]
    #[allow(dead_code)]
    timestamp: Option<serde_json::Value>,
    scenario: String,
    message: String,
}

#[derive(Debug, Serialize)]
struct AlertList {
    alerts: Vec<AlertRecord>,
}

#[derive(Debug, Serialize)]
struct Created {
    result: &'static str,
}

/// List stored alerts, optionally only those newer than `since`
async fn list_alerts(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AlertsQuery>,
) -> Response {
    let since = match query.since.as_deref().map(parse_since).transpose() {
        Ok(since) => since,
        Err(e) => return internal_error(e),
    };

    let alerts = state.dispatcher.store().list(since);
    (StatusCode::OK, Json(AlertList { alerts })).into_response()
}

/// Accept an alert from another component; the record is stamped on arrival
async fn submit_alert(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<SubmitAlert>, axum::extract::rejection::JsonRejection>,
) -> Response {
    let Json(submission) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return internal_error(rejection.body_text()),
    };

    let record = state
        .dispatcher
        .create_alert(&submission.scenario, &submission.message);

    // Persistence is fail-open: the record is kept in memory and forwarded
    if let Err(e) = state.dispatcher.publish(record).await {
        warn!(scenario = %submission.scenario, error = %e, "Submitted alert not persisted");
    }

    (
        StatusCode::CREATED,
        Json(Created {
            result: "Alert created successfully!",
        }),
    )
        .into_response()
}

/// Health check response - returns 200 if healthy or degraded, 503 if unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;

    let status_code = match health.status {
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::OK,
    };

    (status_code, Json(health))
}

/// Readiness check response - returns 200 if ready, 503 if not ready
async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

/// Prometheus metrics endpoint
async fn metrics(State(state): State<Arc<AppState>>) -> Response {
    state
        .metrics
        .set_alerts_stored(state.dispatcher.store().len() as i64);

    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        return internal_error(e);
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
        .into_response()
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/alerts", get(list_alerts).post(submit_alert))
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .with_state(state)
}

/// Start the API server
pub async fn serve(
    port: u16,
    state: Arc<AppState>,
    mut shutdown: tokio::sync::broadcast::Receiver<()>,
) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
        })
        .await?;

    Ok(())
}
