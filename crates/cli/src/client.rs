//! API client for communicating with an edge-healer agent

use anyhow::{Context, Result};
use reqwest::{Client, Response, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::BTreeMap;
use url::Url;

/// Non-success response from the agent
#[derive(Debug, thiserror::Error)]
#[error("API error ({status}): {detail}")]
pub struct ApiError {
    pub status: StatusCode,
    pub detail: String,
}

/// API client for the agent's HTTP surface
pub struct ApiClient {
    client: Client,
    base_url: Url,
}

impl ApiClient {
    /// Create a new API client
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        let base_url = Url::parse(base_url).context("Invalid API URL")?;

        Ok(Self { client, base_url })
    }

    fn url(&self, path: &str) -> Result<Url> {
        self.base_url.join(path).context("Invalid path")
    }

    /// Make a GET request
    pub async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("Failed to send request")?;

        parse(response, &[]).await
    }

    /// Make a POST request with JSON body
    pub async fn post<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T> {
        let response = self
            .client
            .post(self.url(path)?)
            .json(body)
            .send()
            .await
            .context("Failed to send request")?;

        parse(response, &[]).await
    }

    /// `GET /alerts`, optionally only alerts newer than `since`
    pub async fn list_alerts(&self, since: Option<&str>) -> Result<AlertList> {
        let mut url = self.url("alerts")?;
        if let Some(since) = since {
            url.query_pairs_mut().append_pair("since", since);
        }
        self.get(url).await
    }

    /// `POST /alerts`
    pub async fn submit_alert(&self, scenario: &str, message: &str) -> Result<SubmitResponse> {
        let body = SubmitRequest {
            timestamp: chrono::Utc::now().to_rfc3339(),
            scenario: scenario.to_string(),
            message: message.to_string(),
        };
        self.post("alerts", &body).await
    }

    /// `GET /healthz`. An unhealthy agent answers 503 with the same body.
    pub async fn health(&self) -> Result<HealthReport> {
        let response = self
            .client
            .get(self.url("healthz")?)
            .send()
            .await
            .context("Failed to send request")?;

        parse(response, &[StatusCode::SERVICE_UNAVAILABLE]).await
    }
}

async fn parse<T: DeserializeOwned>(response: Response, also_ok: &[StatusCode]) -> Result<T> {
    let status = response.status();

    if !status.is_success() && !also_ok.contains(&status) {
        let body = response.text().await.unwrap_or_default();
        let detail = serde_json::from_str::<ErrorResponse>(&body)
            .map(|e| e.detail)
            .unwrap_or(body);
        return Err(ApiError { status, detail }.into());
    }

    response.json().await.context("Failed to parse response")
}

// API response types

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub timestamp: String,
    pub scenario: String,
    pub message: String,
    #[serde(default, alias = "mac_address")]
    pub device_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertList {
    pub alerts: Vec<Alert>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitRequest {
    pub timestamp: String,
    pub scenario: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub result: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentReport {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub last_check_timestamp: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: String,
    pub components: BTreeMap<String, ComponentReport>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub detail: String,
}
