//! Alert listing and submission

use anyhow::Result;
use serde::Serialize;
use tabled::Tabled;

use crate::client::{Alert, ApiClient};
use crate::output::{format_timestamp, print_info, print_success, print_table, OutputFormat};

/// Row for the alerts table
#[derive(Tabled, Serialize)]
struct AlertRow {
    #[tabled(rename = "Time")]
    timestamp: String,
    #[tabled(rename = "Scenario")]
    scenario: String,
    #[tabled(rename = "Device")]
    device_id: String,
    #[tabled(rename = "Message")]
    message: String,
}

fn matches_scenario(alert: &Alert, scenario: Option<&str>) -> bool {
    scenario.map_or(true, |name| alert.scenario.eq_ignore_ascii_case(name))
}

/// List alerts, optionally newer than `since` and restricted to one scenario
pub async fn list_alerts(
    client: &ApiClient,
    since: Option<String>,
    scenario: Option<String>,
    format: OutputFormat,
) -> Result<()> {
    let result = client.list_alerts(since.as_deref()).await?;

    let alerts: Vec<Alert> = result
        .alerts
        .into_iter()
        .filter(|alert| matches_scenario(alert, scenario.as_deref()))
        .collect();

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&alerts)?);
        }
        OutputFormat::Table => {
            let rows: Vec<AlertRow> = alerts
                .into_iter()
                .map(|alert| AlertRow {
                    timestamp: format_timestamp(&alert.timestamp),
                    scenario: alert.scenario,
                    device_id: alert.device_id,
                    message: alert.message,
                })
                .collect();

            print_table(&rows, format);
            if !rows.is_empty() {
                println!();
                print_info(&format!("{} alert(s)", rows.len()));
            }
        }
    }

    Ok(())
}

/// Submit an alert through the agent
pub async fn submit_alert(
    client: &ApiClient,
    scenario: &str,
    message: &str,
    format: OutputFormat,
) -> Result<()> {
    let response = client.submit_alert(scenario, message).await?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&response)?),
        OutputFormat::Table => print_success(&response.result),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alert(scenario: &str) -> Alert {
        Alert {
            timestamp: "2024-05-01T10:00:00Z".to_string(),
            scenario: scenario.to_string(),
            message: "m".to_string(),
            device_id: "aa:bb".to_string(),
        }
    }

    #[test]
    fn test_scenario_filter_is_case_insensitive() {
        let a = alert("Sensor Failure");
        assert!(matches_scenario(&a, None));
        assert!(matches_scenario(&a, Some("sensor failure")));
        assert!(!matches_scenario(&a, Some("Device Power Alert")));
    }
}
