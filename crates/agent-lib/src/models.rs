//! Core data models for the healing agent

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single scalar sample for one signal. `None` means the signal was
/// unavailable this round.
pub type Reading = Option<f64>;

/// Canonical alert shape, immutable once created
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRecord {
    pub timestamp: DateTime<Utc>,
    pub scenario: String,
    pub message: String,
    /// Originating node (MAC address or configured fallback)
    #[serde(alias = "mac_address")]
    pub device_id: String,
}

impl AlertRecord {
    /// Stamp a new record with the current time
    pub fn new(
        scenario: impl Into<String>,
        message: impl Into<String>,
        device_id: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            scenario: scenario.into(),
            message: message.into(),
            device_id: device_id.into(),
        }
    }

    /// The submission view of this record (no device identity)
    pub fn submission(&self) -> AlertSubmission {
        AlertSubmission {
            timestamp: self.timestamp,
            scenario: self.scenario.clone(),
            message: self.message.clone(),
        }
    }
}

/// Body accepted by the alert submission endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertSubmission {
    pub timestamp: DateTime<Utc>,
    pub scenario: String,
    pub message: String,
}

/// Error returned when a `since` filter cannot be interpreted
#[derive(Debug, thiserror::Error)]
#[error("invalid timestamp {0:?}: expected RFC 3339, ISO datetime or date")]
pub struct SinceParseError(pub String);

/// Parse a `since` query value.
///
/// Accepts RFC 3339 (`2024-05-01T10:00:00Z`), a naive ISO datetime
/// (`2024-05-01T10:00:00.123`, read as UTC) or a bare date (UTC midnight).
pub fn parse_since(raw: &str) -> Result<DateTime<Utc>, SinceParseError> {
    let raw = raw.trim();

    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .ok_or_else(|| SinceParseError(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_since_formats() {
        let expected = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();

        assert_eq!(parse_since("2024-05-01T10:00:00Z").unwrap(), expected);
        assert_eq!(parse_since("2024-05-01T12:00:00+02:00").unwrap(), expected);
        assert_eq!(parse_since("2024-05-01T10:00:00").unwrap(), expected);
        assert_eq!(parse_since("2024-05-01 10:00:00").unwrap(), expected);
        assert_eq!(
            parse_since("2024-05-01").unwrap(),
            Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_parse_since_rejects_garbage() {
        assert!(parse_since("yesterday").is_err());
        assert!(parse_since("").is_err());
    }

    #[test]
    fn test_record_accepts_legacy_mac_field() {
        let json = r#"{
            "timestamp": "2024-05-01T10:00:00Z",
            "scenario": "Sensor Failure",
            "message": "Sensor measurement detected as an outlier.",
            "mac_address": "fa:16:3e:5e:25:ef"
        }"#;

        let record: AlertRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.device_id, "fa:16:3e:5e:25:ef");

        let out = serde_json::to_value(&record).unwrap();
        assert_eq!(out["device_id"], "fa:16:3e:5e:25:ef");
        assert!(out.get("mac_address").is_none());
    }

    #[test]
    fn test_submission_drops_device_id() {
        let record = AlertRecord::new("Device Power Alert", "Exceeded threshold: 90", "node-1");
        let submission = serde_json::to_value(record.submission()).unwrap();

        assert_eq!(submission["scenario"], "Device Power Alert");
        assert!(submission.get("device_id").is_none());
    }
}
