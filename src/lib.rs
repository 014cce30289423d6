pub mod api;
pub mod bus;
pub mod config;
pub mod dispatcher;
pub mod sinks;
pub mod store;
pub mod thresholds;

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;

/// Metric names the sensor node is known to report.
///
/// This set defines the CSV column order and the fields written to InfluxDB.
/// Readings may carry additional metrics; those flow through `fields` and the
/// raw payload untouched.
pub const KNOWN_METRICS: [&str; 4] = ["LM35_Temp", "DHT_Temp", "DHT_Humd", "CDS_Light"];

/// One timestamped measurement set received from the sensor node.
#[derive(Debug, Clone, Serialize)]
pub struct Reading {
    /// Sample instant; producer-supplied, or assigned at receipt when the
    /// payload carries none.
    pub timestamp: DateTime<Utc>,

    /// Numeric metric values extracted from the payload. Unknown metrics are
    /// kept, missing ones are simply absent.
    pub fields: HashMap<String, f64>,

    /// The original payload, retained for audit logging and raw queries.
    pub raw: Value,
}

impl Reading {
    /// Parse a raw bus payload into a Reading.
    ///
    /// The payload must be a JSON object. If it lacks a `timestamp` key, one
    /// is injected using `received_at` so the stored and served payload always
    /// carries it. Every top-level value that is a number (or a string that
    /// parses as one, since the sensor bridge sometimes quotes values) lands
    /// in `fields`; everything else stays only in `raw`.
    pub fn from_payload(payload: &[u8], received_at: DateTime<Utc>) -> anyhow::Result<Self> {
        let mut raw: Value = serde_json::from_slice(payload).context("payload is not valid JSON")?;

        let object = raw
            .as_object_mut()
            .context("payload is not a JSON object")?;

        let timestamp = match object.get("timestamp") {
            Some(value) => value
                .as_str()
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|t| t.with_timezone(&Utc))
                .unwrap_or(received_at),
            None => {
                object.insert(
                    "timestamp".to_string(),
                    Value::String(received_at.to_rfc3339()),
                );
                received_at
            }
        };

        let fields = object
            .iter()
            .filter(|(key, _)| key.as_str() != "timestamp")
            .filter_map(|(key, value)| numeric_value(value).map(|n| (key.clone(), n)))
            .collect();

        Ok(Self {
            timestamp,
            fields,
            raw,
        })
    }

    /// Numeric value of a metric, if the Reading carries it.
    pub fn metric(&self, name: &str) -> Option<f64> {
        self.fields.get(name).copied()
    }
}

/// One threshold breach observed during evaluation of a single Reading.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertEvent {
    /// Name of the breached metric
    pub metric: String,

    /// The observed value
    pub value: f64,

    /// The rule's trigger value
    pub threshold: f64,

    /// Instant of evaluation
    pub time: DateTime<Utc>,
}

fn numeric_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn receipt_time() -> DateTime<Utc> {
        "2024-05-01T12:00:00Z".parse().unwrap()
    }

    #[test]
    fn parse_extracts_numeric_fields() {
        let payload = json!({
            "LM35_Temp": 37.5,
            "DHT_Temp": 30,
            "DHT_Humd": 50,
            "CDS_Light": 500,
        });

        let reading =
            Reading::from_payload(payload.to_string().as_bytes(), receipt_time()).unwrap();

        assert_eq!(reading.metric("LM35_Temp"), Some(37.5));
        assert_eq!(reading.metric("DHT_Temp"), Some(30.0));
        assert_eq!(reading.metric("DHT_Humd"), Some(50.0));
        assert_eq!(reading.metric("CDS_Light"), Some(500.0));
    }

    #[test]
    fn parse_injects_receipt_timestamp_into_raw() {
        let payload = json!({ "LM35_Temp": 21.0 });

        let reading =
            Reading::from_payload(payload.to_string().as_bytes(), receipt_time()).unwrap();

        assert_eq!(reading.timestamp, receipt_time());
        assert_eq!(
            reading.raw.get("timestamp").and_then(Value::as_str),
            Some(receipt_time().to_rfc3339().as_str()),
        );
    }

    #[test]
    fn parse_keeps_producer_timestamp() {
        let payload = json!({
            "timestamp": "2024-05-01T08:30:00+00:00",
            "LM35_Temp": 21.0,
        });

        let reading =
            Reading::from_payload(payload.to_string().as_bytes(), receipt_time()).unwrap();

        assert_eq!(
            reading.timestamp,
            "2024-05-01T08:30:00Z".parse::<DateTime<Utc>>().unwrap()
        );
        // timestamp is metadata, not a metric
        assert_eq!(reading.metric("timestamp"), None);
    }

    #[test]
    fn parse_coerces_numeric_strings() {
        let payload = json!({ "LM35_Temp": "37.5", "status": "ok" });

        let reading =
            Reading::from_payload(payload.to_string().as_bytes(), receipt_time()).unwrap();

        assert_eq!(reading.metric("LM35_Temp"), Some(37.5));
        assert_eq!(reading.metric("status"), None);
    }

    #[test]
    fn parse_passes_unknown_metrics_through() {
        let payload = json!({ "BMP_Pressure": 1013.25 });

        let reading =
            Reading::from_payload(payload.to_string().as_bytes(), receipt_time()).unwrap();

        assert_eq!(reading.metric("BMP_Pressure"), Some(1013.25));
    }

    #[test]
    fn parse_rejects_invalid_json() {
        assert!(Reading::from_payload(b"not json", receipt_time()).is_err());
    }

    #[test]
    fn parse_rejects_non_object_payloads() {
        assert!(Reading::from_payload(b"[1, 2, 3]", receipt_time()).is_err());
        assert!(Reading::from_payload(b"42", receipt_time()).is_err());
    }
}
