//! InfluxDB v2 time-series sink
//!
//! Writes each reading as a single multi-field point in line protocol via the
//! v2 HTTP write API. Only the known numeric metrics are written, tagged with
//! a fixed source identifier. A disabled sink is simply not constructed, so a
//! disabled configuration is a no-op rather than an error.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use super::error::{SinkError, SinkResult};
use super::Sink;
use crate::config::InfluxConfig;
use crate::{KNOWN_METRICS, Reading};

/// Measurement name used for all points
const MEASUREMENT: &str = "environment";

/// Fixed source tag identifying the sensor node
const SOURCE_TAG: &str = "arduino_uno";

/// Per-write request timeout; a stuck endpoint becomes a reported failure
/// instead of stalling the dispatch path
const WRITE_TIMEOUT: Duration = Duration::from_secs(10);

pub struct InfluxSink {
    client: reqwest::Client,
    write_url: String,
    org: String,
    bucket: String,
    token: String,
}

impl InfluxSink {
    /// Build the sink from configuration. Returns `None` when the sink is
    /// administratively disabled.
    pub fn from_config(config: &InfluxConfig) -> Option<Self> {
        if !config.enabled {
            debug!("InfluxDB sink disabled in config");
            return None;
        }

        Some(Self::new(
            &config.url,
            &config.org,
            &config.bucket,
            &config.token,
        ))
    }

    pub fn new(url: &str, org: &str, bucket: &str, token: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            write_url: format!("{}/api/v2/write", url.trim_end_matches('/')),
            org: org.to_string(),
            bucket: bucket.to_string(),
            token: token.to_string(),
        }
    }

    /// Render the reading as one line-protocol point, or `None` when it
    /// carries none of the known metrics.
    fn line_protocol(reading: &Reading) -> Option<String> {
        let fields: Vec<String> = KNOWN_METRICS
            .iter()
            .filter_map(|metric| {
                reading
                    .metric(metric)
                    .map(|value| format!("{metric}={value}"))
            })
            .collect();

        if fields.is_empty() {
            return None;
        }

        let timestamp = reading.timestamp.timestamp_nanos_opt().unwrap_or_default();

        Some(format!(
            "{MEASUREMENT},source={SOURCE_TAG} {} {timestamp}",
            fields.join(",")
        ))
    }
}

#[async_trait]
impl Sink for InfluxSink {
    fn name(&self) -> &str {
        "influx"
    }

    async fn write(&self, reading: &Reading) -> SinkResult<()> {
        let Some(line) = Self::line_protocol(reading) else {
            debug!("reading carries no known metrics, skipping point");
            return Ok(());
        };

        let response = self
            .client
            .post(&self.write_url)
            .query(&[
                ("org", self.org.as_str()),
                ("bucket", self.bucket.as_str()),
                ("precision", "ns"),
            ])
            .header("Authorization", format!("Token {}", self.token))
            .header("Content-Type", "text/plain; charset=utf-8")
            .timeout(WRITE_TIMEOUT)
            .body(line)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SinkError::Rejected(format!(
                "HTTP {}",
                response.status()
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use serde_json::json;

    fn reading(payload: serde_json::Value) -> Reading {
        let received: DateTime<Utc> = "2024-05-01T12:00:00Z".parse().unwrap();
        Reading::from_payload(payload.to_string().as_bytes(), received).unwrap()
    }

    #[test]
    fn line_protocol_has_measurement_tag_fields_and_timestamp() {
        let line = InfluxSink::line_protocol(&reading(json!({
            "LM35_Temp": 37.5,
            "CDS_Light": 500,
        })))
        .unwrap();

        assert!(line.starts_with("environment,source=arduino_uno "));
        assert!(line.contains("LM35_Temp=37.5"));
        assert!(line.contains("CDS_Light=500"));
        assert!(line.ends_with("1714564800000000000"));
    }

    #[test]
    fn line_protocol_skips_reading_without_known_metrics() {
        assert!(InfluxSink::line_protocol(&reading(json!({ "Other": 1.0 }))).is_none());
    }

    #[test]
    fn disabled_config_builds_no_sink() {
        let config = InfluxConfig {
            enabled: false,
            url: "http://localhost:8086".to_string(),
            org: "home-lab".to_string(),
            bucket: "sensor_bucket".to_string(),
            token: "secret".to_string(),
        };

        assert!(InfluxSink::from_config(&config).is_none());
    }
}
