use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::PathBuf;

use tracing::trace;

/// Top-level hub configuration, read once at startup from a JSON file.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct Config {
    pub bus: BusConfig,

    /// Number of recent readings kept in memory
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,

    /// Per-metric alert trigger values; at most one rule per metric
    #[serde(default = "default_thresholds")]
    pub thresholds: BTreeMap<String, f64>,

    #[serde(default)]
    pub sinks: SinksConfig,

    /// Bind address for the read-only query API
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,
}

/// MQTT connection settings
#[derive(Debug, Clone, serde::Deserialize)]
pub struct BusConfig {
    pub broker: String,

    #[serde(default = "default_mqtt_port")]
    pub port: u16,

    #[serde(default = "default_client_id")]
    pub client_id: String,

    /// Topic the sensor node publishes readings on
    #[serde(default = "default_ingest_topic")]
    pub ingest_topic: String,

    /// Topic alert batches are re-published on
    #[serde(default = "default_alert_topic")]
    pub alert_topic: String,
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct SinksConfig {
    /// Append-only CSV log (optional)
    pub csv: Option<CsvConfig>,

    /// InfluxDB v2 time-series sink (optional)
    pub influx: Option<InfluxConfig>,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct CsvConfig {
    #[serde(default = "default_csv_path")]
    pub path: PathBuf,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct InfluxConfig {
    /// Administrative switch; disabled means writes are skipped entirely
    #[serde(default = "default_true")]
    pub enabled: bool,

    pub url: String,
    pub org: String,
    pub bucket: String,
    pub token: String,
}

fn default_history_limit() -> usize {
    600
}

fn default_thresholds() -> BTreeMap<String, f64> {
    BTreeMap::from([
        ("LM35_Temp".to_string(), 36.0),
        ("DHT_Temp".to_string(), 36.0),
        ("DHT_Humd".to_string(), 70.0),
        ("CDS_Light".to_string(), 800.0),
    ])
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 5000))
}

fn default_mqtt_port() -> u16 {
    1883
}

fn default_client_id() -> String {
    "enviro-hub".to_string()
}

fn default_ingest_topic() -> String {
    "sensor/data".to_string()
}

fn default_alert_topic() -> String {
    "sensor/alerts".to_string()
}

fn default_csv_path() -> PathBuf {
    PathBuf::from("sensor_log.csv")
}

fn default_true() -> bool {
    true
}

pub fn read_config_file(path: &str) -> anyhow::Result<Config> {
    let file_content = std::fs::read_to_string(path)?;
    serde_json::from_str(&file_content)
        .map_err(|e| anyhow::anyhow!("invalid configuration file: {e}"))
        .inspect(|config| trace!("loaded config: {config:?}"))
}
