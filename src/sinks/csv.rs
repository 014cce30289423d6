//! Append-only CSV log sink
//!
//! One row per reading with a fixed column schema:
//! `Time, LM35_Temp, DHT_Temp, DHT_Humd, CDS_Light, raw_json`.
//! The header is written exactly once when the file is first created;
//! existing content is never rewritten or truncated. Absent metrics become
//! empty cells, and the raw payload is carried verbatim in the last column
//! for debugging.

use std::fs::OpenOptions;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use super::error::SinkResult;
use super::Sink;
use crate::{KNOWN_METRICS, Reading};

pub struct CsvSink {
    path: PathBuf,
}

impl CsvSink {
    /// Open the log at `path`, creating it with a header row if it does not
    /// exist yet.
    pub fn create(path: impl AsRef<Path>) -> SinkResult<Self> {
        let path = path.as_ref().to_path_buf();

        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => {
                debug!("creating CSV log at {}", path.display());
                let mut writer = csv::Writer::from_writer(file);
                let mut header = vec!["Time"];
                header.extend(KNOWN_METRICS);
                header.push("raw_json");
                writer.write_record(&header)?;
                writer.flush()?;
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                debug!("appending to existing CSV log at {}", path.display());
            }
            Err(e) => return Err(e.into()),
        }

        Ok(Self { path })
    }
}

#[async_trait]
impl Sink for CsvSink {
    fn name(&self) -> &str {
        "csv"
    }

    async fn write(&self, reading: &Reading) -> SinkResult<()> {
        let file = OpenOptions::new().append(true).open(&self.path)?;
        let mut writer = csv::Writer::from_writer(file);

        let mut row = vec![reading.timestamp.to_rfc3339()];
        for metric in KNOWN_METRICS {
            row.push(
                reading
                    .metric(metric)
                    .map(|v| v.to_string())
                    .unwrap_or_default(),
            );
        }
        row.push(reading.raw.to_string());

        writer.write_record(&row)?;
        writer.flush()?;

        Ok(())
    }
}
