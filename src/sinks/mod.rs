//! Durable sinks and the persistence fan-out
//!
//! Every accepted reading is pushed to each configured sink. Sinks are
//! polymorphic behind the [`Sink`] trait; a failing sink is logged and
//! skipped so it can never block another sink or the rest of the dispatch.

pub mod csv;
pub mod error;
pub mod influx;

use async_trait::async_trait;
use tracing::{error, trace};

use crate::Reading;

pub use self::csv::CsvSink;
pub use error::{SinkError, SinkResult};
pub use influx::InfluxSink;

/// A durable destination for readings
#[async_trait]
pub trait Sink: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Write one reading. Implementations must be append-only and must not
    /// reorder or mutate previously written readings.
    async fn write(&self, reading: &Reading) -> SinkResult<()>;
}

/// Fans each reading out to all configured sinks with per-sink failure
/// isolation
#[derive(Default)]
pub struct SinkFanout {
    sinks: Vec<Box<dyn Sink>>,
}

impl SinkFanout {
    pub fn new(sinks: Vec<Box<dyn Sink>>) -> Self {
        Self { sinks }
    }

    pub fn push(&mut self, sink: Box<dyn Sink>) {
        self.sinks.push(sink);
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    /// Write the reading to every sink. Failures are reported per sink and
    /// never propagate past this boundary.
    pub async fn write_all(&self, reading: &Reading) {
        for sink in &self.sinks {
            match sink.write(reading).await {
                Ok(()) => trace!("{} sink: wrote reading", sink.name()),
                Err(e) => error!("{} sink: write failed: {e}", sink.name()),
            }
        }
    }
}
