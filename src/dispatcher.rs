//! Dispatcher - the ingestion-and-fanout core
//!
//! One dispatch call per accepted reading, always in the same order:
//!
//! 1. Commit to the shared state store (in-memory, infallible)
//! 2. Fan out to the durable sinks (per-sink failure isolation)
//! 3. Evaluate threshold rules
//! 4. Publish the alert batch, if any
//!
//! Failures in steps 2 and 4 are reported and swallowed at their boundary;
//! nothing rolls back an already-committed reading. The subscriber drives
//! this serially, so readings are dispatched strictly in arrival order.

use std::sync::Arc;

use tracing::{debug, error, instrument};

use crate::Reading;
use crate::bus::AlertPublisher;
use crate::sinks::SinkFanout;
use crate::store::StateStore;
use crate::thresholds::ThresholdSet;

pub struct Dispatcher {
    store: Arc<StateStore>,
    fanout: SinkFanout,
    thresholds: ThresholdSet,
    alerts: Box<dyn AlertPublisher>,
}

impl Dispatcher {
    pub fn new(
        store: Arc<StateStore>,
        fanout: SinkFanout,
        thresholds: ThresholdSet,
        alerts: Box<dyn AlertPublisher>,
    ) -> Self {
        Self {
            store,
            fanout,
            thresholds,
            alerts,
        }
    }

    /// Run all four stages for one reading.
    #[instrument(skip_all, fields(timestamp = %reading.timestamp))]
    pub async fn dispatch(&self, reading: Reading) {
        self.store.record(reading.clone()).await;

        self.fanout.write_all(&reading).await;

        let alerts = self.thresholds.evaluate(&reading);

        if !alerts.is_empty() {
            debug!("publishing {} alert(s)", alerts.len());
            if let Err(e) = self.alerts.publish(&alerts).await {
                error!("alert publish failed: {e}");
            }
        }
    }
}
