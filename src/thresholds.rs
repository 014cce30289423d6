//! Threshold evaluation
//!
//! A rule set maps metric names to trigger values. A reading breaches a rule
//! when its value is greater than or equal to the trigger; the boundary is
//! inclusive so the system over-alerts rather than under-alerts. Metrics
//! without a rule, and rules whose metric is absent from the reading, never
//! produce an alert.

use std::collections::BTreeMap;

use chrono::Utc;
use tracing::trace;

use crate::{AlertEvent, Reading};

/// Static per-metric trigger values, at most one rule per metric.
///
/// The rules live in an ordered map so repeated evaluation of the same
/// reading yields alerts in the same sequence regardless of payload key
/// order.
#[derive(Debug, Clone)]
pub struct ThresholdSet {
    rules: BTreeMap<String, f64>,
}

impl ThresholdSet {
    pub fn new(rules: BTreeMap<String, f64>) -> Self {
        Self { rules }
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Evaluate a reading against all rules, producing one alert per breached
    /// metric. All alerts from one evaluation share the same instant.
    pub fn evaluate(&self, reading: &Reading) -> Vec<AlertEvent> {
        let now = Utc::now();

        let alerts: Vec<AlertEvent> = self
            .rules
            .iter()
            .filter_map(|(metric, &threshold)| {
                let value = reading.metric(metric)?;
                if value >= threshold {
                    Some(AlertEvent {
                        metric: metric.clone(),
                        value,
                        threshold,
                        time: now,
                    })
                } else {
                    None
                }
            })
            .collect();

        trace!("evaluated {} rules, {} breached", self.rules.len(), alerts.len());

        alerts
    }
}
