//! Shared state store holding the latest reading and a bounded history
//!
//! The store is the only object shared between the ingestion path and the
//! query API. Both the latest slot and the history window live behind a
//! single lock so a reader always observes a dispatch either fully applied
//! or not at all, never a half-applied pair.

use std::collections::VecDeque;

use tokio::sync::RwLock;
use tracing::trace;

use crate::Reading;

/// Default number of readings returned by a history query
pub const DEFAULT_HISTORY_QUERY: usize = 200;

struct StoreInner {
    latest: Option<Reading>,
    history: VecDeque<Reading>,
}

/// Thread-safe view of the latest and recent readings
pub struct StateStore {
    inner: RwLock<StoreInner>,

    /// Maximum history length; oldest entries are evicted beyond this
    limit: usize,
}

impl StateStore {
    pub fn new(limit: usize) -> Self {
        Self {
            inner: RwLock::new(StoreInner {
                latest: None,
                history: VecDeque::with_capacity(limit),
            }),
            limit,
        }
    }

    /// Commit a reading: replace the latest slot and append to history,
    /// evicting from the front once the window is full. Both updates happen
    /// under one write lock so readers see them as a unit.
    pub async fn record(&self, reading: Reading) {
        let mut inner = self.inner.write().await;

        inner.history.push_back(reading.clone());
        while inner.history.len() > self.limit {
            inner.history.pop_front();
        }

        inner.latest = Some(reading);

        trace!("recorded reading, history length {}", inner.history.len());
    }

    /// The most recently committed reading, if any
    pub async fn latest(&self) -> Option<Reading> {
        self.inner.read().await.latest.clone()
    }

    /// The last `min(n, len)` readings in arrival order, oldest first.
    /// `None` applies the default of 200.
    pub async fn history(&self, n: Option<usize>) -> Vec<Reading> {
        let n = n.unwrap_or(DEFAULT_HISTORY_QUERY);
        let inner = self.inner.read().await;

        let skip = inner.history.len().saturating_sub(n);
        inner.history.iter().skip(skip).cloned().collect()
    }
}
