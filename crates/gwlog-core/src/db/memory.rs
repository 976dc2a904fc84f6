//! In-memory [`AccessLogSink`] for tests.

use super::{AccessLogSink, PersistedAccessLog};
use async_trait::async_trait;
use gwlog_common::{Error, Result};
use std::sync::Mutex;

/// Collects committed rows. Optionally fails every insert after the first
/// `n` have committed.
#[derive(Debug, Default)]
pub struct MemoryAccessLogSink {
    rows: Mutex<Vec<PersistedAccessLog>>,
    fail_after: Option<usize>,
}

impl MemoryAccessLogSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_after(mut self, n: usize) -> Self {
        self.fail_after = Some(n);
        self
    }

    /// Committed rows, in commit order.
    pub fn rows(&self) -> Vec<PersistedAccessLog> {
        self.rows.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl AccessLogSink for MemoryAccessLogSink {
    async fn insert(&self, row: &PersistedAccessLog) -> Result<()> {
        let mut rows = self
            .rows
            .lock()
            .map_err(|_| Error::Database("sink lock poisoned".to_string()))?;
        if self.fail_after.is_some_and(|n| rows.len() >= n) {
            return Err(Error::Database("connection reset".to_string()));
        }
        rows.push(row.clone());
        Ok(())
    }
}
