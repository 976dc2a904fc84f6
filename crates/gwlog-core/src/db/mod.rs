//! Load phase: correct, validate and persist records.
//!
//! Records are written one at a time, each in its own transaction, so a
//! failure part-way through keeps everything committed before it.

use crate::correct::correct_record;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gwlog_common::{AccessLogRecord, Error, RawLogRecord, Result};
use gwlog_config::ValidationPolicy;
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[cfg(any(test, feature = "test-utils"))]
pub mod memory;
pub mod postgres;

#[cfg(any(test, feature = "test-utils"))]
pub use memory::MemoryAccessLogSink;
pub use postgres::PgAccessLogStore;

/// One row of the access-log table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PersistedAccessLog {
    pub request_id: Uuid,
    pub api_key: String,
    pub api_key_id: String,
    pub request_time: DateTime<Utc>,
    pub request_time_epoch: i64,
    pub api_id: String,
    pub stage: String,
    pub http_method: String,
    pub protocol: String,
    pub domain_name: String,
    pub path: String,
    pub resource_path: String,
    pub user_agent: String,
    pub status: i32,
    pub response_latency: i64,
    pub error_message: String,
    pub response_type: String,
    pub response_length: i64,
    pub integration_status: i32,
    pub integration_latency: i64,
    pub integration_error: String,
    pub ip: String,
    pub caller: String,
    pub user: String,
}

impl From<AccessLogRecord> for PersistedAccessLog {
    fn from(r: AccessLogRecord) -> Self {
        Self {
            request_id: r.request_id,
            api_key: r.api_key,
            api_key_id: r.api_key_id,
            request_time: r.request_time,
            request_time_epoch: r.request_time_epoch,
            api_id: r.api_id,
            stage: r.stage,
            http_method: r.http_method,
            protocol: r.protocol,
            domain_name: r.domain_name,
            path: r.path,
            resource_path: r.resource_path,
            user_agent: r.user_agent,
            status: r.status,
            response_latency: r.response_latency,
            error_message: r.error_message,
            response_type: r.response_type,
            response_length: r.response_length,
            integration_status: r.integration_status,
            integration_latency: r.integration_latency,
            integration_error: r.integration_error,
            ip: r.ip,
            caller: r.caller,
            user: r.user,
        }
    }
}

/// Destination for validated rows.
#[async_trait]
pub trait AccessLogSink: Send + Sync {
    /// Durably store one row. Returns once it is committed.
    async fn insert(&self, row: &PersistedAccessLog) -> Result<()>;
}

#[async_trait]
impl<T: AccessLogSink + ?Sized> AccessLogSink for &T {
    async fn insert(&self, row: &PersistedAccessLog) -> Result<()> {
        (**self).insert(row).await
    }
}

/// Totals for one load run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LoadSummary {
    pub inserted: u64,
    /// Records rejected by validation under [`ValidationPolicy::Skip`].
    pub skipped: u64,
}

pub struct DbLoader<S> {
    sink: S,
    policy: ValidationPolicy,
}

impl<S: AccessLogSink> DbLoader<S> {
    pub fn new(sink: S, policy: ValidationPolicy) -> Self {
        Self { sink, policy }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Persist `records` in order, awaiting each commit before the next.
    ///
    /// Read, parse and database errors always stop the run. Validation
    /// errors stop it under [`ValidationPolicy::Abort`].
    pub async fn load<I>(&self, records: I) -> Result<LoadSummary>
    where
        I: IntoIterator<Item = Result<RawLogRecord>>,
    {
        let mut summary = LoadSummary::default();
        for raw in records {
            let corrected = correct_record(raw?);
            let record = match AccessLogRecord::from_raw(corrected) {
                Ok(record) => record,
                Err(err @ Error::Validation { .. }) if self.policy == ValidationPolicy::Skip => {
                    warn!(error = %err, "skipping invalid record");
                    summary.skipped += 1;
                    continue;
                }
                Err(err) => return Err(err),
            };

            let row = PersistedAccessLog::from(record);
            self.sink.insert(&row).await?;
            summary.inserted += 1;
            debug!(request_id = %row.request_id, "committed record");
        }

        info!(
            inserted = summary.inserted,
            skipped = summary.skipped,
            "load complete"
        );
        Ok(summary)
    }
}
