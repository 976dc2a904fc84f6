//! gwlog core library.
//!
//! Ingests API-gateway access logs: lists and downloads gzip log objects for
//! a date range, stages them locally as JSON arrays, and loads the corrected,
//! validated records into a relational store.

pub mod correct;
pub mod db;
pub mod exit_codes;
pub mod fetch;
pub mod gzip;
pub mod loader;
pub mod logging;
pub mod pipeline;
pub mod prefix;
pub mod staging;
pub mod store;

pub use correct::{coerce_int, correct_record};
pub use db::{AccessLogSink, DbLoader, LoadSummary, PersistedAccessLog, PgAccessLogStore};
pub use exit_codes::ExitCode;
pub use fetch::{FetchCounts, FetchStats, LogObject, ObjectFetcher};
pub use gzip::{is_valid_gzip, open_gzip_lines};
pub use loader::{StagedRecordLoader, StagedRecords};
pub use pipeline::{run_fetch, run_load, FetchReport, FetchRequest, LoadReport};
pub use prefix::PrefixPlan;
pub use staging::{StagingSummary, StagingWriter};
pub use store::{ListPage, ObjectStore, S3ObjectStore, StoreError};

#[cfg(any(test, feature = "test-utils"))]
pub use db::MemoryAccessLogSink;
#[cfg(any(test, feature = "test-utils"))]
pub use store::MemoryObjectStore;
