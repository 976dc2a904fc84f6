//! The two pipeline phases wired end to end.
//!
//! Fetch: prefixes → listing → validated objects → staged files.
//! Load: staged files → records → corrected, validated rows → sink.
//! The phases only share the staging directory.

use crate::db::{AccessLogSink, DbLoader, LoadSummary};
use crate::fetch::{FetchCounts, ObjectFetcher};
use crate::loader::StagedRecordLoader;
use crate::prefix::PrefixPlan;
use crate::staging::{StagingSummary, StagingWriter};
use crate::store::ObjectStore;
use gwlog_common::{DateRange, Marker, Result};
use gwlog_config::IngestConfig;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

/// What to fetch.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    /// Environment name; selects the bucket.
    pub environment: String,
    pub range: DateRange,
    /// Resume marker from an interrupted run.
    pub marker: Marker,
}

#[derive(Debug, Clone, Serialize)]
pub struct FetchReport {
    pub bucket: String,
    pub prefixes: usize,
    pub fetch: FetchCounts,
    pub staging: StagingSummary,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoadReport {
    pub files: usize,
    pub loaded_files: usize,
    #[serde(flatten)]
    pub records: LoadSummary,
}

/// Fetch every log object in the range into the staging directory.
pub async fn run_fetch(
    config: &IngestConfig,
    store: Arc<dyn ObjectStore>,
    request: &FetchRequest,
) -> Result<FetchReport> {
    let bucket = config.bucket_for(&request.environment);
    let plan = PrefixPlan::new(&request.range);
    let prefixes = plan.len();
    info!(
        bucket = %bucket,
        start = %request.range.start(),
        end = %request.range.end(),
        prefixes,
        marker = %request.marker,
        "starting fetch"
    );
    if request.range.is_empty() {
        warn!("start equals end; the range covers no days");
    }

    let fetcher = ObjectFetcher::new(store, bucket.clone(), config.object_suffix.clone());
    let writer = StagingWriter::new(&config.staging_dir);
    let staging = writer
        .stage_all(fetcher.objects(plan, request.marker.clone()))
        .await?;

    Ok(FetchReport {
        bucket,
        prefixes,
        fetch: fetcher.stats().snapshot(),
        staging,
    })
}

/// Load every pending staged file into `sink`.
pub async fn run_load<S: AccessLogSink>(config: &IngestConfig, sink: S) -> Result<LoadReport> {
    let mut records = StagedRecordLoader::new(&config.staging_dir).scan()?;
    info!(
        files = records.total(),
        policy = %config.validation_policy,
        "starting load"
    );

    let loader = DbLoader::new(sink, config.validation_policy);
    let summary = loader.load(records.by_ref()).await?;

    Ok(LoadReport {
        files: records.total(),
        loaded_files: records.loaded(),
        records: summary,
    })
}
