//! Staging of fetched objects as local JSON array files.
//!
//! Each gateway log line is `<prefix> <json>`. The writer keeps the JSON
//! payload and drops the rest. One object becomes one `<uuid>.json` file in
//! the staging directory. Files are written to a temporary name first and
//! only appear under their final name once the array is complete.

use crate::fetch::LogObject;
use futures::{Stream, StreamExt};
use gwlog_common::{Error, Result};
use serde::Serialize;
use serde_json::value::RawValue;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Totals for one staging run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StagingSummary {
    pub files: usize,
    pub records: usize,
    /// Lines without a payload or with a payload that is not JSON.
    pub dropped: usize,
    #[serde(skip)]
    pub paths: Vec<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct StagingWriter {
    dir: PathBuf,
}

impl StagingWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Drain `objects` one at a time, staging each as it arrives.
    ///
    /// Stops at the first error from the stream or from the filesystem.
    /// Files already persisted stay in place.
    pub async fn stage_all<S>(&self, objects: S) -> Result<StagingSummary>
    where
        S: Stream<Item = Result<LogObject>>,
    {
        fs::create_dir_all(&self.dir).map_err(|e| Error::staging_io(&self.dir, e))?;

        let mut summary = StagingSummary::default();
        let mut objects = std::pin::pin!(objects);
        while let Some(object) = objects.next().await {
            let staged = self.stage(object?)?;
            summary.files += 1;
            summary.records += staged.records;
            summary.dropped += staged.dropped;
            summary.paths.push(staged.path);
        }

        info!(
            files = summary.files,
            records = summary.records,
            dropped = summary.dropped,
            "staging complete"
        );
        Ok(summary)
    }

    /// Write one object's records as a JSON array file.
    pub fn stage(&self, object: LogObject) -> Result<StagedFile> {
        let key = object.key.clone();
        let resume = object.resume.clone();

        let tmp = NamedTempFile::new_in(&self.dir).map_err(|e| Error::staging_io(&self.dir, e))?;
        let tmp_path = tmp.path().to_path_buf();
        let mut out = BufWriter::new(tmp);
        let io_err = |e: std::io::Error| Error::staging_io(&tmp_path, e);

        let mut records = 0usize;
        let mut dropped = 0usize;
        out.write_all(b"[").map_err(io_err)?;
        for line in object.into_lines() {
            let line = line.map_err(|_| Error::Format {
                key: key.to_string(),
                resume: resume.clone(),
            })?;
            let Some(payload) = extract_payload(&line) else {
                dropped += 1;
                continue;
            };
            if records > 0 {
                out.write_all(b",").map_err(io_err)?;
            }
            out.write_all(payload.as_bytes()).map_err(io_err)?;
            records += 1;
        }
        out.write_all(b"]").map_err(io_err)?;

        let tmp = out.into_inner().map_err(|e| io_err(e.into_error()))?;
        let path = self.dir.join(format!("{}.json", Uuid::new_v4()));
        tmp.persist(&path)
            .map_err(|e| Error::staging_io(&path, e.error))?;

        if dropped > 0 {
            warn!(key = %key, dropped, "dropped malformed lines");
        }
        debug!(key = %key, path = %path.display(), records, "staged object");
        Ok(StagedFile {
            path,
            records,
            dropped,
        })
    }
}

/// Result of staging one object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedFile {
    pub path: PathBuf,
    pub records: usize,
    pub dropped: usize,
}

/// The JSON payload of a log line: everything after the first space, if it
/// parses as a single JSON value.
pub fn extract_payload(line: &str) -> Option<&str> {
    let (_, payload) = line.split_once(' ')?;
    let payload = payload.trim();
    serde_json::from_str::<&RawValue>(payload).ok()?;
    Some(payload)
}
