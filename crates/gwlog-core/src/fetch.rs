//! Paginated listing and object retrieval.
//!
//! [`ObjectFetcher::objects`] walks the day prefixes in order, lists each one
//! page by page with a single run-wide marker, and yields every object whose
//! key carries the log suffix, validated and ready to decode.
//!
//! The marker only advances past a key once the consumer has pulled the next
//! item, so a failure always reports the last key fully handed off. Resuming
//! with that marker re-fetches the object that failed. A format error also
//! offers [`Error::skip_point`], which resumes past the unreadable object.

use crate::gzip::{is_valid_gzip, open_gzip_lines, GzipLines};
use crate::store::{ObjectStore, StoreError};
use async_stream::try_stream;
use futures::Stream;
use gwlog_common::{Error, Marker, ObjectKey, Result, ResumePoint};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// One retrieved log object.
pub struct LogObject {
    pub key: ObjectKey,
    /// Where to restart if this object turns out to be unusable downstream.
    pub resume: ResumePoint,
    lines: GzipLines,
}

impl LogObject {
    /// Decompressed text lines. Consumes the object.
    pub fn into_lines(self) -> GzipLines {
        self.lines
    }
}

impl std::fmt::Debug for LogObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogObject")
            .field("key", &self.key)
            .field("resume", &self.resume)
            .finish_non_exhaustive()
    }
}

/// Fetch-phase counters, shared between the fetcher and its caller.
#[derive(Debug, Default)]
pub struct FetchStats {
    pages: AtomicU64,
    listed: AtomicU64,
    skipped: AtomicU64,
    fetched: AtomicU64,
}

/// Point-in-time copy of [`FetchStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FetchCounts {
    pub pages: u64,
    pub listed: u64,
    pub skipped: u64,
    pub fetched: u64,
}

impl FetchStats {
    pub fn snapshot(&self) -> FetchCounts {
        FetchCounts {
            pages: self.pages.load(Ordering::Relaxed),
            listed: self.listed.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            fetched: self.fetched.load(Ordering::Relaxed),
        }
    }

    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

pub struct ObjectFetcher {
    store: Arc<dyn ObjectStore>,
    bucket: String,
    suffix: String,
    stats: Arc<FetchStats>,
}

impl ObjectFetcher {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        bucket: impl Into<String>,
        suffix: impl Into<String>,
    ) -> Self {
        Self {
            store,
            bucket: bucket.into(),
            suffix: suffix.into(),
            stats: Arc::new(FetchStats::default()),
        }
    }

    /// Counters updated as the stream is consumed.
    pub fn stats(&self) -> Arc<FetchStats> {
        Arc::clone(&self.stats)
    }

    /// Stream every log object under `prefixes`, starting after `marker`.
    ///
    /// The marker is global: it is not reset between prefixes. The stream
    /// ends at the first error.
    pub fn objects<'a, I>(
        &'a self,
        prefixes: I,
        marker: Marker,
    ) -> impl Stream<Item = Result<LogObject>> + 'a
    where
        I: IntoIterator<Item = String> + 'a,
    {
        try_stream! {
            let mut marker = marker;
            for prefix in prefixes {
                info!(bucket = %self.bucket, prefix = %prefix, "listing prefix");
                loop {
                    debug!(marker = %marker, "list objects with marker");
                    let page = self
                        .store
                        .list(&self.bucket, &prefix, &marker)
                        .await
                        .map_err(|e| fetch_error(e, &prefix, &marker))?;
                    FetchStats::bump(&self.stats.pages);
                    if page.entries.is_empty() {
                        break;
                    }

                    for key in page.entries {
                        FetchStats::bump(&self.stats.listed);
                        if !key.has_suffix(&self.suffix) {
                            debug!(key = %key, "skipping non-log key");
                            FetchStats::bump(&self.stats.skipped);
                            marker.advance(&key);
                            continue;
                        }

                        let resume = ResumePoint::new(prefix.as_str(), marker.clone());
                        let bytes = self
                            .store
                            .get(&self.bucket, &key)
                            .await
                            .map_err(|e| fetch_error(e, &prefix, &marker))?;
                        if !is_valid_gzip(&bytes) {
                            Err::<(), Error>(Error::Format {
                                key: key.to_string(),
                                resume: resume.clone(),
                            })?;
                        }
                        FetchStats::bump(&self.stats.fetched);
                        debug!(key = %key, bytes = bytes.len(), "fetched object");

                        yield LogObject {
                            key: key.clone(),
                            resume,
                            lines: open_gzip_lines(bytes),
                        };
                        marker.advance(&key);
                    }

                    if !page.truncated {
                        break;
                    }
                }
            }
        }
    }
}

fn fetch_error(err: StoreError, prefix: &str, marker: &Marker) -> Error {
    let resume = ResumePoint::new(prefix, marker.clone());
    match err {
        StoreError::Credentials(message) => Error::Credential { message, resume },
        StoreError::Transport(message) => Error::Transport { message, resume },
    }
}
