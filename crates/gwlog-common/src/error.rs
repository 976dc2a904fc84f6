//! Error types for gwlog.

use crate::key::{Marker, ResumePoint};
use chrono::NaiveDate;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for gwlog operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified fatal error type for gwlog.
///
/// Every variant aborts the current run. Fetch-phase variants carry the
/// [`ResumePoint`] an operator needs to restart from.
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors (10-19)
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid date range: start {start} is after end {end}")]
    InvalidDateRange { start: NaiveDate, end: NaiveDate },

    // Fetch errors (20-29)
    #[error("object {key} is not valid gzip text despite its suffix; resume with {resume}")]
    Format { key: String, resume: ResumePoint },

    #[error("credentials expired or could not be refreshed ({message}); resume with {resume}")]
    Credential { message: String, resume: ResumePoint },

    #[error("object store request failed ({message}); resume with {resume}")]
    Transport { message: String, resume: ResumePoint },

    // Staging errors (30-39)
    #[error("staging I/O error at {path}: {source}")]
    StagingIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Load errors (40-49)
    #[error("failed to parse staged file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("record {request_id} failed schema validation: {message}")]
    Validation { request_id: String, message: String },

    #[error("database error: {0}")]
    Database(String),
}

impl Error {
    /// Returns the error code for this error type.
    /// Used for detailed error reporting in JSON output.
    pub fn code(&self) -> u32 {
        match self {
            Error::Config(_) => 10,
            Error::InvalidDateRange { .. } => 11,
            Error::Format { .. } => 20,
            Error::Credential { .. } => 21,
            Error::Transport { .. } => 22,
            Error::StagingIo { .. } => 30,
            Error::Parse { .. } => 40,
            Error::Validation { .. } => 41,
            Error::Database(_) => 42,
        }
    }

    /// Where a fetch run should restart, if this error interrupted one.
    pub fn resume_point(&self) -> Option<&ResumePoint> {
        match self {
            Error::Format { resume, .. }
            | Error::Credential { resume, .. }
            | Error::Transport { resume, .. } => Some(resume),
            _ => None,
        }
    }

    /// Restart point past the object this error is about.
    ///
    /// Only a format error has one. Resuming from [`Error::resume_point`]
    /// re-reads the same bytes and fails again.
    pub fn skip_point(&self) -> Option<ResumePoint> {
        match self {
            Error::Format { key, resume } => Some(ResumePoint::new(
                resume.prefix.as_str(),
                Marker::from(key.as_str()),
            )),
            _ => None,
        }
    }

    /// Wrap an I/O failure on a staging path.
    pub fn staging_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::StagingIo {
            path: path.into(),
            source,
        }
    }
}
