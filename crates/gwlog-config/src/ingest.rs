//! Typed ingestion configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_REGION: &str = "ap-northeast-1";
pub const DEFAULT_BUCKET_SUFFIX: &str = "iapigw-access-logs";
pub const DEFAULT_OBJECT_SUFFIX: &str = ".gz";
pub const DEFAULT_STAGING_DIR: &str = "logs";
pub const DEFAULT_DATABASE_URL: &str = "postgresql://localhost/log_analysis_db";
pub const DEFAULT_TABLE_NAME: &str = "access_log";
pub const DEFAULT_MAX_CONNECTIONS: u32 = 1;

/// Subdirectory of the staging dir holding consumed files.
pub const LOADED_DIR_NAME: &str = "loaded";

/// Errors from configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("unsupported config schema version {found} (supported: {supported})")]
    UnsupportedVersion { found: String, supported: String },

    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// What the load phase does with a record that fails schema validation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationPolicy {
    /// Stop the load run at the first invalid record.
    #[default]
    Abort,
    /// Log the invalid record, count it, and continue.
    Skip,
}

impl ValidationPolicy {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "abort" => Some(Self::Abort),
            "skip" => Some(Self::Skip),
            _ => None,
        }
    }
}

impl std::fmt::Display for ValidationPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Abort => write!(f, "abort"),
            Self::Skip => write!(f, "skip"),
        }
    }
}

/// Fully resolved configuration for both pipeline phases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestConfig {
    /// AWS region of the log bucket.
    pub region: String,
    /// Custom S3 endpoint (MinIO, LocalStack). Forces path-style access.
    pub endpoint_url: Option<String>,
    /// Bucket name is `{environment}-{bucket_suffix}`.
    pub bucket_suffix: String,
    /// Only keys ending in this suffix are fetched.
    pub object_suffix: String,
    /// Directory holding pending staged files.
    pub staging_dir: PathBuf,
    pub database_url: String,
    pub table_name: String,
    pub max_connections: u32,
    pub validation_policy: ValidationPolicy,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            region: DEFAULT_REGION.to_string(),
            endpoint_url: None,
            bucket_suffix: DEFAULT_BUCKET_SUFFIX.to_string(),
            object_suffix: DEFAULT_OBJECT_SUFFIX.to_string(),
            staging_dir: PathBuf::from(DEFAULT_STAGING_DIR),
            database_url: DEFAULT_DATABASE_URL.to_string(),
            table_name: DEFAULT_TABLE_NAME.to_string(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            validation_policy: ValidationPolicy::default(),
        }
    }
}

impl IngestConfig {
    /// Bucket holding the access logs of one environment (prod, stg, dev).
    pub fn bucket_for(&self, environment: &str) -> String {
        format!("{}-{}", environment, self.bucket_suffix)
    }

    /// Where consumed staged files are moved.
    pub fn loaded_dir(&self) -> PathBuf {
        loaded_dir(&self.staging_dir)
    }

    /// Semantic validation of the resolved values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.region.trim().is_empty() {
            return Err(invalid("region", "must not be empty"));
        }
        if self.bucket_suffix.trim().is_empty() {
            return Err(invalid("bucket_suffix", "must not be empty"));
        }
        if self.object_suffix.is_empty() {
            return Err(invalid("object_suffix", "must not be empty"));
        }
        if self.staging_dir.as_os_str().is_empty() {
            return Err(invalid("staging_dir", "must not be empty"));
        }
        if !is_sql_identifier(&self.table_name) {
            return Err(invalid(
                "table_name",
                format!("{:?} is not a plain SQL identifier", self.table_name),
            ));
        }
        if self.max_connections == 0 {
            return Err(invalid("max_connections", "must be at least 1"));
        }
        Ok(())
    }
}

/// `<staging_dir>/loaded`.
pub fn loaded_dir(staging_dir: &Path) -> PathBuf {
    staging_dir.join(LOADED_DIR_NAME)
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

fn is_sql_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    name.len() <= 63 && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
