//! Object store seam.
//!
//! The fetch phase only needs two calls from the remote store: a
//! marker-based listing page and a whole-object read. The production
//! implementation is [`S3ObjectStore`]; tests use `MemoryObjectStore`.

use async_trait::async_trait;
use gwlog_common::{Marker, ObjectKey};
use thiserror::Error;

#[cfg(any(test, feature = "test-utils"))]
pub mod memory;
pub mod s3;

#[cfg(any(test, feature = "test-utils"))]
pub use memory::MemoryObjectStore;
pub use s3::{create_s3_client, S3Config, S3ObjectStore};

/// One page of a listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListPage {
    /// Keys in lexicographic order, all strictly after the request marker.
    pub entries: Vec<ObjectKey>,
    /// More keys exist after the last entry.
    pub truncated: bool,
}

/// Failure talking to the object store.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// Session credentials expired or could not be refreshed.
    #[error("credentials unavailable: {0}")]
    Credentials(String),

    #[error("transport failure: {0}")]
    Transport(String),
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// List keys under `prefix` that sort after `marker`.
    async fn list(
        &self,
        bucket: &str,
        prefix: &str,
        marker: &Marker,
    ) -> Result<ListPage, StoreError>;

    /// Read a whole object into memory.
    async fn get(&self, bucket: &str, key: &ObjectKey) -> Result<Vec<u8>, StoreError>;
}
