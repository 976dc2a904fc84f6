//! In-memory [`ObjectStore`] for tests.

use super::{ListPage, ObjectStore, StoreError};
use async_trait::async_trait;
use gwlog_common::{Marker, ObjectKey};
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

const DEFAULT_PAGE_SIZE: usize = 1000;

/// A single bucket's worth of objects, with scripted failures.
#[derive(Debug)]
pub struct MemoryObjectStore {
    objects: BTreeMap<String, Vec<u8>>,
    page_size: usize,
    get_failures: HashMap<String, StoreError>,
    list_failures: HashMap<String, StoreError>,
    list_calls: Mutex<Vec<(String, Marker)>>,
    get_calls: Mutex<Vec<ObjectKey>>,
}

impl Default for MemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self {
            objects: BTreeMap::new(),
            page_size: DEFAULT_PAGE_SIZE,
            get_failures: HashMap::new(),
            list_failures: HashMap::new(),
            list_calls: Mutex::new(Vec::new()),
            get_calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn with_object(mut self, key: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        self.objects.insert(key.into(), body.into());
        self
    }

    /// Every read of `key` fails with `error`.
    pub fn fail_get(mut self, key: impl Into<String>, error: StoreError) -> Self {
        self.get_failures.insert(key.into(), error);
        self
    }

    /// Every listing of `prefix` fails with `error`.
    pub fn fail_list(mut self, prefix: impl Into<String>, error: StoreError) -> Self {
        self.list_failures.insert(prefix.into(), error);
        self
    }

    /// `(prefix, marker)` of every listing request, in order.
    pub fn list_calls(&self) -> Vec<(String, Marker)> {
        self.list_calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Keys read so far, in order.
    pub fn get_calls(&self) -> Vec<ObjectKey> {
        self.get_calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn list(
        &self,
        _bucket: &str,
        prefix: &str,
        marker: &Marker,
    ) -> Result<ListPage, StoreError> {
        if let Ok(mut calls) = self.list_calls.lock() {
            calls.push((prefix.to_string(), marker.clone()));
        }
        if let Some(err) = self.list_failures.get(prefix) {
            return Err(err.clone());
        }

        let mut matching = self
            .objects
            .keys()
            .filter(|k| k.starts_with(prefix) && k.as_str() > marker.as_str());
        let entries: Vec<ObjectKey> = matching
            .by_ref()
            .take(self.page_size)
            .map(|k| ObjectKey::from(k.as_str()))
            .collect();
        let truncated = matching.next().is_some();
        Ok(ListPage { entries, truncated })
    }

    async fn get(&self, _bucket: &str, key: &ObjectKey) -> Result<Vec<u8>, StoreError> {
        if let Ok(mut calls) = self.get_calls.lock() {
            calls.push(key.clone());
        }
        if let Some(err) = self.get_failures.get(key.as_str()) {
            return Err(err.clone());
        }
        self.objects
            .get(key.as_str())
            .cloned()
            .ok_or_else(|| StoreError::Transport(format!("NoSuchKey: {key}")))
    }
}
