//! Storage keys and resume markers.
//!
//! Object keys are opaque strings ordered lexicographically by the remote
//! store. A [`Marker`] is the last key seen and is exclusive: listing with a
//! marker returns only keys that sort after it.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Remote object key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectKey(pub String);

impl ObjectKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this key belongs to the compressed log corpus.
    pub fn has_suffix(&self, suffix: &str) -> bool {
        self.0.ends_with(suffix)
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ObjectKey {
    fn from(key: &str) -> Self {
        ObjectKey(key.to_string())
    }
}

impl From<String> for ObjectKey {
    fn from(key: String) -> Self {
        ObjectKey(key)
    }
}

/// Listing resume cursor. Empty means "from the beginning".
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Marker(pub String);

impl Marker {
    /// The marker for a fresh run.
    pub fn start() -> Self {
        Marker(String::new())
    }

    pub fn is_start(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Advance past the given key.
    pub fn advance(&mut self, key: &ObjectKey) {
        self.0.clear();
        self.0.push_str(key.as_str());
    }
}

impl fmt::Display for Marker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            write!(f, "\"\"")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

impl From<&str> for Marker {
    fn from(key: &str) -> Self {
        Marker(key.to_string())
    }
}

impl From<String> for Marker {
    fn from(key: String) -> Self {
        Marker(key)
    }
}

/// Coordinates an operator passes back in to restart an interrupted fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumePoint {
    /// Date prefix being listed when the run stopped.
    pub prefix: String,
    /// Marker of the last key fully handed to the staging writer.
    pub marker: Marker,
}

impl ResumePoint {
    pub fn new(prefix: impl Into<String>, marker: Marker) -> Self {
        Self {
            prefix: prefix.into(),
            marker,
        }
    }
}

impl fmt::Display for ResumePoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "prefix={} marker={}", self.prefix, self.marker)
    }
}
