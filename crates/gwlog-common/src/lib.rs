//! gwlog common types, keys, records, and errors.
//!
//! This crate provides foundational types shared across gwlog crates:
//! - Date ranges and storage keys / resume markers
//! - Raw and validated access-log records
//! - The unified fatal error type
//! - Record contract versioning

pub mod error;
pub mod key;
pub mod range;
pub mod record;
pub mod schema;

pub use error::{Error, Result};
pub use key::{Marker, ObjectKey, ResumePoint};
pub use range::DateRange;
pub use record::{AccessLogRecord, RawLogRecord};
pub use schema::SCHEMA_VERSION;
