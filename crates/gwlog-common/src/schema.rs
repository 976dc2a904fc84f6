//! Record contract versioning and JSON Schema export.

use crate::record::AccessLogRecord;
use schemars::schema::RootSchema;

/// Version of the JSON documents gwlog emits (run summaries, schema export).
///
/// Follows semver: MAJOR.MINOR.PATCH
/// - MAJOR: Breaking changes (field removals, type changes)
/// - MINOR: Additive changes (new optional fields)
/// - PATCH: Bug fixes, documentation
pub const SCHEMA_VERSION: &str = "1.0.0";

/// JSON Schema of the validated access-log record.
pub fn access_log_json_schema() -> RootSchema {
    schemars::schema_for!(AccessLogRecord)
}
