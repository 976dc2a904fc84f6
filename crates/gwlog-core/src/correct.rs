//! Field corrections applied before schema validation.
//!
//! The gateway's own `requestTime` string is not reliably parseable, so it is
//! rebuilt from `requestTimeEpoch` (milliseconds). The integration fields are
//! sometimes emitted as `"-"` or as numeric strings and are coerced to
//! integers.

use chrono::{DateTime, SecondsFormat};
use gwlog_common::RawLogRecord;
use serde_json::Value;

pub const REQUEST_TIME: &str = "requestTime";
pub const REQUEST_TIME_EPOCH: &str = "requestTimeEpoch";
pub const COERCED_FIELDS: [&str; 2] = ["integrationStatus", "integrationLatency"];

/// Correct one record. Idempotent.
///
/// Fields other than `requestTime` and the coerced fields pass through
/// untouched. Absent fields stay absent so validation can report them.
pub fn correct_record(mut record: RawLogRecord) -> RawLogRecord {
    if let Some(time) = record.get(REQUEST_TIME_EPOCH).and_then(request_time_from_epoch) {
        record.insert(REQUEST_TIME, Value::String(time));
    }
    for field in COERCED_FIELDS {
        if let Some(value) = record.get(field) {
            let coerced = coerce_int(value);
            record.insert(field, Value::from(coerced));
        }
    }
    record
}

/// Integer value of `value`, or 0 when it has none.
///
/// Integers pass through, floats truncate toward zero, strings are parsed as
/// base-10 after trimming whitespace.
pub fn coerce_int(value: &Value) -> i64 {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64))
            .unwrap_or(0),
        Value::String(s) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

/// UTC RFC 3339 timestamp with millisecond precision.
fn request_time_from_epoch(epoch: &Value) -> Option<String> {
    let millis = match epoch {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if !millis.is_finite() {
        return None;
    }
    let time = DateTime::from_timestamp_millis(millis.trunc() as i64)?;
    Some(time.to_rfc3339_opts(SecondsFormat::Millis, true))
}
