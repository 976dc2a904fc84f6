//! Access-log records.
//!
//! A [`RawLogRecord`] is the camelCase JSON object one gateway log line
//! carries. After correction it is validated into an [`AccessLogRecord`],
//! the fixed, fully-typed contract persisted to the analytics store.

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use uuid::Uuid;

/// One decoded log line: field name (camelCase) to JSON value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawLogRecord(pub Map<String, Value>);

impl RawLogRecord {
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn insert(&mut self, field: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(field.into(), value)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// `requestId` as text, for error reporting.
    pub fn request_id_hint(&self) -> String {
        match self.0.get("requestId") {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => "<missing requestId>".to_string(),
        }
    }
}

impl From<Map<String, Value>> for RawLogRecord {
    fn from(map: Map<String, Value>) -> Self {
        RawLogRecord(map)
    }
}

/// Validated API-gateway access-log entry.
///
/// Every field is required. Integer fields accept JSON integers or strings
/// holding a base-10 integer; anything else fails validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AccessLogRecord {
    /// Gateway request ID.
    pub request_id: Uuid,
    pub api_key: String,
    pub api_key_id: String,
    /// Derived from `request_time_epoch` during correction.
    pub request_time: DateTime<Utc>,
    /// Request time in Unix milliseconds.
    #[serde(deserialize_with = "lax_i64")]
    #[schemars(with = "i64")]
    pub request_time_epoch: i64,
    pub api_id: String,
    /// Deployed stage name.
    pub stage: String,
    pub http_method: String,
    pub protocol: String,
    pub domain_name: String,
    pub path: String,
    pub resource_path: String,
    pub user_agent: String,
    /// HTTP status code returned to the client.
    #[serde(deserialize_with = "lax_i32")]
    #[schemars(with = "i32")]
    pub status: i32,
    /// Response latency in milliseconds.
    #[serde(deserialize_with = "lax_i64")]
    #[schemars(with = "i64")]
    pub response_latency: i64,
    pub error_message: String,
    pub response_type: String,
    #[serde(deserialize_with = "lax_i64")]
    #[schemars(with = "i64")]
    pub response_length: i64,
    #[serde(deserialize_with = "lax_i32")]
    #[schemars(with = "i32")]
    pub integration_status: i32,
    /// Integration latency in milliseconds.
    #[serde(deserialize_with = "lax_i64")]
    #[schemars(with = "i64")]
    pub integration_latency: i64,
    pub integration_error: String,
    /// Client source IP.
    pub ip: String,
    pub caller: String,
    pub user: String,
}

impl AccessLogRecord {
    /// Validate a (corrected) raw record against the contract.
    pub fn from_raw(raw: RawLogRecord) -> Result<Self> {
        let request_id = raw.request_id_hint();
        serde_json::from_value(Value::Object(raw.0)).map_err(|e| Error::Validation {
            request_id,
            message: e.to_string(),
        })
    }
}

struct LaxIntVisitor;

impl<'de> Visitor<'de> for LaxIntVisitor {
    type Value = i64;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an integer or a string holding an integer")
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<i64, E> {
        Ok(v)
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<i64, E> {
        i64::try_from(v).map_err(|_| E::custom(format!("integer {v} out of range")))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> std::result::Result<i64, E> {
        if v.fract() == 0.0 && v >= i64::MIN as f64 && v <= i64::MAX as f64 {
            Ok(v as i64)
        } else {
            Err(E::custom(format!("{v} is not a whole number")))
        }
    }

    fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<i64, E> {
        v.trim()
            .parse::<i64>()
            .map_err(|_| E::custom(format!("{v:?} is not a valid integer")))
    }
}

fn lax_i64<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<i64, D::Error> {
    deserializer.deserialize_any(LaxIntVisitor)
}

fn lax_i32<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<i32, D::Error> {
    let v = deserializer.deserialize_any(LaxIntVisitor)?;
    i32::try_from(v).map_err(|_| de::Error::custom(format!("integer {v} out of range")))
}
