//! The normalized device reading model.
//!
//! A [`Reading`] is one successful snapshot of a device's fields at a point
//! in time. It is only constructed from a successful driver call, is
//! immutable once created, and is shared read-only across all sinks.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Field name to value mapping, as returned by a device driver.
pub type FieldMap = BTreeMap<String, FieldValue>;

/// One successful snapshot of a device's readable fields.
///
/// The serialized shape is the file/MQTT-visible contract: device name,
/// RFC 3339 timestamp, and a flat field map. Downstream consumers key on
/// device name + timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reading {
    /// Name of the device that produced this snapshot.
    pub device: String,

    /// Time the poll completed.
    pub timestamp: DateTime<Utc>,

    /// Decoded field values.
    pub fields: FieldMap,

    /// Whether the snapshot passed driver-level validation.
    pub valid: bool,
}

impl Reading {
    /// Create a reading with the current timestamp.
    pub fn new(device: impl Into<String>, fields: FieldMap) -> Self {
        Self {
            device: device.into(),
            timestamp: Utc::now(),
            fields,
            valid: true,
        }
    }

    /// Serialize as a single JSON line (without trailing newline).
    pub fn to_json_line(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Typed field value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// Numeric measurement (voltages, powers, temperatures).
    Float(f64),
    /// Integer value (counters, status words).
    Int(i64),
    /// Text value (serial numbers, firmware versions).
    Text(String),
    /// Boolean value (status bits).
    Bool(bool),
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Float(v)
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Int(v)
    }
}

impl From<u16> for FieldValue {
    fn from(v: u16) -> Self {
        FieldValue::Int(v as i64)
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::Text(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::Text(v.to_string())
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        FieldValue::Bool(v)
    }
}
