//! Measurement point and time source
//!
//! A [`MeasurementPoint`] is one observation from one device. It is built
//! per call, formatted by [`crate::line_protocol`] or [`crate::record`], and
//! dropped. Formatting never mutates the point.

use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::error::FormatError;

/// Tag key that always carries the device identifier
pub const DEVICE_TAG: &str = "dev-id";

/// Source of "now" for points without an explicit timestamp
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock frozen at a single instant
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// One telemetry observation
#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementPoint {
    device_id: String,
    measurement: String,
    fields: BTreeMap<String, Value>,
    tags: BTreeMap<String, String>,
    timestamp: Option<DateTime<Utc>>,
}

impl MeasurementPoint {
    /// Start a point for `device_id` under `measurement` (e.g. "aq")
    pub fn new(device_id: impl Into<String>, measurement: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            measurement: measurement.into(),
            fields: BTreeMap::new(),
            tags: BTreeMap::new(),
            timestamp: None,
        }
    }

    pub fn field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn fields<K, V>(mut self, fields: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        self.fields
            .extend(fields.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn tag(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(name.into(), value.into());
        self
    }

    pub fn tags<K, V>(mut self, tags: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.tags
            .extend(tags.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Set the observation time; any zone is normalized to UTC
    pub fn timestamp<Tz: TimeZone>(mut self, at: DateTime<Tz>) -> Self {
        self.timestamp = Some(at.with_timezone(&Utc));
        self
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn measurement(&self) -> &str {
        &self.measurement
    }

    /// Fields exactly as supplied, sorted by key
    pub fn raw_fields(&self) -> &BTreeMap<String, Value> {
        &self.fields
    }

    /// Caller tags merged with `dev-id`, which always wins
    pub fn resolved_tags(&self) -> BTreeMap<String, String> {
        let mut tags = self.tags.clone();
        tags.insert(DEVICE_TAG.to_string(), self.device_id.clone());
        tags
    }

    /// Explicit timestamp, or `clock.now()` when none was set
    pub fn resolved_time(&self, clock: &dyn Clock) -> DateTime<Utc> {
        self.timestamp.unwrap_or_else(|| clock.now())
    }
}

/// Nanoseconds since the Unix epoch, computed without float rounding
pub fn epoch_nanos(at: &DateTime<Utc>) -> Result<i64, FormatError> {
    at.timestamp_nanos_opt()
        .ok_or_else(|| FormatError::TimestampOutOfRange(at.to_rfc3339()))
}
