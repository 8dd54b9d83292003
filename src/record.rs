//! Structured measurement records
//!
//! The record form carries the same data as a line-protocol string but keeps
//! field values as supplied and encodes time as an ISO-8601 string.

use chrono::{DateTime, SecondsFormat, Utc};
use influxdb2::models::DataPoint;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::debug;

use crate::error::FormatError;
use crate::point::{epoch_nanos, Clock, MeasurementPoint};

/// `{measurement, tags, fields, time}` record accepted by structured write APIs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub measurement: String,
    pub tags: BTreeMap<String, String>,
    pub fields: BTreeMap<String, Value>,
    /// UTC time, e.g. `2021-05-01T00:00:00+00:00`
    pub time: String,
}

/// Format a point as a structured record
pub fn to_record(point: &MeasurementPoint, clock: &dyn Clock) -> Record {
    let time = point.resolved_time(clock);
    let record = Record {
        measurement: point.measurement().to_string(),
        tags: point.resolved_tags(),
        fields: point.raw_fields().clone(),
        time: iso_time(&time),
    };
    debug!(measurement = %record.measurement, time = %record.time, "Formatted record");
    record
}

/// RFC 3339 with a `+00:00` offset; sub-second digits only when present
pub fn iso_time(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::AutoSi, false)
}

impl Record {
    /// Parse `time` back into nanoseconds since the epoch
    pub fn epoch_nanos(&self) -> Result<i64, FormatError> {
        let at = DateTime::parse_from_rfc3339(&self.time)
            .map_err(|_| FormatError::InvalidTime(self.time.clone()))?
            .with_timezone(&Utc);
        epoch_nanos(&at)
    }

    /// Convert into an `influxdb2` data point, keeping each field's own type
    pub fn to_data_point(&self) -> Result<DataPoint, FormatError> {
        let mut builder = DataPoint::builder(self.measurement.as_str());

        for (key, value) in &self.tags {
            builder = builder.tag(key.as_str(), value.as_str());
        }

        for (key, value) in &self.fields {
            let unsupported = || FormatError::UnsupportedFieldType {
                field: key.clone(),
                value: value.to_string(),
            };
            builder = match value {
                Value::Number(n) => match n.as_i64() {
                    Some(i) => builder.field(key.as_str(), i),
                    None => builder.field(key.as_str(), n.as_f64().ok_or_else(unsupported)?),
                },
                Value::Bool(b) => builder.field(key.as_str(), *b),
                Value::String(s) => builder.field(key.as_str(), s.clone()),
                Value::Null | Value::Array(_) | Value::Object(_) => return Err(unsupported()),
            };
        }

        builder
            .timestamp(self.epoch_nanos()?)
            .build()
            .map_err(|e| FormatError::DataPoint(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::point::{FixedClock, SystemClock};
    use chrono::TimeZone;
    use serde_json::json;

    fn fixed() -> FixedClock {
        FixedClock(Utc.with_ymd_and_hms(2021, 5, 1, 0, 0, 0).unwrap())
    }

    #[test]
    fn test_record_json_shape() {
        let point = MeasurementPoint::new("1234", "test").field("temp", 42.5);
        let record = to_record(&point, &fixed());

        assert_eq!(
            serde_json::to_value(&record).unwrap(),
            json!({
                "measurement": "test",
                "tags": {"dev-id": "1234"},
                "fields": {"temp": 42.5},
                "time": "2021-05-01T00:00:00+00:00"
            })
        );
    }

    #[test]
    fn test_record_time_is_iso_8601() {
        let point = MeasurementPoint::new("1234", "test").field("temp", 42.5);
        let record = to_record(&point, &SystemClock);

        assert!(record.time.ends_with("+00:00"), "unexpected time: {}", record.time);
        assert!(DateTime::parse_from_rfc3339(&record.time).is_ok());
    }

    #[test]
    fn test_record_fields_not_coerced() {
        let point = MeasurementPoint::new("1234", "aq")
            .field("count", 42)
            .field("status", "ok");
        let record = to_record(&point, &fixed());

        assert_eq!(record.fields["count"], json!(42));
        assert_eq!(record.fields["status"], json!("ok"));
    }

    #[test]
    fn test_record_sort_and_override() {
        let a = MeasurementPoint::new("1234", "aq")
            .tag("dev-id", "other")
            .tag("site", "roof")
            .field("pm25", 1.0)
            .field("pm10", 2.0);
        let b = MeasurementPoint::new("1234", "aq")
            .field("pm10", 2.0)
            .field("pm25", 1.0)
            .tag("site", "roof");

        let ra = to_record(&a, &fixed());
        assert_eq!(ra, to_record(&b, &fixed()));
        assert_eq!(ra.tags["dev-id"], "1234");
        assert_eq!(
            serde_json::to_string(&ra).unwrap(),
            r#"{"measurement":"aq","tags":{"dev-id":"1234","site":"roof"},"fields":{"pm10":2.0,"pm25":1.0},"time":"2021-05-01T00:00:00+00:00"}"#
        );
    }

    #[test]
    fn test_record_subsecond_time() {
        let at = DateTime::parse_from_rfc3339("2021-05-01T00:00:00.250Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(iso_time(&at), "2021-05-01T00:00:00.250+00:00");
    }

    #[test]
    fn test_epoch_nanos_roundtrip() {
        let point = MeasurementPoint::new("1234", "test").field("temp", 1);
        let record = to_record(&point, &fixed());
        assert_eq!(record.epoch_nanos().unwrap(), 1_619_827_200_000_000_000);
    }

    #[test]
    fn test_data_point_rejects_nested_fields() {
        let point = MeasurementPoint::new("1234", "aq").field("nested", json!({"a": 1}));
        let record = to_record(&point, &fixed());
        assert!(matches!(
            record.to_data_point(),
            Err(FormatError::UnsupportedFieldType { .. })
        ));
    }

    #[test]
    fn test_data_point_from_record() {
        let point = MeasurementPoint::new("1234", "aq")
            .field("pm10", 12.5)
            .field("count", 3)
            .field("status", "ok");
        let record = to_record(&point, &fixed());
        assert!(record.to_data_point().is_ok());
    }
}
