//! InfluxDB line protocol rendering
//!
//! Produces `measurement,tag=val[,...] field=val[,...] <epoch_ns>` with tags
//! and fields sorted by key. No escaping is applied: keys and tag values must
//! not contain commas, equals signs or spaces.

use serde_json::Value;
use tracing::debug;

use crate::error::FormatError;
use crate::point::{epoch_nanos, Clock, MeasurementPoint};

/// Format a point as a single line-protocol string
///
/// Every field value is coerced to `f64`; the first value that cannot be
/// coerced aborts formatting.
pub fn to_line(point: &MeasurementPoint, clock: &dyn Clock) -> Result<String, FormatError> {
    let time_int = epoch_nanos(&point.resolved_time(clock))?;

    let tag_str = point
        .resolved_tags()
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(",");

    let field_str = point
        .raw_fields()
        .iter()
        .map(|(k, v)| coerce_float(k, v).map(|f| format!("{k}={}", render_float(f))))
        .collect::<Result<Vec<_>, _>>()?
        .join(",");

    let line = format!("{},{tag_str} {field_str} {time_int}", point.measurement());
    debug!(line = %line, "Formatted line protocol");
    Ok(line)
}

/// Coerce a loosely typed field value to `f64`
///
/// Numbers pass through, bools map to 1.0/0.0 and strings are parsed after
/// trimming surrounding whitespace.
pub fn coerce_float(field: &str, value: &Value) -> Result<f64, FormatError> {
    let not_numeric = || FormatError::NotNumeric {
        field: field.to_string(),
        value: value.to_string(),
    };

    match value {
        Value::Number(n) => n.as_f64().ok_or_else(not_numeric),
        Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
        Value::String(s) => s.trim().parse::<f64>().map_err(|_| not_numeric()),
        Value::Null | Value::Array(_) | Value::Object(_) => Err(not_numeric()),
    }
}

/// Shortest round-trip text that always reads back as a float (`42` -> `42.0`)
pub fn render_float(value: f64) -> String {
    format!("{value:?}")
}
