//! Error types for formatting and database access

use thiserror::Error;

/// Failure while turning a measurement into a payload
#[derive(Debug, Error)]
pub enum FormatError {
    /// A field value could not be coerced to a float
    #[error("field `{field}` is not numeric: {value}")]
    NotNumeric { field: String, value: String },

    /// A field value has no InfluxDB field type (null, array or object)
    #[error("field `{field}` has unsupported type: {value}")]
    UnsupportedFieldType { field: String, value: String },

    /// The instant does not fit in i64 nanoseconds since the epoch
    #[error("timestamp {0} is outside the nanosecond epoch range")]
    TimestampOutOfRange(String),

    /// The record time string is not RFC 3339
    #[error("invalid record time `{0}`")]
    InvalidTime(String),

    #[error("failed to build data point: {0}")]
    DataPoint(String),
}

/// Failure reported by the time-series database client
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("InfluxDB request failed: {0}")]
    Request(#[from] influxdb2::RequestError),

    #[error(transparent)]
    Format(#[from] FormatError),

    #[error("failed to encode line protocol: {0}")]
    Encode(#[from] std::io::Error),
}
