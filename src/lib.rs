//! Device telemetry to InfluxDB
//!
//! Formats single measurements as line protocol or structured records and
//! writes them to InfluxDB 2.x, one acknowledged write per call.

pub mod config;
pub mod error;
pub mod influxdb;
pub mod line_protocol;
pub mod point;
pub mod query;
pub mod record;
pub mod writer;

pub use error::{ClientError, FormatError};
pub use point::{Clock, FixedClock, MeasurementPoint, SystemClock};
pub use writer::{write_data, Payload, TimeSeriesClient};
