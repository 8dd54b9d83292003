//! InfluxDB 2.x client
//!
//! This module provides the concrete [`TimeSeriesClient`]:
//! - Writes line protocol to `/api/v2/write` for an explicit org and bucket
//! - Encodes structured records through `influxdb2` data points
//! - Runs Flux queries and flattens the records to `_field`/`_value` pairs
//! - Probes `/health` before work

use anyhow::{Context, Result};
use async_trait::async_trait;
use influxdb2::models::{Query, WriteDataPoint};
use influxdb2::Client;
use influxdb2_structmap::value::Value;
use tracing::{debug, info};

use crate::config::InfluxDbConfig;
use crate::error::ClientError;
use crate::query::{QueryRecord, QueryValue};
use crate::writer::{Payload, TimeSeriesClient};

/// InfluxDB client for writing and querying telemetry
pub struct InfluxDbClient {
    client: Client,
    bucket: String,
    org: String,
    url: String,
}

impl InfluxDbClient {
    /// Create a new InfluxDB client
    ///
    /// No request is made here; an unreachable server or a bad token
    /// surfaces on the first write or query.
    pub fn new(config: &InfluxDbConfig) -> Result<Self> {
        config.validate().context("Invalid InfluxDB configuration")?;
        info!(url = %config.url, org = %config.org, bucket = %config.bucket, "Creating InfluxDB client");

        let client = Client::new(config.url.as_str(), config.org.as_str(), config.token.expose());

        Ok(Self {
            client,
            bucket: config.bucket.clone(),
            org: config.org.clone(),
            url: config.url.trim_end_matches('/').to_string(),
        })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn org(&self) -> &str {
        &self.org
    }

    /// Test connection to InfluxDB with health check
    pub async fn health_check(&self) -> Result<()> {
        info!("Testing InfluxDB connection...");

        // influxdb2 has no /health call, go through reqwest
        let health_url = format!("{}/health", self.url);

        let response = reqwest::get(&health_url)
            .await
            .context("Failed to connect to InfluxDB health endpoint")?;

        let status = response.status();
        if status.is_success() {
            info!(status = %status, "InfluxDB health check passed");
            Ok(())
        } else {
            anyhow::bail!("InfluxDB health check failed with status: {}", status)
        }
    }
}

/// Line-protocol body for a payload
fn encode_payload(payload: &Payload) -> Result<String, ClientError> {
    match payload {
        Payload::Line(line) => Ok(line.clone()),
        Payload::Record(record) => {
            let point = record.to_data_point()?;
            let mut body = Vec::new();
            point.write_data_point_to(&mut body)?;
            Ok(String::from_utf8_lossy(&body).trim_end().to_string())
        }
    }
}

fn convert_value(value: Option<&Value>) -> QueryValue {
    match value {
        Some(Value::Double(d)) => QueryValue::Double(d.0),
        Some(Value::Long(l)) => QueryValue::Long(*l),
        Some(Value::UnsignedLong(u)) => QueryValue::UnsignedLong(*u),
        Some(Value::Bool(b)) => QueryValue::Bool(*b),
        Some(Value::String(s)) => QueryValue::String(s.clone()),
        Some(Value::TimeRFC(t)) => QueryValue::String(t.to_rfc3339()),
        Some(other) => QueryValue::String(format!("{:?}", other)),
        None => QueryValue::Null,
    }
}

#[async_trait]
impl TimeSeriesClient for InfluxDbClient {
    async fn write(&self, bucket: &str, org: &str, payload: &Payload) -> Result<(), ClientError> {
        let body = encode_payload(payload)?;
        debug!(bucket = bucket, org = org, bytes = body.len(), "Writing line protocol");

        self.client.write_line_protocol(org, bucket, body).await?;
        Ok(())
    }

    async fn query(&self, flux: &str) -> Result<Vec<QueryRecord>, ClientError> {
        debug!(query = flux, "Running Flux query");

        let records = self
            .client
            .query_raw(Some(Query::new(flux.to_string())))
            .await?;

        Ok(records
            .iter()
            .map(|record| QueryRecord {
                field: match record.values.get("_field") {
                    Some(Value::String(field)) => field.clone(),
                    _ => String::new(),
                },
                value: convert_value(record.values.get("_value")),
            })
            .collect())
    }

    fn release_write(&self) {
        debug!(bucket = %self.bucket, "Write channel closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Token;
    use crate::point::{FixedClock, MeasurementPoint};
    use crate::record::to_record;
    use chrono::{TimeZone, Utc};

    fn config() -> InfluxDbConfig {
        InfluxDbConfig {
            url: "http://localhost:8086/".to_string(),
            org: "my-org".to_string(),
            bucket: "telemetry".to_string(),
            token: Token::new("test-token"),
        }
    }

    #[test]
    fn test_influxdb_client_creation() {
        let client = InfluxDbClient::new(&config()).unwrap();
        assert_eq!(client.bucket(), "telemetry");
        assert_eq!(client.org(), "my-org");
        assert_eq!(client.url, "http://localhost:8086");
    }

    #[test]
    fn test_client_rejects_bad_url() {
        let mut config = config();
        config.url = "localhost:8086".to_string();
        assert!(InfluxDbClient::new(&config).is_err());
    }

    #[test]
    fn test_encode_line_payload_verbatim() {
        let line = "test,dev-id=1234 temp=42.5 1619827200000000000".to_string();
        assert_eq!(encode_payload(&Payload::Line(line.clone())).unwrap(), line);
    }

    #[test]
    fn test_encode_record_payload() {
        let clock = FixedClock(Utc.with_ymd_and_hms(2021, 5, 1, 0, 0, 0).unwrap());
        let point = MeasurementPoint::new("1234", "test").field("temp", 42.5);
        let body = encode_payload(&Payload::Record(to_record(&point, &clock))).unwrap();

        assert!(body.starts_with("test,dev-id=1234 temp=42.5"), "unexpected body: {body}");
        assert!(body.ends_with(" 1619827200000000000"), "unexpected body: {body}");
    }

    #[test]
    fn test_convert_missing_value() {
        assert_eq!(convert_value(None), QueryValue::Null);
        assert_eq!(
            convert_value(Some(&Value::String("ok".to_string()))),
            QueryValue::String("ok".to_string())
        );
    }
}
