//! Single-point write path
//!
//! One call, one payload, one acknowledged write. Nothing is buffered and
//! nothing is retried: client errors reach the caller unchanged.

use async_trait::async_trait;
use tracing::{debug, info};

use crate::error::ClientError;
use crate::query::QueryRecord;
use crate::record::Record;

/// Serialized measurement ready to send
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Raw line protocol
    Line(String),
    /// Structured record, encoded by the client
    Record(Record),
}

impl Payload {
    pub fn kind(&self) -> &'static str {
        match self {
            Payload::Line(_) => "line",
            Payload::Record(_) => "record",
        }
    }
}

/// Time-series database operations used by this crate
#[async_trait]
pub trait TimeSeriesClient: Send + Sync {
    /// Write one payload and wait for the server to acknowledge it
    async fn write(&self, bucket: &str, org: &str, payload: &Payload) -> Result<(), ClientError>;

    /// Run a Flux query and return its records in table order
    async fn query(&self, flux: &str) -> Result<Vec<QueryRecord>, ClientError>;

    /// Called when a [`WriteApi`] handle is released
    fn release_write(&self) {}
}

/// Write handle scoped to a single write; released on drop
pub struct WriteApi<'a, C: TimeSeriesClient + ?Sized> {
    client: &'a C,
}

impl<'a, C: TimeSeriesClient + ?Sized> WriteApi<'a, C> {
    pub fn acquire(client: &'a C) -> Self {
        debug!("Write API acquired");
        Self { client }
    }

    pub async fn write(&self, bucket: &str, org: &str, payload: &Payload) -> Result<(), ClientError> {
        self.client.write(bucket, org, payload).await
    }
}

impl<C: TimeSeriesClient + ?Sized> Drop for WriteApi<'_, C> {
    fn drop(&mut self) {
        self.client.release_write();
        debug!("Write API released");
    }
}

/// Write one payload synchronously with respect to the caller
///
/// # Arguments
/// * `client` - Connected database client
/// * `bucket` - Target bucket
/// * `org` - Target organization
/// * `payload` - Line protocol or structured record
pub async fn write_data<C: TimeSeriesClient + ?Sized>(
    client: &C,
    bucket: &str,
    org: &str,
    payload: &Payload,
) -> Result<(), ClientError> {
    let api = WriteApi::acquire(client);
    api.write(bucket, org, payload).await?;

    info!(bucket = bucket, org = org, kind = payload.kind(), "Wrote point to InfluxDB");
    Ok(())
}
