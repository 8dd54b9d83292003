//! Example Flux query against the air-quality bucket

use serde::Serialize;
use std::collections::BTreeMap;
use tracing::info;

use crate::error::ClientError;
use crate::writer::TimeSeriesClient;

/// Fixed demonstration query: PM10/PM2.5 for one sensor on 2021-05-01
pub const EXAMPLE_QUERY: &str = r#"
from(bucket: "AapoTest")
  |> range(start: 2021-05-01T00:00:00Z, stop: 2021-05-02T00:00:00Z)
  |> filter(fn: (r) => r["_measurement"] == "aq")
  |> filter(fn: (r) => r["_field"] == "pm10" or r["_field"] == "pm25")
  |> filter(fn: (r) => r["dev-id"] == "84:0D:8E:8F:51:6E")
  |> yield(name: "mean")
"#;

/// Value column of a query result
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum QueryValue {
    Double(f64),
    Long(i64),
    UnsignedLong(u64),
    Bool(bool),
    String(String),
    Null,
}

/// One record: its `_field` name and `_value`
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRecord {
    pub field: String,
    pub value: QueryValue,
}

/// `{field_name: value}` with a single entry
pub type QueryRow = BTreeMap<String, QueryValue>;

/// Run [`EXAMPLE_QUERY`] and return one row per record, in result order
pub async fn run_example_query<C: TimeSeriesClient + ?Sized>(
    client: &C,
) -> Result<Vec<QueryRow>, ClientError> {
    let records = client.query(EXAMPLE_QUERY).await?;

    let rows: Vec<QueryRow> = records
        .into_iter()
        .map(|record| QueryRow::from([(record.field, record.value)]))
        .collect();

    info!(rows = rows.len(), "Query done");
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::tests::FakeClient;

    #[tokio::test]
    async fn test_rows_follow_record_order() {
        let client = FakeClient::with_records(vec![
            ("pm25", QueryValue::Double(3.5)),
            ("pm10", QueryValue::Double(12.0)),
            ("pm25", QueryValue::Double(4.0)),
        ]);

        let rows = run_example_query(&client).await.unwrap();

        assert_eq!(rows.len(), 3);
        assert!(rows.iter().all(|row| row.len() == 1));
        assert_eq!(rows[0]["pm25"], QueryValue::Double(3.5));
        assert_eq!(rows[1]["pm10"], QueryValue::Double(12.0));
        assert_eq!(rows[2]["pm25"], QueryValue::Double(4.0));

        let queries = client.queries.lock().unwrap();
        assert_eq!(queries.len(), 1);
        assert_eq!(queries[0], EXAMPLE_QUERY);
    }

    #[tokio::test]
    async fn test_empty_result() {
        let client = FakeClient::default();
        assert!(run_example_query(&client).await.unwrap().is_empty());
    }

    #[test]
    fn test_row_serializes_as_object() {
        let row = QueryRow::from([("pm10".to_string(), QueryValue::Double(12.5))]);
        assert_eq!(serde_json::to_string(&row).unwrap(), r#"{"pm10":12.5}"#);
    }
}
