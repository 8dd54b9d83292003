//! influx-telemetry CLI
//!
//! ```bash
//! # Connection from flags
//! influx-telemetry --url http://localhost:8086 --token $TOKEN --org my-org --bucket telemetry \
//!     write 84:0D:8E:8F:51:6E aq --field pm10=12.5 --field pm25=3.1 --tag site=roof
//!
//! # Connection from INFLUXDB_URL / INFLUXDB_TOKEN / INFLUXDB_ORG / INFLUXDB_BUCKET
//! influx-telemetry --from-env query
//!
//! # Connection from a TOML file
//! influx-telemetry --config influx.toml health
//! ```

use anyhow::{Context, Result};
use chrono::{DateTime, FixedOffset};
use clap::{Parser, Subcommand, ValueEnum};
use influx_telemetry::config::{Config, ConnectionParams};
use influx_telemetry::influxdb::InfluxDbClient;
use influx_telemetry::line_protocol::to_line;
use influx_telemetry::query::run_example_query;
use influx_telemetry::record::to_record;
use influx_telemetry::{write_data, MeasurementPoint, Payload, SystemClock};
use serde_json::Value;
use tracing::info;

#[derive(Parser)]
#[command(name = "influx-telemetry")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Write device telemetry to InfluxDB 2.x")]
struct Cli {
    /// InfluxDB url
    #[arg(long, required_unless_present_any = ["from_env", "config"])]
    url: Option<String>,

    /// InfluxDB token
    #[arg(long, required_unless_present_any = ["from_env", "config"])]
    token: Option<String>,

    /// InfluxDB organization
    #[arg(long, required_unless_present_any = ["from_env", "config"])]
    org: Option<String>,

    /// InfluxDB bucket name
    #[arg(long, required_unless_present_any = ["from_env", "config"])]
    bucket: Option<String>,

    /// Read connection parameters from INFLUXDB_* environment variables
    #[arg(long, conflicts_with_all = ["url", "token", "org", "bucket", "config"])]
    from_env: bool,

    /// Read connection parameters from a TOML file with an [influxdb] table
    #[arg(long, conflicts_with_all = ["url", "token", "org", "bucket"])]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write one measurement
    Write {
        /// Device id, stored as the dev-id tag
        device_id: String,

        /// Measurement name
        measurement: String,

        /// Field as key=value (repeatable)
        #[arg(short, long = "field", value_parser = parse_field, required = true)]
        fields: Vec<(String, Value)>,

        /// Tag as key=value (repeatable)
        #[arg(short, long = "tag", value_parser = parse_tag)]
        tags: Vec<(String, String)>,

        /// RFC 3339 timestamp; defaults to now
        #[arg(long, value_parser = parse_timestamp)]
        timestamp: Option<DateTime<FixedOffset>>,

        /// Payload format
        #[arg(long, value_enum, default_value = "line")]
        format: FormatArg,

        /// Print the payload instead of writing it
        #[arg(long)]
        dry_run: bool,
    },

    /// Run the example air-quality query
    Query,

    /// Write a random "test" temperature for device 1234
    Demo,

    /// Check the server's /health endpoint
    Health,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum FormatArg {
    Line,
    Record,
}

fn split_pair(s: &str) -> Result<(&str, &str), String> {
    s.split_once('=')
        .filter(|(k, _)| !k.is_empty())
        .ok_or_else(|| format!("expected key=value, got `{s}`"))
}

/// JSON scalars are kept typed (`42`, `true`), anything else is a string
fn parse_field(s: &str) -> Result<(String, Value), String> {
    let (key, raw) = split_pair(s)?;
    let value = serde_json::from_str::<Value>(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
    Ok((key.to_string(), value))
}

fn parse_tag(s: &str) -> Result<(String, String), String> {
    let (key, value) = split_pair(s)?;
    Ok((key.to_string(), value.to_string()))
}

fn parse_timestamp(s: &str) -> Result<DateTime<FixedOffset>, String> {
    DateTime::parse_from_rfc3339(s).map_err(|e| format!("invalid RFC 3339 timestamp `{s}`: {e}"))
}

fn resolve_params(cli: &Cli) -> Result<ConnectionParams> {
    if let Some(path) = &cli.config {
        let config = Config::load(path).with_context(|| format!("Failed to load {}", path))?;
        return Ok(ConnectionParams::from_config(&config.influxdb));
    }

    if cli.from_env {
        return Ok(ConnectionParams::from_env());
    }

    Ok(ConnectionParams::from_args(
        cli.url.clone().context("--url is required")?,
        cli.token.clone().context("--token is required")?,
        cli.org.clone().context("--org is required")?,
        cli.bucket.clone().context("--bucket is required")?,
    ))
}

fn connect(params: &ConnectionParams) -> Result<InfluxDbClient> {
    let config = params.require().context("Incomplete InfluxDB parameters")?;
    InfluxDbClient::new(&config).context("Failed to create InfluxDB client")
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let params = resolve_params(&cli)?;

    match cli.command {
        Command::Write {
            device_id,
            measurement,
            fields,
            tags,
            timestamp,
            format,
            dry_run,
        } => {
            let mut point = MeasurementPoint::new(device_id, measurement)
                .fields(fields)
                .tags(tags);
            if let Some(at) = timestamp {
                point = point.timestamp(at);
            }

            let payload = match format {
                FormatArg::Line => Payload::Line(to_line(&point, &SystemClock)?),
                FormatArg::Record => Payload::Record(to_record(&point, &SystemClock)),
            };

            if dry_run {
                match &payload {
                    Payload::Line(line) => println!("{}", line),
                    Payload::Record(record) => println!("{}", serde_json::to_string(record)?),
                }
                return Ok(());
            }

            let client = connect(&params)?;
            write_data(&client, client.bucket(), client.org(), &payload)
                .await
                .context("Failed to write data point to InfluxDB")?;
        }
        Command::Query => {
            let client = connect(&params)?;
            let rows = run_example_query(&client)
                .await
                .context("Failed to run example query")?;
            for row in rows {
                println!("{}", serde_json::to_string(&row)?);
            }
        }
        Command::Demo => {
            let client = connect(&params)?;
            let temp = 42.0 + rand::random::<f64>();
            let point = MeasurementPoint::new("1234", "test").field("temp", temp);
            let payload = Payload::Record(to_record(&point, &SystemClock));

            write_data(&client, client.bucket(), client.org(), &payload)
                .await
                .context("Failed to write demo point")?;
            info!(temp = temp, "Demo point written");
        }
        Command::Health => {
            let client = connect(&params)?;
            client.health_check().await?;
        }
    }

    Ok(())
}
