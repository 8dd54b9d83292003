//! InfluxDB connection parameters
//!
//! Parameters come from one of three places:
//! - environment variables (`INFLUXDB_URL`, `INFLUXDB_TOKEN`, `INFLUXDB_ORG`, `INFLUXDB_BUCKET`)
//! - command-line flags, handled by clap in the binary
//! - a TOML file with an `[influxdb]` table, with `INFLUXDB_TOKEN` overriding the file token

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fmt;
use std::fs;
use tracing::info;

pub const ENV_URL: &str = "INFLUXDB_URL";
pub const ENV_TOKEN: &str = "INFLUXDB_TOKEN";
pub const ENV_ORG: &str = "INFLUXDB_ORG";
pub const ENV_BUCKET: &str = "INFLUXDB_BUCKET";

/// API token; never printed
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Token(String);

impl Token {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Token(***)")
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}

/// Config file layout
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub influxdb: InfluxDbConfig,
}

/// Complete, validated connection settings
#[derive(Debug, Clone, Deserialize)]
pub struct InfluxDbConfig {
    pub url: String,
    pub org: String,
    pub bucket: String,
    pub token: Token,
}

impl Config {
    /// Load configuration from file
    ///
    /// `INFLUXDB_TOKEN` in the environment overrides the file token.
    pub fn load(path: &str) -> Result<Self> {
        let config_str = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path))?;

        let mut config: Config = toml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path))?;

        if let Ok(token) = std::env::var(ENV_TOKEN) {
            info!("Using {} from environment", ENV_TOKEN);
            config.influxdb.token = Token::new(token);
        }

        config.influxdb.validate()?;

        Ok(config)
    }
}

impl InfluxDbConfig {
    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if !self.url.starts_with("http://") && !self.url.starts_with("https://") {
            anyhow::bail!("Invalid InfluxDB URL: {} (must start with http:// or https://)", self.url);
        }

        if self.org.is_empty() {
            anyhow::bail!("InfluxDB org must not be empty");
        }

        if self.bucket.is_empty() {
            anyhow::bail!("InfluxDB bucket must not be empty");
        }

        Ok(())
    }
}

/// Resolved `(url, token, org, bucket)`; any part may be missing in env mode
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConnectionParams {
    pub url: Option<String>,
    pub token: Option<Token>,
    pub org: Option<String>,
    pub bucket: Option<String>,
}

impl ConnectionParams {
    /// Read the four `INFLUXDB_*` variables without checking presence
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read parameters through `lookup`, keyed by environment variable name
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let params = Self {
            url: lookup(ENV_URL),
            token: lookup(ENV_TOKEN).map(Token::new),
            org: lookup(ENV_ORG),
            bucket: lookup(ENV_BUCKET),
        };
        params.log_resolved("environment");
        params
    }

    /// Parameters given as command-line flags
    pub fn from_args(url: String, token: String, org: String, bucket: String) -> Self {
        let params = Self {
            url: Some(url),
            token: Some(Token::new(token)),
            org: Some(org),
            bucket: Some(bucket),
        };
        params.log_resolved("command line");
        params
    }

    pub fn from_config(config: &InfluxDbConfig) -> Self {
        let params = Self {
            url: Some(config.url.clone()),
            token: Some(config.token.clone()),
            org: Some(config.org.clone()),
            bucket: Some(config.bucket.clone()),
        };
        params.log_resolved("config file");
        params
    }

    /// Turn the parameters into a validated config, naming the first missing one
    pub fn require(&self) -> Result<InfluxDbConfig> {
        let config = InfluxDbConfig {
            url: self.url.clone().with_context(|| format!("{} is not set", ENV_URL))?,
            token: self.token.clone().with_context(|| format!("{} is not set", ENV_TOKEN))?,
            org: self.org.clone().with_context(|| format!("{} is not set", ENV_ORG))?,
            bucket: self
                .bucket
                .clone()
                .with_context(|| format!("{} is not set", ENV_BUCKET))?,
        };
        config.validate()?;
        Ok(config)
    }

    fn log_resolved(&self, source: &str) {
        info!(
            source = source,
            url = ?self.url,
            org = ?self.org,
            bucket = ?self.bucket,
            token_set = self.token.is_some(),
            "Got InfluxDB parameters"
        );
    }
}
