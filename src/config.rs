use std::{str::FromStr, time::Duration};

use anyhow::{Context, Result};

use crate::telemetry::alerts::Thresholds;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    /// Latest-value cache: `redis://...`, or `memory://` for a single instance.
    pub cache_url: String,
    pub alert_webhook_url: String,
    /// Bearer token required on ingest. `None` disables the check.
    pub ingest_token: Option<String>,
    pub server_host: String,
    pub server_port: u16,
    pub db_max_connections: u32,
    /// Upper bound on waiting for a store connection, in seconds.
    pub db_acquire_timeout_secs: u64,
    /// Webhook request timeout in seconds.
    pub alert_timeout_secs: u64,
    pub thresholds: Thresholds,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup.
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.is_empty())
                .with_context(|| format!("missing required env var: {key}"))
        };
        let optional = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_owned());

        let defaults = Thresholds::default();

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            cache_url: required("CACHE_URL")?,
            alert_webhook_url: required("ALERT_WEBHOOK_URL")?,
            ingest_token: lookup("INGEST_TOKEN").filter(|t| !t.is_empty()),
            server_host: optional("SERVER_HOST", "0.0.0.0"),
            server_port: parse(&optional("SERVER_PORT", "8080"), "SERVER_PORT")?,
            db_max_connections: parse(&optional("DB_MAX_CONNECTIONS", "10"), "DB_MAX_CONNECTIONS")?,
            db_acquire_timeout_secs: parse(
                &optional("DB_ACQUIRE_TIMEOUT_SECS", "5"),
                "DB_ACQUIRE_TIMEOUT_SECS",
            )?,
            alert_timeout_secs: parse(&optional("ALERT_TIMEOUT_SECS", "5"), "ALERT_TIMEOUT_SECS")?,
            thresholds: Thresholds {
                temperature_max: parse(
                    &optional("ALERT_TEMPERATURE_MAX", &defaults.temperature_max.to_string()),
                    "ALERT_TEMPERATURE_MAX",
                )?,
                humidity_max: parse(
                    &optional("ALERT_HUMIDITY_MAX", &defaults.humidity_max.to_string()),
                    "ALERT_HUMIDITY_MAX",
                )?,
            },
        })
    }

    pub fn alert_timeout(&self) -> Duration {
        Duration::from_secs(self.alert_timeout_secs)
    }
}

fn parse<T>(raw: &str, key: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.trim()
        .parse()
        .with_context(|| format!("{key} has an invalid value: {raw:?}"))
}
