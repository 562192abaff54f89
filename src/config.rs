use std::{env, str::FromStr, time::Duration};

use crate::{
    pipeline::{
        DEFAULT_QUEUE_CAPACITY, DEFAULT_REQUEST_TIMEOUT, DEFAULT_WORKERS, PipelineConfig,
        PipelineOptions,
    },
    shaper::ReservedFields,
    transport::INGESTION_PATH,
};

const DEFAULT_HOST: &str = "data.mgmt.cloud.vmware.com";
const DEFAULT_PORT: u16 = 443;
const DEFAULT_RESERVED_FIELDS: &str = "event_type";
const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Error type for loading settings.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("invalid value '{value}' for {key}")]
    Invalid { key: &'static str, value: String },
}

/// Runtime settings, read from environment variables.
#[derive(Debug, Clone)]
pub struct Settings {
    pub host: String,
    pub port: u16,
    pub token: String,
    pub reserved_fields: ReservedFields,
    pub merge_json_message: bool,
    pub workers: usize,
    pub queue_capacity: usize,
    /// Discard events instead of forwarding them.
    pub noop: bool,
    pub debug: bool,
    pub insecure_skip_verify: bool,
    pub request_timeout: Duration,
    pub drain_timeout: Duration,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Loads settings through `lookup`, falling back to defaults for unset keys.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let noop = parse_bool(&lookup, "INSIGHT_NOOP", false)?;
        let host = lookup("INSIGHT_SERVER").unwrap_or_else(|| DEFAULT_HOST.to_string());
        if !noop && host.trim().is_empty() {
            return Err(ConfigError::Missing("INSIGHT_SERVER"));
        }
        let reserved_fields = lookup("INSIGHT_RESERVED_FIELDS")
            .unwrap_or_else(|| DEFAULT_RESERVED_FIELDS.to_string());

        Ok(Self {
            host: host.trim().to_string(),
            port: parse_or(&lookup, "INSIGHT_SERVER_PORT", DEFAULT_PORT)?,
            token: lookup("INSIGHT_SERVER_TOKEN").unwrap_or_default(),
            reserved_fields: ReservedFields::parse(&reserved_fields),
            merge_json_message: parse_bool(&lookup, "INSIGHT_HAS_JSON_LOG_MSG", false)?,
            workers: parse_or(&lookup, "CONCURRENT_WORKERS", DEFAULT_WORKERS)?,
            queue_capacity: parse_or(&lookup, "INSIGHT_QUEUE_CAPACITY", DEFAULT_QUEUE_CAPACITY)?,
            noop,
            debug: parse_bool(&lookup, "DEBUG", false)?,
            insecure_skip_verify: parse_bool(&lookup, "SKIP_SSL_VALIDATION", false)?,
            request_timeout: parse_secs(
                &lookup,
                "INSIGHT_REQUEST_TIMEOUT_SECS",
                DEFAULT_REQUEST_TIMEOUT,
            )?,
            drain_timeout: parse_secs(&lookup, "DRAIN_TIMEOUT_SECS", DEFAULT_DRAIN_TIMEOUT)?,
        })
    }

    pub fn ingestion_url(&self) -> String {
        format!("https://{}:{}{}", self.host, self.port, INGESTION_PATH)
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            url: self.ingestion_url(),
            token: self.token.clone(),
            insecure_skip_verify: self.insecure_skip_verify,
            request_timeout: self.request_timeout,
            debug: self.debug,
            options: PipelineOptions {
                reserved_fields: self.reserved_fields.clone(),
                merge_json_message: self.merge_json_message,
                workers: self.workers,
                queue_capacity: self.queue_capacity,
            },
        }
    }
}

fn parse_or<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(key) {
        None => Ok(default),
        Some(value) => match value.trim().parse() {
            Ok(parsed) => Ok(parsed),
            Err(_) => Err(ConfigError::Invalid { key, value }),
        },
    }
}

fn parse_bool(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: bool,
) -> Result<bool, ConfigError> {
    let Some(value) = lookup(key) else {
        return Ok(default);
    };
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(ConfigError::Invalid { key, value }),
    }
}

fn parse_secs(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: Duration,
) -> Result<Duration, ConfigError> {
    parse_or(lookup, key, default.as_secs()).map(Duration::from_secs)
}
