// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Environment-driven daemon configuration
//!
//! Every knob has a default; only malformed values fail the load. Durations
//! accept `500ms`, `5s`, `5m`, `1h`, or a bare number of seconds.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?} ({reason})")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Response to ingestion when neither the buffer nor the WAL can take an
/// event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackpressurePolicy {
    /// Hold the request until the pipeline drains (or shutdown)
    Block,
    /// Answer 429 Too Many Requests
    Reject,
    /// Drop the event and pretend it was accepted
    Drop,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub max_event_size: u64,
    pub wal_path: PathBuf,
    pub wal_segment_size: u64,
    pub wal_max_disk_size: u64,
    pub backpressure_policy: BackpressurePolicy,
    pub dlq_stream: String,
    pub sink_db_path: PathBuf,
    pub api_key_cache_ttl: Duration,
    pub pii_redaction_fields: Vec<String>,
    pub ingest_addr: SocketAddr,
    pub consumer_group: String,
    pub consumer_name: String,
    pub consumer_batch_size: usize,
    pub consumer_retry_count: u32,
    pub consumer_retry_backoff: Duration,
    pub consumer_poll_interval: Duration,
    pub consumer_count: usize,
    pub health_check_interval: Duration,
    pub buffer_idle_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup, so tests never touch the process
    /// environment
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        Ok(Self {
            log_level: string(&lookup, "LOG_LEVEL", "info"),
            max_event_size: number(&lookup, "MAX_EVENT_SIZE", 1_048_576)?,
            wal_path: PathBuf::from(string(&lookup, "WAL_PATH", "./wal")),
            wal_segment_size: number(&lookup, "WAL_SEGMENT_SIZE", 104_857_600)?,
            wal_max_disk_size: number(&lookup, "WAL_MAX_DISK_SIZE", 1_073_741_824)?,
            backpressure_policy: policy(&lookup, "BACKPRESSURE_POLICY")?,
            dlq_stream: string(&lookup, "DLQ_STREAM", "log_events_dlq"),
            sink_db_path: PathBuf::from(string(&lookup, "SINK_DB_PATH", "./floodgate.db")),
            api_key_cache_ttl: duration(&lookup, "API_KEY_CACHE_TTL", Duration::from_secs(300))?,
            pii_redaction_fields: fields(&string(
                &lookup,
                "PII_REDACTION_FIELDS",
                "email,password,credit_card,ssn",
            )),
            ingest_addr: address(&lookup, "INGEST_ADDR", "0.0.0.0:8080")?,
            consumer_group: string(&lookup, "CONSUMER_GROUP", "log_processors"),
            consumer_name: lookup("CONSUMER_NAME")
                .unwrap_or_else(|| format!("consumer-{}", Uuid::new_v4())),
            consumer_batch_size: number(&lookup, "CONSUMER_BATCH_SIZE", 1000)?,
            consumer_retry_count: number(&lookup, "CONSUMER_RETRY_COUNT", 3)?,
            consumer_retry_backoff: duration(
                &lookup,
                "CONSUMER_RETRY_BACKOFF",
                Duration::from_secs(1),
            )?,
            consumer_poll_interval: duration(
                &lookup,
                "CONSUMER_POLL_INTERVAL",
                Duration::from_secs(1),
            )?,
            consumer_count: number(&lookup, "CONSUMER_COUNT", 1)?,
            health_check_interval: duration(
                &lookup,
                "HEALTH_CHECK_INTERVAL",
                Duration::from_secs(5),
            )?,
            buffer_idle_timeout: duration(&lookup, "BUFFER_IDLE_TIMEOUT", Duration::from_secs(30))?,
        })
    }
}

fn string(lookup: &impl Fn(&str) -> Option<String>, key: &'static str, default: &str) -> String {
    lookup(key).unwrap_or_else(|| default.to_string())
}

fn number<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|err: T::Err| ConfigError::Invalid {
            key,
            value: raw,
            reason: err.to_string(),
        }),
    }
}

fn policy(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<BackpressurePolicy, ConfigError> {
    match lookup(key).as_deref().map(str::trim) {
        None | Some("block") => Ok(BackpressurePolicy::Block),
        Some("429") => Ok(BackpressurePolicy::Reject),
        Some("drop") => Ok(BackpressurePolicy::Drop),
        Some(other) => Err(ConfigError::Invalid {
            key,
            value: other.to_string(),
            reason: "expected block, 429, or drop".to_string(),
        }),
    }
}

fn duration(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: Duration,
) -> Result<Duration, ConfigError> {
    let Some(raw) = lookup(key) else {
        return Ok(default);
    };
    parse_duration(raw.trim()).ok_or_else(|| ConfigError::Invalid {
        key,
        value: raw,
        reason: "expected a duration like 500ms, 5s, 5m, 1h, or seconds".to_string(),
    })
}

fn parse_duration(raw: &str) -> Option<Duration> {
    let (digits, unit) = match raw.find(|c: char| !c.is_ascii_digit()) {
        Some(split) => raw.split_at(split),
        None => (raw, "s"),
    };
    let value: u64 = digits.parse().ok()?;
    match unit {
        "ms" => Some(Duration::from_millis(value)),
        "s" => Some(Duration::from_secs(value)),
        "m" => Some(Duration::from_secs(value * 60)),
        "h" => Some(Duration::from_secs(value * 3600)),
        _ => None,
    }
}

fn address(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: &str,
) -> Result<SocketAddr, ConfigError> {
    let raw = string(lookup, key, default);
    raw.parse().map_err(|err: std::net::AddrParseError| {
        ConfigError::Invalid {
            key,
            value: raw,
            reason: err.to_string(),
        }
    })
}

fn fields(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|field| !field.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
