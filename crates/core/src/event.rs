// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Canonical log event record
//!
//! The event `id` doubles as the idempotency key for the sink upsert;
//! `stream_message_id` is assigned by the buffer on read and is only
//! meaningful between read and ack within one consumer instance.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Errors from parsing a producer-submitted event payload
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("invalid event JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("event is missing a message")]
    MissingMessage,
    #[error("malformed event id: {0}")]
    MalformedId(String),
}

fn unix_epoch() -> DateTime<Utc> {
    DateTime::<Utc>::UNIX_EPOCH
}

/// A single log event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Externally supplied or server-minted UUID; empty until minted
    #[serde(rename = "event_id", default)]
    pub id: String,
    /// Server wall-clock when ingest accepted the event
    #[serde(default = "unix_epoch")]
    pub received_at: DateTime<Utc>,
    /// Producer-declared event time, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub source: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub level: String,
    pub message: String,
    /// Opaque JSON object, possibly with PII-redacted fields
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub pii_redacted: bool,
    /// Buffer message id, set on read; never serialized or persisted
    #[serde(skip)]
    pub stream_message_id: String,
}

impl Event {
    /// Create an event with just a message, for construction in code
    pub fn with_message(message: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            received_at: unix_epoch(),
            event_time: None,
            source: String::new(),
            level: String::new(),
            message: message.into(),
            metadata: None,
            pii_redacted: false,
            stream_message_id: String::new(),
        }
    }

    /// Parse and validate a producer payload.
    ///
    /// Rejects payloads missing `message` and payloads whose `event_id` is
    /// non-empty but not a UUID.
    pub fn parse(payload: &[u8]) -> Result<Self, ParseError> {
        let event: Event = serde_json::from_slice(payload)?;
        if event.message.is_empty() {
            return Err(ParseError::MissingMessage);
        }
        if !event.id.is_empty() && Uuid::parse_str(&event.id).is_err() {
            return Err(ParseError::MalformedId(event.id));
        }
        Ok(event)
    }

    /// Stamp `received_at` and mint an id if the producer left it empty.
    ///
    /// Called once per event on the accept path. Minting is idempotent: a
    /// non-empty id is never replaced, so retried accepts keep their key.
    pub fn enrich(&mut self, now: DateTime<Utc>) {
        self.received_at = now;
        if self.id.is_empty() {
            self.id = Uuid::new_v4().to_string();
        }
    }

    /// Serialize to a single JSON line (no trailing newline)
    pub fn to_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
