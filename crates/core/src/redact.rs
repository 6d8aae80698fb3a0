// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! PII redaction over event metadata
//!
//! Replaces configured top-level metadata fields with a placeholder and tags
//! the event. Redaction failures are non-fatal on the ingest path: the event
//! is still buffered unredacted.

use crate::event::Event;
use std::collections::HashSet;
use thiserror::Error;

pub const REDACTED_PLACEHOLDER: &str = "[REDACTED]";

#[derive(Debug, Error)]
pub enum RedactError {
    #[error("metadata is not a JSON object")]
    NotAnObject,
}

/// Redacts sensitive fields from event metadata
#[derive(Debug, Clone, Default)]
pub struct Redactor {
    fields: HashSet<String>,
}

impl Redactor {
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    /// Redact matching metadata fields in place.
    pub fn redact(&self, event: &mut Event) -> Result<(), RedactError> {
        if self.fields.is_empty() {
            return Ok(());
        }
        let Some(metadata) = event.metadata.as_mut() else {
            return Ok(());
        };
        let object = metadata.as_object_mut().ok_or(RedactError::NotAnObject)?;

        let mut redacted = false;
        for field in &self.fields {
            if let Some(value) = object.get_mut(field) {
                *value = serde_json::Value::String(REDACTED_PLACEHOLDER.to_string());
                redacted = true;
            }
        }
        if redacted {
            event.pii_redacted = true;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "redact_tests.rs"]
mod tests;
