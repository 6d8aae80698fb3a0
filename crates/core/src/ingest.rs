// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Ingest coordinator: buffer first, WAL fallback
//!
//! The observable guarantee: if `accept` returns `Ok`, the event is durable
//! in either the buffer or the WAL. There is no other positive outcome.

use crate::availability::Availability;
use crate::event::Event;
use crate::ports::{BufferError, BufferPort, WalPort};
use crate::redact::Redactor;
use chrono::Utc;
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

/// Negative outcomes of an accept attempt
#[derive(Debug, Error)]
pub enum IngestError {
    /// The buffer rejected the event outright; it has been dropped. The
    /// caller owns the error surface (e.g. a 4xx response).
    #[error("event rejected: {0}")]
    Rejected(String),
    /// Neither the buffer nor the WAL could take the event; the caller
    /// decides its back-pressure policy.
    #[error("back-pressure: {0}")]
    BackPressure(String),
}

/// Per-event admission: enrich, redact, then make durable
pub struct IngestCoordinator<B, W> {
    buffer: B,
    wal: W,
    state: Arc<Availability>,
    redactor: Redactor,
}

impl<B, W> IngestCoordinator<B, W>
where
    B: BufferPort,
    W: WalPort,
{
    pub fn new(buffer: B, wal: W, state: Arc<Availability>, redactor: Redactor) -> Self {
        Self {
            buffer,
            wal,
            state,
            redactor,
        }
    }

    pub fn availability(&self) -> &Arc<Availability> {
        &self.state
    }

    /// Accept one event: stamp `received_at`, mint an id if needed, redact,
    /// then append to the buffer or, failing that, the WAL.
    pub async fn accept(&self, event: &mut Event) -> Result<(), IngestError> {
        event.enrich(Utc::now());
        if let Err(err) = self.redactor.redact(event) {
            warn!(event_id = %event.id, error = %err, "redaction failed; ingesting original metadata");
        }

        if self.state.is_available() {
            match self.buffer.append(event).await {
                Ok(()) => return Ok(()),
                Err(err @ BufferError::Fatal(_)) => {
                    warn!(event_id = %event.id, error = %err, "buffer rejected event");
                    return Err(IngestError::Rejected(err.to_string()));
                }
                Err(err) => {
                    if self.state.mark_unavailable() {
                        warn!(event_id = %event.id, error = %err, "buffer append failed; ingest switching to WAL");
                    }
                }
            }
        }

        match self.wal.write(event) {
            Ok(()) => Ok(()),
            Err(err) => {
                warn!(event_id = %event.id, error = %err, "WAL write failed; applying back-pressure");
                Err(IngestError::BackPressure(err.to_string()))
            }
        }
    }
}

#[cfg(test)]
#[path = "ingest_tests.rs"]
mod tests;
