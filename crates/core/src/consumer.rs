// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Batched consumer loop: claim, sink with backoff, dead-letter, ack
//!
//! Each batch runs READ -> WRITING -> (SUNK | DLQED) -> ACKED and no partial
//! state survives between iterations. The only branch that foregoes progress
//! is a failed dead-letter append: the batch is left pending and will be
//! reclaimed after the buffer's idle timeout.

use crate::event::Event;
use crate::ports::{BufferError, BufferPort, SinkError, SinkPort};
use crate::shutdown;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Delay before the 1-indexed `attempt`: none before the first, then
/// `base`, `2*base`, `4*base`, ...
pub fn retry_delay(base: Duration, attempt: u32) -> Duration {
    if attempt <= 1 {
        Duration::ZERO
    } else {
        base * 2u32.saturating_pow(attempt - 2)
    }
}

#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    pub group: String,
    pub consumer: String,
    pub batch_size: usize,
    pub retry_count: u32,
    pub retry_backoff: Duration,
    pub poll_interval: Duration,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            group: "log_processors".to_string(),
            consumer: "consumer-1".to_string(),
            batch_size: 1000,
            retry_count: 3,
            retry_backoff: Duration::from_secs(1),
            poll_interval: Duration::from_secs(1),
        }
    }
}

/// Terminal status of one processed batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchOutcome {
    Sunk,
    DeadLettered,
}

#[derive(Debug, Error)]
pub enum ConsumerError {
    #[error("failed to claim batch: {0}")]
    Read(#[source] BufferError),
    /// Sink exhausted and the DLQ append failed too; the batch stays
    /// pending for redelivery
    #[error("dead-letter append failed: {0}")]
    DeadLetter(#[source] BufferError),
    #[error("consumer canceled mid-batch")]
    Canceled,
}

enum WriteAttempt {
    Sunk,
    Exhausted(SinkError),
    Canceled,
}

/// One consumer instance over the shared buffer
pub struct ConsumerLoop<B, S> {
    buffer: B,
    sink: S,
    config: ConsumerConfig,
    shutdown: watch::Receiver<bool>,
}

impl<B, S> ConsumerLoop<B, S>
where
    B: BufferPort,
    S: SinkPort,
{
    pub fn new(buffer: B, sink: S, config: ConsumerConfig, shutdown: watch::Receiver<bool>) -> Self {
        Self {
            buffer,
            sink,
            config,
            shutdown,
        }
    }

    /// Iterate until shutdown. Finishes the in-flight batch before exiting.
    pub async fn run(mut self) {
        info!(group = %self.config.group, consumer = %self.config.consumer, "consumer started");
        loop {
            if shutdown::is_requested(&self.shutdown) {
                break;
            }
            match self.run_once().await {
                Ok(Some(_)) => {}
                Ok(None) => {
                    if self.idle_tick().await {
                        break;
                    }
                }
                Err(ConsumerError::Canceled) => break,
                Err(err) => {
                    warn!(error = %err, "consumer iteration failed");
                    if self.idle_tick().await {
                        break;
                    }
                }
            }
        }
        info!(consumer = %self.config.consumer, "consumer stopped");
    }

    /// Process at most one batch. `Ok(None)` means the buffer had nothing
    /// for us this tick.
    pub async fn run_once(&mut self) -> Result<Option<BatchOutcome>, ConsumerError> {
        let events = self
            .buffer
            .read_batch(&self.config.group, &self.config.consumer, self.config.batch_size)
            .await
            .map_err(ConsumerError::Read)?;
        if events.is_empty() {
            return Ok(None);
        }
        debug!(count = events.len(), "claimed batch from buffer");

        let outcome = match self.write_with_retry(&events).await {
            WriteAttempt::Sunk => BatchOutcome::Sunk,
            WriteAttempt::Canceled => return Err(ConsumerError::Canceled),
            WriteAttempt::Exhausted(err) => {
                error!(
                    batch = events.len(),
                    error = %err,
                    "sink write exhausted retries; dead-lettering batch"
                );
                if let Err(dlq_err) = self.buffer.dlq_append(&events).await {
                    error!(
                        batch = events.len(),
                        error = %dlq_err,
                        "dead-letter append failed; batch left pending for redelivery"
                    );
                    return Err(ConsumerError::DeadLetter(dlq_err));
                }
                BatchOutcome::DeadLettered
            }
        };

        let message_ids: Vec<String> = events
            .iter()
            .map(|event| event.stream_message_id.clone())
            .collect();
        if let Err(err) = self.buffer.ack(&self.config.group, &message_ids).await {
            // The sink upsert is idempotent, so redelivery after a lost ack
            // is safe
            warn!(error = %err, "failed to acknowledge processed batch");
        }

        info!(count = events.len(), status = ?outcome, "processed batch");
        Ok(Some(outcome))
    }

    async fn write_with_retry(&mut self, events: &[Event]) -> WriteAttempt {
        let mut attempt = 1;
        loop {
            let delay = retry_delay(self.config.retry_backoff, attempt);
            if !delay.is_zero() {
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = shutdown::requested(&mut self.shutdown) => return WriteAttempt::Canceled,
                }
            }
            match self.sink.write_batch(events).await {
                Ok(()) => return WriteAttempt::Sunk,
                Err(err) => {
                    warn!(attempt, error = %err, "sink write failed");
                    if attempt >= self.config.retry_count {
                        return WriteAttempt::Exhausted(err);
                    }
                    attempt += 1;
                }
            }
        }
    }

    /// Sleep one poll interval; returns true if shutdown arrived.
    async fn idle_tick(&mut self) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(self.config.poll_interval) => false,
            _ = shutdown::requested(&mut self.shutdown) => true,
        }
    }
}

#[cfg(test)]
#[path = "consumer_tests.rs"]
mod tests;
