// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Port trait definitions for the buffer, sink, and WAL backends
//!
//! Buffer and sink faults are classified transient vs fatal at the adapter
//! boundary: transient faults (network, timeout, connection closed) drive
//! availability transitions and retries, fatal faults (serialization,
//! protocol violations) reject the work outright. Only transient faults may
//! flip the availability state.

use crate::event::Event;
use async_trait::async_trait;
use thiserror::Error;

// =============================================================================
// Buffer port
// =============================================================================

/// Errors from buffer operations
#[derive(Debug, Error)]
pub enum BufferError {
    /// Network, timeout, connection closed; retryable, flips availability
    #[error("transient buffer failure: {0}")]
    Transient(String),
    /// Serialization or protocol violation; not retryable
    #[error("buffer rejected operation: {0}")]
    Fatal(String),
}

/// Durable stream with consumer-group semantics
///
/// A successful `append` implies the event is readable by some consumer of
/// the group (at-least-once). Messages stay pending on the group until acked;
/// a crashed consumer's claims become eligible for another consumer after an
/// idle timeout.
#[async_trait]
pub trait BufferPort: Clone + Send + Sync + 'static {
    /// Lightweight liveness probe
    async fn ping(&self) -> Result<(), BufferError>;

    /// Create the consumer group if it does not exist; tolerates "already exists"
    async fn ensure_group(&self, group: &str) -> Result<(), BufferError>;

    /// Append one event to the main stream
    async fn append(&self, event: &Event) -> Result<(), BufferError>;

    /// Deliver up to `max` previously undelivered messages to the named
    /// consumer. May block briefly (bounded) for arrival; returns promptly
    /// empty if none arrive. Delivered events carry `stream_message_id`.
    async fn read_batch(
        &self,
        group: &str,
        consumer: &str,
        max: usize,
    ) -> Result<Vec<Event>, BufferError>;

    /// Acknowledge processed messages; a no-op on already-acked ids
    async fn ack(&self, group: &str, message_ids: &[String]) -> Result<(), BufferError>;

    /// Durably append events to the dead-letter stream
    async fn dlq_append(&self, events: &[Event]) -> Result<(), BufferError>;
}

// =============================================================================
// Sink port
// =============================================================================

/// Errors from sink operations
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("transient sink failure: {0}")]
    Transient(String),
    #[error("sink rejected batch: {0}")]
    Fatal(String),
}

/// Durable structured store of the final record of truth
///
/// `write_batch` is a set-wise upsert keyed by event id: idempotent under
/// replay, last-writer-wins per column, all-or-nothing within one call.
#[async_trait]
pub trait SinkPort: Clone + Send + Sync + 'static {
    async fn write_batch(&self, events: &[Event]) -> Result<(), SinkError>;
}

// =============================================================================
// WAL port
// =============================================================================

/// Errors from WAL operations
#[derive(Debug, Error)]
pub enum WalError {
    /// Disk budget exceeded; surfaces as back-pressure to the caller
    #[error("wal disk budget exceeded: {total} + {incoming} bytes over limit {limit}")]
    Full { total: u64, incoming: u64, limit: u64 },
    /// The replay handler failed; segments are retained
    #[error("wal replay aborted: {0}")]
    ReplayAborted(String),
    #[error("wal io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("wal serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Local append-only fallback log
///
/// The WAL is local disk and single-writer; operations are synchronous and
/// hold one exclusive lock, and are cheap enough to call inline from async
/// code.
pub trait WalPort: Clone + Send + Sync + 'static {
    /// Serialize and append one event; fails closed with [`WalError::Full`]
    /// when the disk budget would be exceeded
    fn write(&self, event: &Event) -> Result<(), WalError>;

    /// Close the active segment, then stream every logged event in write
    /// order through `handler`. A handler error aborts the replay, which is
    /// propagated as [`WalError::ReplayAborted`]; segments are never deleted
    /// here. Returns the number of events handled.
    fn replay(&self, handler: &mut dyn FnMut(Event) -> Result<(), String>)
        -> Result<usize, WalError>;

    /// Delete all segment files. Idempotent on an empty WAL.
    fn truncate(&self) -> Result<(), WalError>;

    /// Number of segment files currently on disk
    fn segment_count(&self) -> Result<usize, WalError>;

    /// Total on-disk size of all segments in bytes
    fn total_size(&self) -> Result<u64, WalError>;
}
