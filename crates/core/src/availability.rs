// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Buffer availability state and the probe/replay monitor
//!
//! A single word-atomic AVAILABLE/UNAVAILABLE state, written through
//! compare-and-set only. The monitor probes the buffer on an interval; one
//! failed probe flips to UNAVAILABLE, and recovery requires a successful
//! probe followed by a complete WAL replay into the buffer. Replay is
//! single-flight, enforced by a CAS'd `replay_running` flag.

use crate::ports::{BufferPort, WalError, WalPort};
use crate::shutdown;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};

/// Shared ingest-path availability state. Initially AVAILABLE (optimistic).
#[derive(Debug)]
pub struct Availability {
    available: AtomicBool,
    replay_running: AtomicBool,
}

impl Availability {
    pub fn new() -> Self {
        Self {
            available: AtomicBool::new(true),
            replay_running: AtomicBool::new(false),
        }
    }

    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::Acquire)
    }

    /// CAS AVAILABLE -> UNAVAILABLE. Returns true only for the winning call,
    /// so the caller can log the transition at most once.
    pub fn mark_unavailable(&self) -> bool {
        self.available
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// CAS UNAVAILABLE -> AVAILABLE. Returns true only for the winning call.
    pub fn mark_available(&self) -> bool {
        self.available
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Claim the single replay slot; release with [`Self::end_replay`].
    pub fn begin_replay(&self) -> bool {
        self.replay_running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn end_replay(&self) {
        self.replay_running.store(false, Ordering::Release);
    }
}

impl Default for Availability {
    fn default() -> Self {
        Self::new()
    }
}

/// Background task that drives availability transitions and WAL recovery
pub struct AvailabilityMonitor<B, W> {
    buffer: B,
    wal: W,
    state: Arc<Availability>,
    probe_interval: Duration,
    shutdown: watch::Receiver<bool>,
}

impl<B, W> AvailabilityMonitor<B, W>
where
    B: BufferPort,
    W: WalPort,
{
    pub fn new(
        buffer: B,
        wal: W,
        state: Arc<Availability>,
        probe_interval: Duration,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            buffer,
            wal,
            state,
            probe_interval,
            shutdown,
        }
    }

    /// Probe until shutdown. Never exits mid-replay, so the WAL is never
    /// left half-truncated.
    pub async fn run(mut self) {
        info!(interval = ?self.probe_interval, "availability monitor started");
        let mut ticker = tokio::time::interval(self.probe_interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => self.probe_once().await,
                _ = shutdown::requested(&mut self.shutdown) => break,
            }
        }
        info!("availability monitor stopped");
    }

    /// One probe cycle: flip on failure, attempt recovery on success.
    pub async fn probe_once(&self) {
        match self.buffer.ping().await {
            Ok(()) => {
                if !self.state.is_available() {
                    if let Err(err) = self.try_recover().await {
                        warn!(error = %err, "buffer is back but WAL replay failed; staying unavailable");
                    }
                }
            }
            Err(err) => {
                if self.state.mark_unavailable() {
                    warn!(error = %err, "buffer probe failed; ingest switching to WAL");
                }
            }
        }
    }

    /// Replay the WAL into the buffer, truncate, and publish AVAILABLE.
    ///
    /// Any transient append failure aborts the replay and the state stays
    /// UNAVAILABLE for the next cycle. Single-flight across tasks.
    async fn try_recover(&self) -> Result<(), WalError> {
        if !self.state.begin_replay() {
            return Ok(());
        }
        let result = self.replay_into_buffer().await;
        self.state.end_replay();

        let replayed = result?;
        self.wal.truncate()?;
        if self.state.mark_available() {
            info!(replayed, "WAL replay complete; buffer available again");
        }
        Ok(())
    }

    async fn replay_into_buffer(&self) -> Result<usize, WalError> {
        let wal = self.wal.clone();
        let buffer = self.buffer.clone();
        let handle = tokio::runtime::Handle::current();
        // The WAL streams synchronously; hop to a blocking thread and drive
        // each buffer append to completion from there.
        tokio::task::spawn_blocking(move || {
            wal.replay(&mut |event| {
                handle
                    .block_on(buffer.append(&event))
                    .map_err(|err| err.to_string())
            })
        })
        .await
        .map_err(|err| WalError::ReplayAborted(format!("replay task failed: {err}")))?
    }
}

#[cfg(test)]
#[path = "availability_tests.rs"]
mod tests;
