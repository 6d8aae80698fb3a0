// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory sink with scriptable failures
//!
//! Upserts into a map keyed by event id, so it obeys the same idempotency
//! contract as the SQL sink. Failure scripting and recorded attempt times
//! drive retry, backoff, and dead-letter tests.

use async_trait::async_trait;
use floodgate_core::{Event, SinkError, SinkPort};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

#[derive(Default)]
struct MemorySinkState {
    rows: HashMap<String, Event>,
    fail_remaining: usize,
    fail_always: bool,
    attempts: Vec<Instant>,
}

#[derive(Clone, Default)]
pub struct MemorySink {
    inner: Arc<Mutex<MemorySinkState>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemorySinkState> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Fail the next `count` write attempts transiently
    pub fn fail_next(&self, count: usize) {
        self.lock().fail_remaining = count;
    }

    /// Fail every write attempt until [`Self::set_healthy`]
    pub fn fail_always(&self) {
        self.lock().fail_always = true;
    }

    pub fn set_healthy(&self) {
        let mut state = self.lock();
        state.fail_always = false;
        state.fail_remaining = 0;
    }

    /// Instants at which write attempts arrived
    pub fn attempts(&self) -> Vec<Instant> {
        self.lock().attempts.clone()
    }

    pub fn row_count(&self) -> usize {
        self.lock().rows.len()
    }

    pub fn row(&self, id: &str) -> Option<Event> {
        self.lock().rows.get(id).cloned()
    }

    pub fn event_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.lock().rows.keys().cloned().collect();
        ids.sort();
        ids
    }
}

#[async_trait]
impl SinkPort for MemorySink {
    async fn write_batch(&self, events: &[Event]) -> Result<(), SinkError> {
        let mut state = self.lock();
        state.attempts.push(Instant::now());
        if state.fail_always {
            return Err(SinkError::Transient("injected sink outage".to_string()));
        }
        if state.fail_remaining > 0 {
            state.fail_remaining -= 1;
            return Err(SinkError::Transient("injected sink failure".to_string()));
        }
        for event in events {
            state.rows.insert(event.id.clone(), event.clone());
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
