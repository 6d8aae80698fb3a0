// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scriptable in-memory ports for core unit tests

use crate::event::Event;
use crate::ports::{BufferError, BufferPort, SinkError, SinkPort, WalError, WalPort};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Instant;

// =============================================================================
// TestBuffer
// =============================================================================

#[derive(Default)]
struct TestBufferState {
    appended: Vec<Event>,
    reads: VecDeque<Vec<Event>>,
    acked: Vec<Vec<String>>,
    dlq: Vec<Event>,
    ping_errors: VecDeque<BufferError>,
    append_errors: VecDeque<BufferError>,
    ack_errors: VecDeque<BufferError>,
    dlq_errors: VecDeque<BufferError>,
}

#[derive(Clone, Default)]
pub struct TestBuffer {
    inner: Arc<Mutex<TestBufferState>>,
}

impl TestBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, TestBufferState> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn appended(&self) -> Vec<Event> {
        self.lock().appended.clone()
    }

    pub fn dlq(&self) -> Vec<Event> {
        self.lock().dlq.clone()
    }

    pub fn acked(&self) -> Vec<Vec<String>> {
        self.lock().acked.clone()
    }

    /// Queue a batch for the next `read_batch` call
    pub fn push_batch(&self, events: Vec<Event>) {
        self.lock().reads.push_back(events);
    }

    pub fn fail_next_ping(&self, err: BufferError) {
        self.lock().ping_errors.push_back(err);
    }

    pub fn fail_next_append(&self, err: BufferError) {
        self.lock().append_errors.push_back(err);
    }

    pub fn fail_next_ack(&self, err: BufferError) {
        self.lock().ack_errors.push_back(err);
    }

    pub fn fail_next_dlq(&self, err: BufferError) {
        self.lock().dlq_errors.push_back(err);
    }
}

#[async_trait]
impl BufferPort for TestBuffer {
    async fn ping(&self) -> Result<(), BufferError> {
        match self.lock().ping_errors.pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn ensure_group(&self, _group: &str) -> Result<(), BufferError> {
        Ok(())
    }

    async fn append(&self, event: &Event) -> Result<(), BufferError> {
        let mut state = self.lock();
        if let Some(err) = state.append_errors.pop_front() {
            return Err(err);
        }
        state.appended.push(event.clone());
        Ok(())
    }

    async fn read_batch(
        &self,
        _group: &str,
        _consumer: &str,
        max: usize,
    ) -> Result<Vec<Event>, BufferError> {
        let mut batch = self.lock().reads.pop_front().unwrap_or_default();
        batch.truncate(max);
        Ok(batch)
    }

    async fn ack(&self, _group: &str, message_ids: &[String]) -> Result<(), BufferError> {
        let mut state = self.lock();
        if let Some(err) = state.ack_errors.pop_front() {
            return Err(err);
        }
        state.acked.push(message_ids.to_vec());
        Ok(())
    }

    async fn dlq_append(&self, events: &[Event]) -> Result<(), BufferError> {
        let mut state = self.lock();
        if let Some(err) = state.dlq_errors.pop_front() {
            return Err(err);
        }
        state.dlq.extend(events.iter().cloned());
        Ok(())
    }
}

// =============================================================================
// TestSink
// =============================================================================

#[derive(Default)]
struct TestSinkState {
    rows: HashMap<String, Event>,
    fail_remaining: usize,
    fail_always: bool,
    attempts: Vec<Instant>,
}

#[derive(Clone, Default)]
pub struct TestSink {
    inner: Arc<Mutex<TestSinkState>>,
}

impl TestSink {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, TestSinkState> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn fail_next(&self, count: usize) {
        self.lock().fail_remaining = count;
    }

    pub fn fail_always(&self) {
        self.lock().fail_always = true;
    }

    pub fn attempts(&self) -> Vec<Instant> {
        self.lock().attempts.clone()
    }

    pub fn row_count(&self) -> usize {
        self.lock().rows.len()
    }

    pub fn row(&self, id: &str) -> Option<Event> {
        self.lock().rows.get(id).cloned()
    }
}

#[async_trait]
impl SinkPort for TestSink {
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

// =============================================================================
// TestWal
// =============================================================================

#[derive(Default)]
struct TestWalState {
    events: Vec<Event>,
    truncations: u32,
    full: bool,
    io_broken: bool,
}

#[derive(Clone, Default)]
pub struct TestWal {
    inner: Arc<Mutex<TestWalState>>,
}

impl TestWal {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, TestWalState> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn events(&self) -> Vec<Event> {
        self.lock().events.clone()
    }

    pub fn truncations(&self) -> u32 {
        self.lock().truncations
    }

    /// Make subsequent writes fail with `WalError::Full`
    pub fn set_full(&self) {
        self.lock().full = true;
    }

    /// Make subsequent writes fail with an I/O error
    pub fn break_io(&self) {
        self.lock().io_broken = true;
    }
}

impl WalPort for TestWal {
    fn write(&self, event: &Event) -> Result<(), WalError> {
        let mut state = self.lock();
        if state.full {
            return Err(WalError::Full {
                total: 150,
                incoming: 120,
                limit: 150,
            });
        }
        if state.io_broken {
            return Err(WalError::Io(std::io::Error::other("injected wal failure")));
        }
        state.events.push(event.clone());
        Ok(())
    }

    fn replay(
        &self,
        handler: &mut dyn FnMut(Event) -> Result<(), String>,
    ) -> Result<usize, WalError> {
        let events = self.lock().events.clone();
        let mut replayed = 0;
        for event in events {
            handler(event).map_err(WalError::ReplayAborted)?;
            replayed += 1;
        }
        Ok(replayed)
    }

    fn truncate(&self) -> Result<(), WalError> {
        let mut state = self.lock();
        state.events.clear();
        state.truncations += 1;
        Ok(())
    }

    fn segment_count(&self) -> Result<usize, WalError> {
        Ok(usize::from(!self.lock().events.is_empty()))
    }

    fn total_size(&self) -> Result<u64, WalError> {
        let state = self.lock();
        let mut total = 0;
        for event in &state.events {
            total += event.to_json()?.len() as u64 + 1;
        }
        Ok(total)
    }
}
