// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process stream buffer with consumer-group semantics
//!
//! Mirrors the contract of an external stream store: monotonic message ids,
//! per-group delivery cursor, a pending-entry set per group with idle-timeout
//! reclaim, and a separate dead-letter stream. An `online` switch lets outage
//! and recovery paths be driven deterministically.

use async_trait::async_trait;
use floodgate_core::{BufferError, BufferPort, Event};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::warn;

#[derive(Debug, Clone, Copy)]
pub struct MemoryBufferConfig {
    /// Upper bound on how long `read_batch` blocks waiting for arrivals
    pub read_block: Duration,
    /// Pending entries idle longer than this become claimable by any consumer
    pub idle_timeout: Duration,
}

impl Default for MemoryBufferConfig {
    fn default() -> Self {
        Self {
            read_block: Duration::from_secs(2),
            idle_timeout: Duration::from_secs(30),
        }
    }
}

struct Entry {
    id: u64,
    payload: String,
}

struct Pending {
    entry: usize,
    consumer: String,
    delivered_at: Instant,
    deliveries: u32,
}

struct Group {
    cursor: usize,
    pending: BTreeMap<u64, Pending>,
}

struct DeadLetter {
    payload: String,
    original_event_id: String,
}

#[derive(Default)]
struct BufferState {
    next_id: u64,
    entries: Vec<Entry>,
    groups: HashMap<String, Group>,
    dlq: Vec<DeadLetter>,
}

/// Shared in-process buffer; clones refer to the same streams
#[derive(Clone)]
pub struct MemoryBuffer {
    state: Arc<Mutex<BufferState>>,
    arrivals: Arc<watch::Sender<u64>>,
    online: Arc<AtomicBool>,
    config: MemoryBufferConfig,
}

impl MemoryBuffer {
    pub fn new(config: MemoryBufferConfig) -> Self {
        let (arrivals, _) = watch::channel(0);
        Self {
            state: Arc::new(Mutex::new(BufferState::default())),
            arrivals: Arc::new(arrivals),
            online: Arc::new(AtomicBool::new(true)),
            config,
        }
    }

    /// Simulate an outage or a recovery. Offline, every operation fails
    /// transiently. Blocked readers are woken so they observe the change.
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::Release);
        self.arrivals.send_modify(|version| *version += 1);
    }

    /// Events currently in the main stream, in append order
    pub fn events(&self) -> Vec<Event> {
        let state = self.lock();
        state
            .entries
            .iter()
            .filter_map(|entry| decode(entry, entry.id))
            .collect()
    }

    /// Events in the dead-letter stream, in append order
    pub fn dlq_events(&self) -> Vec<Event> {
        let state = self.lock();
        state
            .dlq
            .iter()
            .filter_map(|letter| match serde_json::from_str(&letter.payload) {
                Ok(event) => Some(event),
                Err(_) => {
                    warn!(event_id = %letter.original_event_id, "undecodable dead letter");
                    None
                }
            })
            .collect()
    }

    /// Unacked deliveries currently pending on the group
    pub fn pending_count(&self, group: &str) -> usize {
        self.lock()
            .groups
            .get(group)
            .map(|group| group.pending.len())
            .unwrap_or(0)
    }

    /// (consumer, delivery count) per pending entry of the group, in
    /// message-id order
    pub fn pending_entries(&self, group: &str) -> Vec<(String, u32)> {
        self.lock()
            .groups
            .get(group)
            .map(|group| {
                group
                    .pending
                    .values()
                    .map(|pending| (pending.consumer.clone(), pending.deliveries))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, BufferState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn ensure_online(&self) -> Result<(), BufferError> {
        if self.online.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(BufferError::Transient("buffer offline".to_string()))
        }
    }

    /// One non-blocking claim pass: reclaim idle pending entries first, then
    /// deliver new ones past the group cursor.
    fn claim(&self, group_name: &str, consumer: &str, max: usize) -> Result<Vec<Event>, BufferError> {
        let mut guard = self.lock();
        let BufferState { entries, groups, .. } = &mut *guard;
        let group = groups
            .get_mut(group_name)
            .ok_or_else(|| BufferError::Fatal(format!("unknown consumer group: {group_name}")))?;

        let now = Instant::now();
        let mut batch = Vec::new();

        for (&message_id, pending) in group.pending.iter_mut() {
            if batch.len() >= max {
                break;
            }
            if now.duration_since(pending.delivered_at) >= self.config.idle_timeout {
                pending.consumer = consumer.to_string();
                pending.delivered_at = now;
                pending.deliveries += 1;
                if let Some(event) = decode(&entries[pending.entry], message_id) {
                    batch.push(event);
                }
            }
        }

        while batch.len() < max && group.cursor < entries.len() {
            let index = group.cursor;
            group.cursor += 1;
            let entry = &entries[index];
            group.pending.insert(
                entry.id,
                Pending {
                    entry: index,
                    consumer: consumer.to_string(),
                    delivered_at: now,
                    deliveries: 1,
                },
            );
            if let Some(event) = decode(entry, entry.id) {
                batch.push(event);
            }
        }

        Ok(batch)
    }
}

impl Default for MemoryBuffer {
    fn default() -> Self {
        Self::new(MemoryBufferConfig::default())
    }
}

fn decode(entry: &Entry, message_id: u64) -> Option<Event> {
    match serde_json::from_str::<Event>(&entry.payload) {
        Ok(mut event) => {
            event.stream_message_id = message_id.to_string();
            Some(event)
        }
        Err(err) => {
            warn!(message_id, error = %err, "skipping undecodable stream entry");
            None
        }
    }
}

#[async_trait]
impl BufferPort for MemoryBuffer {
    async fn ping(&self) -> Result<(), BufferError> {
        self.ensure_online()
    }

    async fn ensure_group(&self, group: &str) -> Result<(), BufferError> {
        self.ensure_online()?;
        self.lock().groups.entry(group.to_string()).or_insert(Group {
            cursor: 0,
            pending: BTreeMap::new(),
        });
        Ok(())
    }

    async fn append(&self, event: &Event) -> Result<(), BufferError> {
        self.ensure_online()?;
        let payload = serde_json::to_string(event)
            .map_err(|err| BufferError::Fatal(format!("unencodable event: {err}")))?;
        {
            let mut state = self.lock();
            let id = state.next_id;
            state.next_id += 1;
            state.entries.push(Entry { id, payload });
        }
        self.arrivals.send_modify(|version| *version += 1);
        Ok(())
    }

    async fn read_batch(
        &self,
        group: &str,
        consumer: &str,
        max: usize,
    ) -> Result<Vec<Event>, BufferError> {
        self.ensure_online()?;
        let deadline = Instant::now() + self.config.read_block;
        let mut arrivals = self.arrivals.subscribe();
        loop {
            // Mark the version before scanning so arrivals during the scan
            // still wake us
            let _ = arrivals.borrow_and_update();
            let batch = self.claim(group, consumer, max)?;
            if !batch.is_empty() {
                return Ok(batch);
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(Vec::new());
            }
            if tokio::time::timeout(deadline - now, arrivals.changed())
                .await
                .is_err()
            {
                return Ok(Vec::new());
            }
            self.ensure_online()?;
        }
    }

    async fn ack(&self, group: &str, message_ids: &[String]) -> Result<(), BufferError> {
        self.ensure_online()?;
        let mut state = self.lock();
        let Some(group) = state.groups.get_mut(group) else {
            return Ok(());
        };
        for message_id in message_ids {
            if let Ok(id) = message_id.parse::<u64>() {
                group.pending.remove(&id);
            }
        }
        Ok(())
    }

    async fn dlq_append(&self, events: &[Event]) -> Result<(), BufferError> {
        self.ensure_online()?;
        let mut state = self.lock();
        for event in events {
            let payload = serde_json::to_string(event)
                .map_err(|err| BufferError::Fatal(format!("unencodable event: {err}")))?;
            state.dlq.push(DeadLetter {
                payload,
                original_event_id: event.id.clone(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
