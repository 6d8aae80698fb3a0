// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Accepted-event rate meter
//!
//! Counts accepted events into one-second buckets; `events_per_second`
//! reports the most recent complete second. Served on `/admin/rate`.

use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Default)]
struct RateState {
    current_second: u64,
    current_count: u64,
    last_complete: u64,
}

#[derive(Default)]
pub struct RateMeter {
    state: Mutex<RateState>,
}

impl RateMeter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, count: u64) {
        self.record_at(now_second(), count);
    }

    /// Events counted in the most recent complete second
    pub fn events_per_second(&self) -> u64 {
        self.rate_at(now_second())
    }

    fn record_at(&self, second: u64, count: u64) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if second == state.current_second {
            state.current_count += count;
            return;
        }
        state.last_complete = if second == state.current_second + 1 {
            state.current_count
        } else {
            0
        };
        state.current_second = second;
        state.current_count = count;
    }

    fn rate_at(&self, second: u64) -> u64 {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if second == state.current_second {
            state.last_complete
        } else if second == state.current_second + 1 {
            state.current_count
        } else {
            0
        }
    }
}

fn now_second() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
#[path = "rate_tests.rs"]
mod tests;
