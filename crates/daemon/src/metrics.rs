// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Ingest counters rendered as Prometheus text

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Default)]
pub struct Metrics {
    pub events_accepted: AtomicU64,
    pub events_error_parse: AtomicU64,
    pub events_error_size: AtomicU64,
    pub events_error_buffer: AtomicU64,
    pub events_error_media_type: AtomicU64,
    pub bytes_total: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn render(&self, wal_active: bool, cache_hits: u64, cache_misses: u64) -> String {
        format!(
            "# TYPE floodgate_ingest_events_total counter\n\
             floodgate_ingest_events_total{{status=\"accepted\"}} {accepted}\n\
             floodgate_ingest_events_total{{status=\"error_parse\"}} {error_parse}\n\
             floodgate_ingest_events_total{{status=\"error_size\"}} {error_size}\n\
             floodgate_ingest_events_total{{status=\"error_buffer\"}} {error_buffer}\n\
             floodgate_ingest_events_total{{status=\"error_media_type\"}} {error_media_type}\n\
             # TYPE floodgate_ingest_bytes_total counter\n\
             floodgate_ingest_bytes_total {bytes}\n\
             # TYPE floodgate_ingest_wal_active_gauge gauge\n\
             floodgate_ingest_wal_active_gauge {wal_active}\n\
             # TYPE floodgate_auth_api_key_cache_hits_total counter\n\
             floodgate_auth_api_key_cache_hits_total {cache_hits}\n\
             # TYPE floodgate_auth_api_key_cache_misses_total counter\n\
             floodgate_auth_api_key_cache_misses_total {cache_misses}\n",
            accepted = self.events_accepted.load(Ordering::Relaxed),
            error_parse = self.events_error_parse.load(Ordering::Relaxed),
            error_size = self.events_error_size.load(Ordering::Relaxed),
            error_buffer = self.events_error_buffer.load(Ordering::Relaxed),
            error_media_type = self.events_error_media_type.load(Ordering::Relaxed),
            bytes = self.bytes_total.load(Ordering::Relaxed),
            wal_active = u64::from(wal_active),
            cache_hits = cache_hits,
            cache_misses = cache_misses,
        )
    }
}

#[cfg(test)]
#[path = "metrics_tests.rs"]
mod tests;
