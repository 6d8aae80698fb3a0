// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! API-key validation with a double-checked TTL cache
//!
//! The read-lock fast path serves cached verdicts without contention; a miss
//! takes the write lock, re-checks (another task may have filled the entry
//! while we waited), queries the backing store, and caches the verdict with
//! a TTL. Store errors are never cached.

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("key store unavailable: {0}")]
    Store(String),
}

/// Source of truth for API keys
#[async_trait]
pub trait KeyStore: Clone + Send + Sync + 'static {
    /// Whether the key exists, is active, and has not expired
    async fn lookup(&self, key: &str) -> Result<bool, AuthError>;
}

struct CacheEntry {
    is_valid: bool,
    expires_at: Instant,
}

/// TTL-cached validator in front of a [`KeyStore`]
pub struct CachedKeyValidator<S> {
    store: S,
    ttl: Duration,
    cache: RwLock<HashMap<String, CacheEntry>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<S: KeyStore> CachedKeyValidator<S> {
    pub fn new(store: S, ttl: Duration) -> Self {
        Self {
            store,
            ttl,
            cache: RwLock::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub async fn is_valid(&self, key: &str) -> Result<bool, AuthError> {
        let now = Instant::now();
        {
            let cache = self.cache.read().await;
            if let Some(entry) = cache.get(key) {
                if entry.expires_at > now {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    return Ok(entry.is_valid);
                }
            }
        }
        self.misses.fetch_add(1, Ordering::Relaxed);

        let mut cache = self.cache.write().await;
        if let Some(entry) = cache.get(key) {
            if entry.expires_at > now {
                return Ok(entry.is_valid);
            }
        }

        let is_valid = self.store.lookup(key).await.inspect_err(|err| {
            error!(error = %err, "api key lookup failed; verdict not cached");
        })?;
        cache.insert(
            key.to_string(),
            CacheEntry {
                is_valid,
                expires_at: now + self.ttl,
            },
        );
        Ok(is_valid)
    }

    /// (hits, misses) since startup
    pub fn cache_stats(&self) -> (u64, u64) {
        (
            self.hits.load(Ordering::Relaxed),
            self.misses.load(Ordering::Relaxed),
        )
    }
}

/// Key store backed by an `api_keys` table in SQLite
#[derive(Clone)]
pub struct SqliteKeyStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteKeyStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, AuthError> {
        Self::from_connection(
            Connection::open(path).map_err(|err| AuthError::Store(err.to_string()))?,
        )
    }

    pub fn in_memory() -> Result<Self, AuthError> {
        Self::from_connection(
            Connection::open_in_memory().map_err(|err| AuthError::Store(err.to_string()))?,
        )
    }

    fn from_connection(conn: Connection) -> Result<Self, AuthError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS api_keys (
                key        TEXT PRIMARY KEY,
                is_active  INTEGER NOT NULL DEFAULT 1,
                expires_at TEXT
            );",
        )
        .map_err(|err| AuthError::Store(err.to_string()))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Register a key; `expires_at` is RFC 3339, or None for no expiry
    pub fn insert_key(
        &self,
        key: &str,
        is_active: bool,
        expires_at: Option<&str>,
    ) -> Result<(), AuthError> {
        self.conn
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .execute(
                "INSERT OR REPLACE INTO api_keys (key, is_active, expires_at) VALUES (?1, ?2, ?3)",
                params![key, is_active, expires_at],
            )
            .map_err(|err| AuthError::Store(err.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl KeyStore for SqliteKeyStore {
    async fn lookup(&self, key: &str) -> Result<bool, AuthError> {
        let conn = self.conn.clone();
        let key = key.to_string();
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap_or_else(|e| e.into_inner());
            conn.query_row(
                "SELECT EXISTS(
                     SELECT 1 FROM api_keys
                     WHERE key = ?1
                       AND is_active = 1
                       AND (expires_at IS NULL OR expires_at > ?2)
                 )",
                params![key, Utc::now().to_rfc3339()],
                |row| row.get(0),
            )
            .map_err(|err| AuthError::Store(err.to_string()))
        })
        .await
        .map_err(|err| AuthError::Store(format!("lookup task failed: {err}")))?
    }
}

/// Scriptable key store for tests
#[derive(Clone, Default)]
pub struct FakeKeyStore {
    inner: Arc<Mutex<FakeKeyStoreState>>,
}

#[derive(Default)]
struct FakeKeyStoreState {
    keys: HashMap<String, bool>,
    lookups: u64,
    fail_remaining: usize,
}

impl FakeKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, key: &str, is_valid: bool) {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .keys
            .insert(key.to_string(), is_valid);
    }

    pub fn fail_next(&self, count: usize) {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .fail_remaining = count;
    }

    /// How many times the backing store was actually queried
    pub fn lookups(&self) -> u64 {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).lookups
    }
}

#[async_trait]
impl KeyStore for FakeKeyStore {
    async fn lookup(&self, key: &str) -> Result<bool, AuthError> {
        let mut state = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        state.lookups += 1;
        if state.fail_remaining > 0 {
            state.fail_remaining -= 1;
            return Err(AuthError::Store("injected store outage".to_string()));
        }
        Ok(state.keys.get(key).copied().unwrap_or(false))
    }
}

#[cfg(test)]
#[path = "auth_tests.rs"]
mod tests;
