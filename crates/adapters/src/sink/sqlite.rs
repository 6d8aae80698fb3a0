// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! SQLite sink with staged idempotent upsert
//!
//! `write_batch` is one transaction: the batch is bulk-loaded into a staging
//! table, then merged into `logs` with `ON CONFLICT (event_id) DO UPDATE`,
//! so replaying the same events yields one row per id with last-writer-wins
//! columns. The whole batch commits or none of it does.

use async_trait::async_trait;
use floodgate_core::{Event, SinkError, SinkPort};
use rusqlite::{params, Connection, ErrorCode};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS logs (
    event_id    TEXT PRIMARY KEY,
    received_at TEXT NOT NULL,
    event_time  TEXT,
    source      TEXT NOT NULL DEFAULT '',
    level       TEXT NOT NULL DEFAULT '',
    message     TEXT NOT NULL,
    metadata    TEXT
);
";

/// A row read back from the `logs` table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredLog {
    pub event_id: String,
    pub received_at: String,
    pub event_time: Option<String>,
    pub source: String,
    pub level: String,
    pub message: String,
    pub metadata: Option<String>,
}

/// Sink backed by a SQLite database file
#[derive(Clone)]
pub struct SqliteSink {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteSink {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SinkError> {
        Self::from_connection(Connection::open(path).map_err(classify)?)
    }

    /// Private database for tests
    pub fn in_memory() -> Result<Self, SinkError> {
        Self::from_connection(Connection::open_in_memory().map_err(classify)?)
    }

    fn from_connection(conn: Connection) -> Result<Self, SinkError> {
        conn.execute_batch(SCHEMA).map_err(classify)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn count(&self) -> Result<u64, SinkError> {
        self.lock()
            .query_row("SELECT COUNT(*) FROM logs", [], |row| row.get(0))
            .map_err(classify)
    }

    pub fn event_ids(&self) -> Result<Vec<String>, SinkError> {
        let conn = self.lock();
        let mut stmt = conn
            .prepare("SELECT event_id FROM logs ORDER BY event_id")
            .map_err(classify)?;
        let rows = stmt
            .query_map([], |row| row.get(0))
            .map_err(classify)?
            .collect::<Result<Vec<String>, _>>()
            .map_err(classify)?;
        Ok(rows)
    }

    pub fn fetch(&self, event_id: &str) -> Result<Option<StoredLog>, SinkError> {
        let conn = self.lock();
        let mut stmt = conn
            .prepare(
                "SELECT event_id, received_at, event_time, source, level, message, metadata
                 FROM logs WHERE event_id = ?1",
            )
            .map_err(classify)?;
        let mut rows = stmt
            .query_map(params![event_id], |row| {
                Ok(StoredLog {
                    event_id: row.get(0)?,
                    received_at: row.get(1)?,
                    event_time: row.get(2)?,
                    source: row.get(3)?,
                    level: row.get(4)?,
                    message: row.get(5)?,
                    metadata: row.get(6)?,
                })
            })
            .map_err(classify)?;
        rows.next().transpose().map_err(classify)
    }
}

#[async_trait]
impl SinkPort for SqliteSink {
    async fn write_batch(&self, events: &[Event]) -> Result<(), SinkError> {
        if events.is_empty() {
            return Ok(());
        }
        let conn = self.conn.clone();
        let events = events.to_vec();
        tokio::task::spawn_blocking(move || upsert_batch(&conn, &events))
            .await
            .map_err(|err| SinkError::Fatal(format!("sink worker failed: {err}")))?
    }
}

fn upsert_batch(conn: &Mutex<Connection>, events: &[Event]) -> Result<(), SinkError> {
    let mut conn = conn.lock().unwrap_or_else(|e| e.into_inner());
    let tx = conn.transaction().map_err(classify)?;

    // Temp tables are connection-scoped in SQLite, so the staging table is
    // created once and emptied per batch instead of dropped on commit
    tx.execute_batch(
        "CREATE TEMP TABLE IF NOT EXISTS logs_import (
            event_id    TEXT,
            received_at TEXT,
            event_time  TEXT,
            source      TEXT,
            level       TEXT,
            message     TEXT,
            metadata    TEXT
        );
        DELETE FROM logs_import;",
    )
    .map_err(classify)?;

    {
        let mut stage = tx
            .prepare(
                "INSERT INTO logs_import
                     (event_id, received_at, event_time, source, level, message, metadata)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )
            .map_err(classify)?;
        for event in events {
            stage
                .execute(params![
                    event.id,
                    event.received_at.to_rfc3339(),
                    event.event_time.map(|t| t.to_rfc3339()),
                    event.source,
                    event.level,
                    event.message,
                    event.metadata.as_ref().map(|m| m.to_string()),
                ])
                .map_err(classify)?;
        }
    }

    // ORDER BY rowid makes the merge apply staged duplicates in arrival
    // order; WHERE true disambiguates the upsert grammar
    tx.execute(
        "INSERT INTO logs (event_id, received_at, event_time, source, level, message, metadata)
         SELECT event_id, received_at, event_time, source, level, message, metadata
         FROM logs_import
         WHERE true
         ORDER BY rowid
         ON CONFLICT (event_id) DO UPDATE SET
             received_at = excluded.received_at,
             event_time  = excluded.event_time,
             source      = excluded.source,
             level       = excluded.level,
             message     = excluded.message,
             metadata    = excluded.metadata",
        [],
    )
    .map_err(classify)?;

    tx.execute("DELETE FROM logs_import", []).map_err(classify)?;
    tx.commit().map_err(classify)
}

fn classify(err: rusqlite::Error) -> SinkError {
    match &err {
        rusqlite::Error::SqliteFailure(failure, _)
            if matches!(
                failure.code,
                ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked
            ) =>
        {
            SinkError::Transient(err.to_string())
        }
        _ => SinkError::Fatal(err.to_string()),
    }
}

#[cfg(test)]
#[path = "sqlite_tests.rs"]
mod tests;
