// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! floodgate-adapters: concrete backends behind the core ports
//!
//! An in-process stream buffer with consumer-group semantics, a SQLite sink
//! implementing the staged idempotent upsert, a scriptable in-memory sink,
//! and the cached API-key validator.

pub mod auth;
pub mod buffer {
    pub mod memory;

    pub use memory::*;
}
pub mod sink {
    pub mod memory;
    pub mod sqlite;

    pub use memory::*;
    pub use sqlite::*;
}

pub use auth::{AuthError, CachedKeyValidator, FakeKeyStore, KeyStore, SqliteKeyStore};
pub use buffer::{MemoryBuffer, MemoryBufferConfig};
pub use sink::{MemorySink, SqliteSink, StoredLog};
