// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! floodgate-storage: segmented file WAL
//!
//! The WAL absorbs ingest traffic while the shared buffer is unreachable and
//! replays it on recovery. Newline-delimited JSON segments with a bounded
//! total disk footprint.

pub mod wal;

pub use wal::{Wal, WalConfig};
