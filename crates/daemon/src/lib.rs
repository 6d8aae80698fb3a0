// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! floodgated: the floodgate log ingestion daemon
//!
//! Wires the HTTP ingest surface, the availability monitor, and the consumer
//! workers around the core engine and the concrete backends.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod metrics;
pub mod rate;

pub use config::{BackpressurePolicy, Config, ConfigError};
pub use http::AppState;
pub use metrics::Metrics;
pub use rate::RateMeter;
