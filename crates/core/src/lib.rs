// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! floodgate-core: durability and delivery engine for the floodgate log
//! pipeline.
//!
//! The core owns the event model, the buffer/sink/WAL port contracts, the
//! availability state machine with its WAL replay protocol, the ingest
//! coordinator, and the batched consumer loop. Concrete backends live in
//! `floodgate-adapters`; the segmented file WAL lives in `floodgate-storage`.

pub mod availability;
pub mod consumer;
pub mod event;
pub mod ingest;
pub mod ports;
pub mod redact;
pub mod shutdown;

pub use availability::{Availability, AvailabilityMonitor};
pub use consumer::{retry_delay, BatchOutcome, ConsumerConfig, ConsumerError, ConsumerLoop};
pub use event::{Event, ParseError};
pub use ingest::{IngestCoordinator, IngestError};
pub use ports::{BufferError, BufferPort, SinkError, SinkPort, WalError, WalPort};
pub use redact::Redactor;

#[cfg(test)]
mod test_support;
