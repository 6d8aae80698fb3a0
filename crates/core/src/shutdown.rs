// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared cooperative shutdown token
//!
//! One watch channel fans out to every background task; a dropped sender
//! counts as shutdown so orphaned tasks never spin.

use tokio::sync::watch;

/// Create a shutdown token pair. Flip with `tx.send(true)`.
pub fn channel() -> (watch::Sender<bool>, watch::Receiver<bool>) {
    watch::channel(false)
}

/// Resolves once shutdown is requested (or the sender is gone).
pub async fn requested(signal: &mut watch::Receiver<bool>) {
    // wait_for errs only when the sender is dropped; treat that as shutdown
    let _ = signal.wait_for(|stop| *stop).await;
}

/// Non-blocking check of the current token state.
pub fn is_requested(signal: &watch::Receiver<bool>) -> bool {
    *signal.borrow()
}
