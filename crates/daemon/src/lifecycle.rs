// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon wiring: startup, background tasks, graceful shutdown
//!
//! Startup tolerates a buffer outage (ingest falls straight back to the
//! WAL), but a WAL directory or sink database that cannot be opened, or an
//! unbindable ingest address, fails the process.

use crate::config::Config;
use crate::http::{self, AppState};
use crate::metrics::Metrics;
use crate::rate::RateMeter;
use anyhow::Context;
use floodgate_adapters::{
    CachedKeyValidator, MemoryBuffer, MemoryBufferConfig, SqliteKeyStore, SqliteSink,
};
use floodgate_core::{
    shutdown, Availability, AvailabilityMonitor, BufferPort, ConsumerConfig, ConsumerLoop,
    IngestCoordinator, Redactor,
};
use floodgate_storage::{Wal, WalConfig};
use std::sync::Arc;
use tracing::{info, warn};

/// Run the whole pipeline until a termination signal arrives.
pub async fn run(config: Config) -> anyhow::Result<()> {
    let wal = Wal::open(
        &config.wal_path,
        WalConfig {
            max_segment_size: config.wal_segment_size,
            max_total_size: config.wal_max_disk_size,
        },
    )
    .with_context(|| format!("opening WAL directory {}", config.wal_path.display()))?;

    let buffer = MemoryBuffer::new(MemoryBufferConfig {
        read_block: std::time::Duration::from_secs(2),
        idle_timeout: config.buffer_idle_timeout,
    });
    if let Err(err) = buffer.ensure_group(&config.consumer_group).await {
        // Ingest can still run against the WAL; the monitor will retry
        warn!(error = %err, "could not set up consumer group at startup");
    }

    let sink = SqliteSink::open(&config.sink_db_path)
        .with_context(|| format!("opening sink database {}", config.sink_db_path.display()))?;
    let key_store = SqliteKeyStore::open(&config.sink_db_path)
        .with_context(|| format!("opening key store {}", config.sink_db_path.display()))?;
    let validator = Arc::new(CachedKeyValidator::new(key_store, config.api_key_cache_ttl));

    let availability = Arc::new(Availability::new());
    let coordinator = Arc::new(IngestCoordinator::new(
        buffer.clone(),
        wal.clone(),
        availability.clone(),
        Redactor::new(config.pii_redaction_fields.clone()),
    ));

    let (shutdown_tx, shutdown_rx) = shutdown::channel();

    let mut tasks = Vec::new();
    let monitor = AvailabilityMonitor::new(
        buffer.clone(),
        wal.clone(),
        availability.clone(),
        config.health_check_interval,
        shutdown_rx.clone(),
    );
    tasks.push(tokio::spawn(monitor.run()));

    for index in 0..config.consumer_count.max(1) {
        let consumer_config = ConsumerConfig {
            group: config.consumer_group.clone(),
            consumer: format!("{}-{index}", config.consumer_name),
            batch_size: config.consumer_batch_size,
            retry_count: config.consumer_retry_count,
            retry_backoff: config.consumer_retry_backoff,
            poll_interval: config.consumer_poll_interval,
        };
        let consumer = ConsumerLoop::new(
            buffer.clone(),
            sink.clone(),
            consumer_config,
            shutdown_rx.clone(),
        );
        tasks.push(tokio::spawn(consumer.run()));
    }

    let state = AppState {
        coordinator,
        availability,
        validator,
        metrics: Arc::new(Metrics::new()),
        rate: Arc::new(RateMeter::new()),
        max_event_size: config.max_event_size,
        backpressure_policy: config.backpressure_policy,
        shutdown: shutdown_rx.clone(),
    };

    let listener = tokio::net::TcpListener::bind(config.ingest_addr)
        .await
        .with_context(|| format!("binding ingest address {}", config.ingest_addr))?;
    info!(
        addr = %config.ingest_addr,
        wal_path = %config.wal_path.display(),
        dlq_stream = %config.dlq_stream,
        consumers = config.consumer_count.max(1),
        "floodgated listening"
    );

    let signal_tx = shutdown_tx.clone();
    tokio::spawn(async move {
        wait_for_signal().await;
        info!("termination signal received; shutting down");
        let _ = signal_tx.send(true);
    });

    let mut server_shutdown = shutdown_rx.clone();
    axum::serve(listener, http::router(state))
        .with_graceful_shutdown(async move {
            shutdown::requested(&mut server_shutdown).await;
        })
        .await
        .context("serving ingest endpoint")?;

    // Let the monitor and consumers reach quiescence, then seal the WAL
    let _ = shutdown_tx.send(true);
    for task in tasks {
        let _ = task.await;
    }
    wal.close().context("closing WAL active segment")?;
    info!("floodgated stopped");
    Ok(())
}

async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};
    let Ok(mut sigterm) = signal(SignalKind::terminate()) else {
        return std::future::pending().await;
    };
    let Ok(mut sigint) = signal(SignalKind::interrupt()) else {
        return std::future::pending().await;
    };
    tokio::select! {
        _ = sigterm.recv() => {}
        _ = sigint.recv() => {}
    }
}
