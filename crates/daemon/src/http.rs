// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP ingest surface
//!
//! `POST /ingest` takes a single JSON event or an NDJSON stream. Producers
//! are acked with 202 once every parsed event is durable in the buffer or
//! the WAL; back-pressure is answered per the configured policy. Plus
//! `/healthz`, `/metrics`, and `/admin/rate`.

use crate::config::BackpressurePolicy;
use crate::metrics::Metrics;
use crate::rate::RateMeter;
use axum::body::to_bytes;
use axum::extract::{Request, State};
use axum::http::{header::CONTENT_TYPE, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use floodgate_adapters::{CachedKeyValidator, MemoryBuffer, SqliteKeyStore};
use floodgate_core::{shutdown, Availability, Event, IngestCoordinator, IngestError};
use floodgate_storage::Wal;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, warn};

const API_KEY_HEADER: &str = "x-api-key";
const BLOCK_RETRY_INTERVAL: Duration = Duration::from_millis(100);

pub type Coordinator = IngestCoordinator<MemoryBuffer, Wal>;
pub type Validator = CachedKeyValidator<SqliteKeyStore>;

#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<Coordinator>,
    pub availability: Arc<Availability>,
    pub validator: Arc<Validator>,
    pub metrics: Arc<Metrics>,
    pub rate: Arc<RateMeter>,
    pub max_event_size: u64,
    pub backpressure_policy: BackpressurePolicy,
    pub shutdown: watch::Receiver<bool>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/ingest", post(ingest))
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics))
        .route("/admin/rate", get(admin_rate))
        .with_state(state)
}

pub async fn ingest(State(state): State<AppState>, request: Request) -> Response {
    let api_key = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();
    if api_key.is_empty() {
        return (StatusCode::UNAUTHORIZED, "missing API key\n").into_response();
    }
    match state.validator.is_valid(&api_key).await {
        Ok(true) => {}
        Ok(false) => return (StatusCode::UNAUTHORIZED, "invalid API key\n").into_response(),
        Err(err) => {
            error!(error = %err, "api key validation failed");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "auth backend unavailable\n",
            )
                .into_response();
        }
    }

    let content_type = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_ascii_lowercase();

    let body = match to_bytes(request.into_body(), state.max_event_size as usize).await {
        Ok(body) => body,
        Err(_) => {
            state.metrics.events_error_size.fetch_add(1, Ordering::Relaxed);
            return (StatusCode::PAYLOAD_TOO_LARGE, "payload too large\n").into_response();
        }
    };
    state
        .metrics
        .bytes_total
        .fetch_add(body.len() as u64, Ordering::Relaxed);

    if content_type.starts_with("application/json") {
        ingest_single(&state, &body).await
    } else if content_type.starts_with("application/x-ndjson") {
        ingest_ndjson(&state, &body).await
    } else {
        state
            .metrics
            .events_error_media_type
            .fetch_add(1, Ordering::Relaxed);
        (
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            "use application/json or application/x-ndjson\n",
        )
            .into_response()
    }
}

async fn ingest_single(state: &AppState, body: &[u8]) -> Response {
    let mut event = match Event::parse(body) {
        Ok(event) => event,
        Err(err) => {
            state.metrics.events_error_parse.fetch_add(1, Ordering::Relaxed);
            warn!(error = %err, "rejecting unparsable event payload");
            return (StatusCode::BAD_REQUEST, "invalid event payload\n").into_response();
        }
    };

    match admit(state, &mut event).await {
        Admit::Accepted => {
            record_accepted(state, 1);
            StatusCode::ACCEPTED.into_response()
        }
        Admit::Dropped => StatusCode::ACCEPTED.into_response(),
        Admit::Rejected => (StatusCode::BAD_REQUEST, "event rejected\n").into_response(),
        Admit::Saturated => (StatusCode::TOO_MANY_REQUESTS, "pipeline saturated\n").into_response(),
        Admit::ShuttingDown => {
            (StatusCode::SERVICE_UNAVAILABLE, "shutting down\n").into_response()
        }
    }
}

async fn ingest_ndjson(state: &AppState, body: &[u8]) -> Response {
    let mut accepted = 0;
    let mut any_rejected = false;
    for line in body.split(|&byte| byte == b'\n') {
        let line = trim_line(line);
        if line.is_empty() {
            continue;
        }
        let mut event = match Event::parse(line) {
            Ok(event) => event,
            Err(err) => {
                state.metrics.events_error_parse.fetch_add(1, Ordering::Relaxed);
                warn!(error = %err, "skipping unparsable NDJSON line");
                continue;
            }
        };
        match admit(state, &mut event).await {
            Admit::Accepted => accepted += 1,
            Admit::Dropped => {}
            Admit::Rejected => any_rejected = true,
            Admit::Saturated => {
                record_accepted(state, accepted);
                return (StatusCode::TOO_MANY_REQUESTS, "pipeline saturated\n").into_response();
            }
            Admit::ShuttingDown => {
                record_accepted(state, accepted);
                return (StatusCode::SERVICE_UNAVAILABLE, "shutting down\n").into_response();
            }
        }
    }
    record_accepted(state, accepted);

    if any_rejected {
        (StatusCode::BAD_REQUEST, "one or more events rejected\n").into_response()
    } else {
        StatusCode::ACCEPTED.into_response()
    }
}

enum Admit {
    Accepted,
    Rejected,
    Dropped,
    Saturated,
    ShuttingDown,
}

/// Drive one event through the coordinator, applying the back-pressure
/// policy. `Block` re-attempts until the pipeline drains or shutdown.
async fn admit(state: &AppState, event: &mut Event) -> Admit {
    loop {
        match state.coordinator.accept(event).await {
            Ok(()) => return Admit::Accepted,
            Err(IngestError::Rejected(_)) => {
                state.metrics.events_error_buffer.fetch_add(1, Ordering::Relaxed);
                return Admit::Rejected;
            }
            Err(IngestError::BackPressure(reason)) => match state.backpressure_policy {
                BackpressurePolicy::Reject => return Admit::Saturated,
                BackpressurePolicy::Drop => {
                    state.metrics.events_error_buffer.fetch_add(1, Ordering::Relaxed);
                    warn!(event_id = %event.id, reason = %reason, "dropping event under back-pressure");
                    return Admit::Dropped;
                }
                BackpressurePolicy::Block => {
                    let mut signal = state.shutdown.clone();
                    tokio::select! {
                        _ = tokio::time::sleep(BLOCK_RETRY_INTERVAL) => {}
                        _ = shutdown::requested(&mut signal) => return Admit::ShuttingDown,
                    }
                }
            },
        }
    }
}

fn record_accepted(state: &AppState, count: u64) {
    if count > 0 {
        state.metrics.events_accepted.fetch_add(count, Ordering::Relaxed);
        state.rate.record(count);
    }
}

fn trim_line(line: &[u8]) -> &[u8] {
    match line.split_last() {
        Some((b'\r', rest)) => rest,
        _ => line,
    }
}

pub async fn healthz(State(state): State<AppState>) -> Response {
    Json(serde_json::json!({
        "status": "ok",
        "buffer_available": state.availability.is_available(),
    }))
    .into_response()
}

pub async fn metrics(State(state): State<AppState>) -> Response {
    let (cache_hits, cache_misses) = state.validator.cache_stats();
    let body = state
        .metrics
        .render(!state.availability.is_available(), cache_hits, cache_misses);
    ([(CONTENT_TYPE, "text/plain; version=0.0.4")], body).into_response()
}

pub async fn admin_rate(State(state): State<AppState>) -> Response {
    Json(serde_json::json!({
        "events_per_second": state.rate.events_per_second(),
    }))
    .into_response()
}

#[cfg(test)]
#[path = "http_tests.rs"]
mod tests;
