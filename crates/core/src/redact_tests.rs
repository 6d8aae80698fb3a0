// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;

fn event_with_metadata(metadata: serde_json::Value) -> Event {
    let mut event = Event::with_message("x");
    event.metadata = Some(metadata);
    event
}

#[test]
fn redacts_configured_fields() {
    let redactor = Redactor::new(["email", "password"]);
    let mut event = event_with_metadata(json!({
        "email": "alice@example.com",
        "password": "hunter2",
        "request_id": "r-1"
    }));

    redactor.redact(&mut event).unwrap();

    let metadata = event.metadata.unwrap();
    assert_eq!(metadata["email"], REDACTED_PLACEHOLDER);
    assert_eq!(metadata["password"], REDACTED_PLACEHOLDER);
    assert_eq!(metadata["request_id"], "r-1");
    assert!(event.pii_redacted);
}

#[test]
fn untouched_event_is_not_tagged() {
    let redactor = Redactor::new(["email"]);
    let mut event = event_with_metadata(json!({"request_id": "r-1"}));
    redactor.redact(&mut event).unwrap();
    assert!(!event.pii_redacted);
}

#[test]
fn missing_metadata_is_ok() {
    let redactor = Redactor::new(["email"]);
    let mut event = Event::with_message("x");
    redactor.redact(&mut event).unwrap();
    assert!(!event.pii_redacted);
}

#[test]
fn empty_field_list_is_a_noop() {
    let redactor = Redactor::default();
    let mut event = event_with_metadata(json!({"email": "a@b.c"}));
    redactor.redact(&mut event).unwrap();
    assert_eq!(event.metadata.unwrap()["email"], "a@b.c");
}

#[test]
fn non_object_metadata_is_an_error() {
    let redactor = Redactor::new(["email"]);
    let mut event = event_with_metadata(json!("just a string"));
    assert!(matches!(
        redactor.redact(&mut event),
        Err(RedactError::NotAnObject)
    ));
    // Original value survives for unredacted ingestion
    assert_eq!(event.metadata.unwrap(), json!("just a string"));
}
