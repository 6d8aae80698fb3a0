// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

const GROUP: &str = "log_processors";

fn fast_config() -> MemoryBufferConfig {
    MemoryBufferConfig {
        read_block: Duration::from_millis(20),
        idle_timeout: Duration::from_millis(50),
    }
}

fn event(n: usize) -> Event {
    let mut event = Event::with_message(format!("event {n}"));
    event.id = format!("00000000-0000-4000-8000-{n:012}");
    event
}

async fn buffer_with_group() -> MemoryBuffer {
    let buffer = MemoryBuffer::new(fast_config());
    buffer.ensure_group(GROUP).await.unwrap();
    buffer
}

#[tokio::test]
async fn append_then_read_delivers_in_order() {
    let buffer = buffer_with_group().await;
    for n in 0..3 {
        buffer.append(&event(n)).await.unwrap();
    }

    let batch = buffer.read_batch(GROUP, "c1", 10).await.unwrap();
    assert_eq!(batch.len(), 3);
    assert_eq!(batch[0].id, event(0).id);
    assert_eq!(batch[2].id, event(2).id);
    assert!(batch.iter().all(|e| !e.stream_message_id.is_empty()));
}

#[tokio::test]
async fn read_honors_batch_size() {
    let buffer = buffer_with_group().await;
    for n in 0..5 {
        buffer.append(&event(n)).await.unwrap();
    }

    let first = buffer.read_batch(GROUP, "c1", 2).await.unwrap();
    let second = buffer.read_batch(GROUP, "c1", 10).await.unwrap();
    assert_eq!(first.len(), 2);
    assert_eq!(second.len(), 3, "remaining undelivered entries");
}

#[tokio::test]
async fn group_created_after_appends_reads_from_start() {
    let buffer = MemoryBuffer::new(fast_config());
    buffer.append(&event(0)).await.unwrap();
    buffer.ensure_group(GROUP).await.unwrap();

    let batch = buffer.read_batch(GROUP, "c1", 10).await.unwrap();
    assert_eq!(batch.len(), 1);
}

#[tokio::test]
async fn ensure_group_is_idempotent() {
    let buffer = buffer_with_group().await;
    buffer.append(&event(0)).await.unwrap();
    let _ = buffer.read_batch(GROUP, "c1", 10).await.unwrap();

    // Re-creating the group must not reset its cursor or pending set
    buffer.ensure_group(GROUP).await.unwrap();
    assert_eq!(buffer.pending_count(GROUP), 1);
    let batch = buffer.read_batch(GROUP, "c1", 10).await.unwrap();
    assert!(batch.is_empty(), "no redelivery before the idle timeout");
}

#[tokio::test]
async fn unknown_group_is_fatal() {
    let buffer = MemoryBuffer::new(fast_config());
    let err = buffer.read_batch("nope", "c1", 10).await.unwrap_err();
    assert!(matches!(err, BufferError::Fatal(_)));
}

#[tokio::test]
async fn ack_clears_pending_and_is_idempotent() {
    let buffer = buffer_with_group().await;
    buffer.append(&event(0)).await.unwrap();
    let batch = buffer.read_batch(GROUP, "c1", 10).await.unwrap();
    let ids: Vec<String> = batch.iter().map(|e| e.stream_message_id.clone()).collect();

    buffer.ack(GROUP, &ids).await.unwrap();
    assert_eq!(buffer.pending_count(GROUP), 0);

    // Acking again is a no-op
    buffer.ack(GROUP, &ids).await.unwrap();
    assert_eq!(buffer.pending_count(GROUP), 0);
}

#[tokio::test]
async fn idle_pending_entries_are_reclaimed_by_another_consumer() {
    let buffer = buffer_with_group().await;
    buffer.append(&event(0)).await.unwrap();

    // c1 claims but never acks (crashed consumer)
    let claimed = buffer.read_batch(GROUP, "c1", 10).await.unwrap();
    assert_eq!(claimed.len(), 1);

    // Before the idle timeout nothing is claimable
    let early = buffer.read_batch(GROUP, "c2", 10).await.unwrap();
    assert!(early.is_empty());

    tokio::time::sleep(Duration::from_millis(60)).await;
    let reclaimed = buffer.read_batch(GROUP, "c2", 10).await.unwrap();
    assert_eq!(reclaimed.len(), 1);
    assert_eq!(reclaimed[0].id, event(0).id);
    assert_eq!(reclaimed[0].stream_message_id, claimed[0].stream_message_id);
    assert_eq!(
        buffer.pending_entries(GROUP),
        vec![("c2".to_string(), 2)],
        "the reclaim reassigns the pending entry to c2"
    );
}

#[tokio::test]
async fn blocked_read_wakes_on_arrival() {
    let buffer = MemoryBuffer::new(MemoryBufferConfig {
        read_block: Duration::from_secs(5),
        idle_timeout: Duration::from_secs(30),
    });
    buffer.ensure_group(GROUP).await.unwrap();

    let reader = {
        let buffer = buffer.clone();
        tokio::spawn(async move { buffer.read_batch(GROUP, "c1", 10).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    buffer.append(&event(0)).await.unwrap();

    let batch = tokio::time::timeout(Duration::from_secs(1), reader)
        .await
        .expect("read must wake on append, not wait out the block")
        .unwrap()
        .unwrap();
    assert_eq!(batch.len(), 1);
}

#[tokio::test]
async fn empty_read_returns_after_block() {
    let buffer = buffer_with_group().await;
    let started = std::time::Instant::now();
    let batch = buffer.read_batch(GROUP, "c1", 10).await.unwrap();
    assert!(batch.is_empty());
    assert!(started.elapsed() >= Duration::from_millis(20));
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn dlq_is_a_separate_stream() {
    let buffer = buffer_with_group().await;
    buffer.append(&event(0)).await.unwrap();
    buffer.dlq_append(&[event(1), event(2)]).await.unwrap();

    assert_eq!(buffer.len(), 1, "dead letters do not land in the main stream");
    let dlq = buffer.dlq_events();
    assert_eq!(dlq.len(), 2);
    assert_eq!(dlq[0].id, event(1).id);
}

#[tokio::test]
async fn offline_buffer_fails_transiently_everywhere() {
    let buffer = buffer_with_group().await;
    buffer.set_online(false);

    assert!(matches!(
        buffer.ping().await.unwrap_err(),
        BufferError::Transient(_)
    ));
    assert!(matches!(
        buffer.append(&event(0)).await.unwrap_err(),
        BufferError::Transient(_)
    ));
    assert!(matches!(
        buffer.read_batch(GROUP, "c1", 10).await.unwrap_err(),
        BufferError::Transient(_)
    ));
    assert!(matches!(
        buffer.ack(GROUP, &["0".to_string()]).await.unwrap_err(),
        BufferError::Transient(_)
    ));
    assert!(matches!(
        buffer.dlq_append(&[event(0)]).await.unwrap_err(),
        BufferError::Transient(_)
    ));

    buffer.set_online(true);
    buffer.append(&event(0)).await.unwrap();
    assert_eq!(buffer.len(), 1);
}

#[tokio::test]
async fn going_offline_wakes_blocked_readers() {
    let buffer = MemoryBuffer::new(MemoryBufferConfig {
        read_block: Duration::from_secs(5),
        idle_timeout: Duration::from_secs(30),
    });
    buffer.ensure_group(GROUP).await.unwrap();

    let reader = {
        let buffer = buffer.clone();
        tokio::spawn(async move { buffer.read_batch(GROUP, "c1", 10).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    buffer.set_online(false);

    let result = tokio::time::timeout(Duration::from_secs(1), reader)
        .await
        .expect("offline transition must wake blocked reads")
        .unwrap();
    assert!(matches!(result, Err(BufferError::Transient(_))));
}
