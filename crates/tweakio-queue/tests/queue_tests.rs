// SPDX-FileCopyrightText: 2026 Tweakio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the persistence queue against the in-memory store.

use std::sync::Arc;
use std::time::Duration;

use tweakio_config::model::QueueConfig;
use tweakio_core::{
    Chat, ChatHandle, ChatId, Direction, HealthStatus, Message, RecordKey, RecordPayload,
    TweakioError, UpsertOutcome,
};
use tweakio_queue::{DeadLetterReason, PersistenceQueue};
use tweakio_test_utils::{Failure, MemoryStore, RecordingObserver};

fn config(workers: usize, retry_attempts: u32) -> QueueConfig {
    QueueConfig {
        workers,
        retry_attempts,
        backoff_base: 1,
        backoff_max: 10,
        ..QueueConfig::default()
    }
}

fn message(chat: &str, data_id: impl Into<String>) -> Message {
    Message::new(ChatId::from_name(chat), data_id, "hello", Direction::In)
}

fn key_of(msg: &Message) -> RecordKey {
    RecordPayload::from(msg.clone()).key()
}

fn start(config: &QueueConfig, store: &Arc<MemoryStore>) -> PersistenceQueue {
    PersistenceQueue::start(config, store.clone())
}

#[tokio::test]
async fn flushed_records_are_written_exactly_once() {
    let store = Arc::new(MemoryStore::new());
    let queue = start(&config(2, 3), &store);

    for i in 0..20 {
        queue.enqueue(message("alice", format!("m{i}"))).await.unwrap();
    }
    queue
        .enqueue(Chat::new("Alice", ChatHandle("row-0".into())))
        .await
        .unwrap();
    queue.flush().await.unwrap();

    assert_eq!(store.len().await, 21);
    let stats = queue.stats();
    assert_eq!(stats.enqueued, 21);
    assert_eq!(stats.written, 21);
    assert_eq!(stats.backlog, 0);
    assert_eq!(stats.dead_lettered, 0);
}

#[tokio::test]
async fn enqueue_returns_per_chat_sequence_numbers() {
    let store = Arc::new(MemoryStore::new());
    let queue = start(&config(2, 0), &store);

    assert_eq!(queue.enqueue(message("alice", "a0")).await.unwrap(), 0);
    assert_eq!(queue.enqueue(message("bob", "b0")).await.unwrap(), 0);
    assert_eq!(queue.enqueue(message("alice", "a1")).await.unwrap(), 1);
    assert_eq!(queue.enqueue(message("alice", "a2")).await.unwrap(), 2);
    queue.shutdown(Duration::from_secs(5)).await.unwrap();
}

#[tokio::test]
async fn duplicate_enqueue_leaves_one_entry() {
    let store = Arc::new(MemoryStore::new());
    let observer = Arc::new(RecordingObserver::new());
    let queue = PersistenceQueue::start_with_observer(&config(1, 0), store.clone(), observer.clone());

    let msg = message("alice", "m1");
    queue.enqueue(msg.clone()).await.unwrap();
    queue.enqueue(msg.clone()).await.unwrap();
    queue.flush().await.unwrap();

    assert_eq!(store.len().await, 1);
    let stats = queue.stats();
    assert_eq!(stats.written, 1);
    assert_eq!(stats.duplicates, 1);
    assert_eq!(
        observer.written(),
        vec![
            (key_of(&msg), UpsertOutcome::Inserted),
            (key_of(&msg), UpsertOutcome::Duplicate)
        ]
    );
}

#[tokio::test]
async fn shutdown_drains_every_pending_record() {
    let store = Arc::new(MemoryStore::new());
    let queue = start(&config(3, 3), &store);

    for i in 0..100 {
        let chat = format!("chat-{}", i % 7);
        queue.enqueue(message(&chat, format!("m{i}"))).await.unwrap();
    }
    let report = queue.shutdown(Duration::from_secs(30)).await.unwrap();

    assert!(report.drained);
    assert_eq!(report.dead_lettered, 0);
    assert_eq!(store.len().await, 100);
    assert_eq!(queue.stats().backlog, 0);
}

#[tokio::test]
async fn enqueue_after_shutdown_is_rejected() {
    let store = Arc::new(MemoryStore::new());
    let queue = start(&config(1, 0), &store);
    queue.shutdown(Duration::from_secs(1)).await.unwrap();

    let err = queue.enqueue(message("alice", "late")).await.unwrap_err();
    assert!(matches!(err, TweakioError::QueueClosed));
    assert!(queue.is_closed());
    assert!(store.is_empty().await);

    let again = queue.shutdown(Duration::from_secs(1)).await.unwrap();
    assert!(again.drained);
    assert_eq!(again.written, 0);
}

#[tokio::test]
async fn transient_failures_are_retried_until_written() {
    let store = Arc::new(MemoryStore::new());
    let observer = Arc::new(RecordingObserver::new());
    let queue = PersistenceQueue::start_with_observer(&config(1, 3), store.clone(), observer.clone());

    store.fail_next(2, Failure::Transient).await;
    let msg = message("alice", "m1");
    queue.enqueue(msg.clone()).await.unwrap();
    queue.flush().await.unwrap();

    assert!(store.get(&key_of(&msg)).await.is_some());
    assert_eq!(store.upsert_calls(), 3);
    assert_eq!(queue.stats().retries, 2);
    assert_eq!(observer.retries(), vec![(key_of(&msg), 1), (key_of(&msg), 2)]);
    assert_eq!(queue.dead_letter_count(), 0);
}

#[tokio::test]
async fn exhausted_retries_dead_letter_without_blocking_later_records() {
    let store = Arc::new(MemoryStore::new());
    let queue = start(&config(1, 2), &store);

    let poisoned = message("alice", "bad");
    store.fail_key(key_of(&poisoned), Failure::Transient).await;

    queue.enqueue(poisoned.clone()).await.unwrap();
    for i in 0..5 {
        queue.enqueue(message("alice", format!("ok{i}"))).await.unwrap();
    }
    queue.flush().await.unwrap();

    let letters = queue.dead_letters();
    assert_eq!(letters.len(), 1);
    assert_eq!(letters[0].record.key(), key_of(&poisoned));
    assert_eq!(letters[0].reason, DeadLetterReason::RetriesExhausted);
    assert_eq!(letters[0].attempts, 3);
    assert!(matches!(
        letters[0].to_error(),
        TweakioError::PersistenceFailure { attempts: 3, .. }
    ));

    assert_eq!(store.len().await, 5);
    assert_eq!(queue.stats().dead_lettered, 1);
}

#[tokio::test]
async fn permanent_failures_skip_retries() {
    let store = Arc::new(MemoryStore::new());
    let observer = Arc::new(RecordingObserver::new());
    let queue = PersistenceQueue::start_with_observer(&config(1, 5), store.clone(), observer.clone());

    let msg = message("alice", "corrupt");
    store.fail_key(key_of(&msg), Failure::Permanent).await;
    queue.enqueue(msg.clone()).await.unwrap();
    queue.flush().await.unwrap();

    assert_eq!(store.upsert_calls(), 1);
    assert!(observer.retries().is_empty());
    assert_eq!(
        observer.dead_letters(),
        vec![(key_of(&msg), DeadLetterReason::Permanent)]
    );
    assert!(matches!(queue.health(), HealthStatus::Degraded(_)));
}

#[tokio::test]
async fn replayed_dead_letters_are_written_once_healed() {
    let store = Arc::new(MemoryStore::new());
    let queue = start(&config(1, 0), &store);

    let msg = message("alice", "m1");
    store.fail_key(key_of(&msg), Failure::Permanent).await;
    queue.enqueue(msg.clone()).await.unwrap();
    queue.flush().await.unwrap();
    assert_eq!(queue.dead_letter_count(), 1);

    store.heal_key(&key_of(&msg)).await;
    assert_eq!(queue.replay_dead_letters().await.unwrap(), 1);
    queue.flush().await.unwrap();

    assert_eq!(queue.dead_letter_count(), 0);
    assert!(store.get(&key_of(&msg)).await.is_some());
    assert_eq!(queue.health(), HealthStatus::Healthy);
}

#[tokio::test]
async fn replay_after_shutdown_keeps_dead_letters() {
    let store = Arc::new(MemoryStore::new());
    let queue = start(&config(1, 0), &store);

    let msg = message("alice", "m1");
    store.fail_key(key_of(&msg), Failure::Permanent).await;
    queue.enqueue(msg).await.unwrap();
    queue.shutdown(Duration::from_secs(1)).await.unwrap();

    let err = queue.replay_dead_letters().await.unwrap_err();
    assert!(matches!(err, TweakioError::QueueClosed));
    assert_eq!(queue.dead_letter_count(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn records_of_one_chat_reach_the_store_in_sequence_order() {
    let store = Arc::new(MemoryStore::new());
    let queue = Arc::new(start(&config(4, 5), &store));
    store.fail_next(5, Failure::Transient).await;

    let mut producers = Vec::new();
    for c in 0..6 {
        let queue = Arc::clone(&queue);
        producers.push(tokio::spawn(async move {
            let chat = format!("chat-{c}");
            for m in 0..40 {
                queue.enqueue(message(&chat, format!("{c}-{m}"))).await.unwrap();
            }
        }));
    }
    for p in producers {
        p.await.unwrap();
    }
    queue.flush().await.unwrap();

    for c in 0..6 {
        let arrivals = store.arrivals(&ChatId::from_name(&format!("chat-{c}"))).await;
        assert_eq!(arrivals, (0..40).collect::<Vec<u64>>(), "chat-{c} out of order");
    }
    assert_eq!(queue.dead_letter_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn bounded_queue_applies_backpressure() {
    let store = Arc::new(MemoryStore::new().with_latency(Duration::from_secs(1)));
    let cfg = QueueConfig {
        capacity: 2,
        ..config(1, 0)
    };
    let queue = start(&cfg, &store);

    queue.enqueue(message("alice", "m0")).await.unwrap();
    queue.enqueue(message("alice", "m1")).await.unwrap();

    let blocked =
        tokio::time::timeout(Duration::from_millis(500), queue.enqueue(message("alice", "m2"))).await;
    assert!(blocked.is_err(), "third enqueue should wait for a free slot");

    queue.enqueue(message("alice", "m3")).await.unwrap();
    queue.flush().await.unwrap();

    let stats = queue.stats();
    assert!(stats.high_water <= 2);
    assert_eq!(stats.written, 3);
}

#[tokio::test(start_paused = true)]
async fn drain_deadline_dead_letters_what_is_left() {
    let store = Arc::new(MemoryStore::new().with_latency(Duration::from_secs(1)));
    let cfg = QueueConfig {
        batch_size: 1,
        ..config(1, 0)
    };
    let queue = start(&cfg, &store);

    for i in 0..10 {
        queue.enqueue(message("alice", format!("m{i}"))).await.unwrap();
    }
    let report = queue.shutdown(Duration::from_millis(2_500)).await.unwrap();

    assert!(!report.drained);
    assert_eq!(report.written + report.dead_lettered, 10);
    assert!(report.dead_lettered >= 7);
    assert!(
        queue
            .dead_letters()
            .iter()
            .all(|l| l.reason == DeadLetterReason::DrainDeadline)
    );
    assert_eq!(store.len().await as u64, report.written);
    // Only the write running at the deadline may have reached the store.
    assert_eq!(report.in_flight, 1);
    let letters = queue.dead_letters();
    assert_eq!(letters.iter().filter(|l| l.write_in_flight).count(), 1);
}

#[tokio::test(start_paused = true)]
async fn abandoned_batch_is_marked_in_flight() {
    let store = Arc::new(MemoryStore::new().with_latency(Duration::from_secs(1)));
    let queue = start(&config(1, 0), &store);

    for i in 0..4 {
        queue.enqueue(message("alice", format!("m{i}"))).await.unwrap();
    }
    let report = queue.shutdown(Duration::from_millis(500)).await.unwrap();

    assert!(!report.drained);
    assert_eq!(report.dead_lettered, 4);
    assert_eq!(report.in_flight, 4);
    assert!(queue.dead_letters().iter().all(|l| l.write_in_flight));
    assert_eq!(store.batch_calls(), 1);
}

#[tokio::test]
async fn records_are_written_in_batches() {
    let store = Arc::new(MemoryStore::new());
    let observer = Arc::new(RecordingObserver::new());
    let cfg = QueueConfig {
        batch_size: 4,
        ..config(1, 0)
    };
    let queue = PersistenceQueue::start_with_observer(&cfg, store.clone(), observer.clone());

    for i in 0..9 {
        queue.enqueue(message("alice", format!("m{i}"))).await.unwrap();
    }
    queue.enqueue(message("alice", "m0")).await.unwrap();
    queue.flush().await.unwrap();

    // 4 + 4 + 2, the last batch cut short by the flush.
    assert_eq!(store.batch_calls(), 3);
    assert_eq!(store.upsert_calls(), 0);
    assert_eq!(store.len().await, 9);
    let stats = queue.stats();
    assert_eq!(stats.written, 9);
    assert_eq!(stats.duplicates, 1);
    assert_eq!(
        observer.written().last(),
        Some(&(key_of(&message("alice", "m0")), UpsertOutcome::Duplicate))
    );
}

#[tokio::test(start_paused = true)]
async fn partial_batch_is_written_after_the_flush_interval() {
    let store = Arc::new(MemoryStore::new());
    let cfg = QueueConfig {
        batch_size: 100,
        flush_interval: 200,
        ..config(1, 0)
    };
    let queue = start(&cfg, &store);

    for i in 0..3 {
        queue.enqueue(message("alice", format!("m{i}"))).await.unwrap();
    }
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(store.is_empty().await, "batch still filling");

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(store.len().await, 3);
    assert_eq!(store.batch_calls(), 1);
}

#[tokio::test]
async fn failed_batch_falls_back_to_single_writes() {
    let store = Arc::new(MemoryStore::new());
    let queue = start(&config(1, 2), &store);

    let corrupt = message("alice", "corrupt");
    store.fail_key(key_of(&corrupt), Failure::Permanent).await;
    queue.enqueue(message("alice", "m0")).await.unwrap();
    queue.enqueue(corrupt.clone()).await.unwrap();
    queue.enqueue(message("alice", "m1")).await.unwrap();
    queue.flush().await.unwrap();

    assert_eq!(store.batch_calls(), 1);
    assert_eq!(store.upsert_calls(), 3);
    assert_eq!(store.len().await, 2);
    let letters = queue.dead_letters();
    assert_eq!(letters.len(), 1);
    assert_eq!(letters[0].record.key(), key_of(&corrupt));
    assert_eq!(letters[0].reason, DeadLetterReason::Permanent);
    assert!(!letters[0].write_in_flight);
    assert_eq!(store.arrivals(&ChatId::from_name("alice")).await, vec![0, 2]);
}

#[tokio::test]
async fn health_reports_closed_queue() {
    let store = Arc::new(MemoryStore::new());
    let queue = start(&config(2, 0), &store);
    assert_eq!(queue.health(), HealthStatus::Healthy);
    assert!(queue.stats().workers.iter().all(|w| w.alive));

    queue.shutdown(Duration::from_secs(1)).await.unwrap();
    assert!(matches!(queue.health(), HealthStatus::Unhealthy(_)));
    assert!(queue.stats().workers.iter().all(|w| !w.alive));
}
