// SPDX-FileCopyrightText: 2026 Tweakio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory durable store for deterministic testing.
//!
//! `MemoryStore` keeps the latest record per key, logs the order in which
//! each chat's records arrived, and can be told to fail upcoming writes or
//! every write for one key. A batch counts as one call: it pays the latency
//! once and is applied all-or-nothing.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use tweakio_core::{
    AdapterType, ChatId, DurableStore, HealthStatus, MessageId, PluginAdapter, RecordKey,
    TweakioError, UpsertOutcome, WriteRecord,
};

use crate::mock_source::Failure;

#[derive(Default)]
struct Inner {
    entries: HashMap<RecordKey, WriteRecord>,
    /// Sequence numbers per chat in arrival order, duplicates included.
    arrivals: HashMap<ChatId, Vec<u64>>,
    queued_failures: VecDeque<Failure>,
    failing_keys: HashMap<RecordKey, Failure>,
}

impl Inner {
    /// Fail the call if a failure is queued or any key is marked failing.
    fn check(&mut self, records: &[WriteRecord]) -> Result<(), TweakioError> {
        if let Some(failure) = self.queued_failures.pop_front() {
            let what = records.first().map(|r| r.key().to_string()).unwrap_or_default();
            return Err(failure.to_error(&what));
        }
        for record in records {
            let key = record.key();
            if let Some(failure) = self.failing_keys.get(&key) {
                return Err(failure.to_error(&key.to_string()));
            }
        }
        Ok(())
    }

    fn apply(&mut self, record: &WriteRecord) -> UpsertOutcome {
        self.arrivals
            .entry(record.chat_id().clone())
            .or_default()
            .push(record.seq);

        let key = record.key();
        let is_chat = key.message_id.is_none();
        if self.entries.contains_key(&key) && !is_chat {
            return UpsertOutcome::Duplicate;
        }
        self.entries.insert(key, record.clone());
        UpsertOutcome::Inserted
    }
}

/// A mock durable store.
pub struct MemoryStore {
    inner: Mutex<Inner>,
    latency: Option<Duration>,
    read_latency: Option<Duration>,
    upsert_calls: AtomicUsize,
    batch_calls: AtomicUsize,
    read_calls: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            latency: None,
            read_latency: None,
            upsert_calls: AtomicUsize::new(0),
            batch_calls: AtomicUsize::new(0),
            read_calls: AtomicUsize::new(0),
        }
    }

    /// Delay every upsert by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Delay every read (`contains`, `stored_message_ids`) by `latency`.
    pub fn with_read_latency(mut self, latency: Duration) -> Self {
        self.read_latency = Some(latency);
        self
    }

    /// Make the next `count` write calls fail.
    pub async fn fail_next(&self, count: usize, failure: Failure) {
        let mut inner = self.inner.lock().await;
        inner
            .queued_failures
            .extend(std::iter::repeat_n(failure, count));
    }

    /// Make every upsert of `key` fail.
    pub async fn fail_key(&self, key: RecordKey, failure: Failure) {
        self.inner.lock().await.failing_keys.insert(key, failure);
    }

    /// Stop failing writes of `key`.
    pub async fn heal_key(&self, key: &RecordKey) {
        self.inner.lock().await.failing_keys.remove(key);
    }

    /// Number of distinct durable entries.
    pub async fn len(&self) -> usize {
        self.inner.lock().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn get(&self, key: &RecordKey) -> Option<WriteRecord> {
        self.inner.lock().await.entries.get(key).cloned()
    }

    /// Distinct keys of the stored entries.
    pub async fn keys(&self) -> HashSet<RecordKey> {
        self.inner.lock().await.entries.keys().cloned().collect()
    }

    /// Sequence numbers that reached the store for `chat`, in arrival order.
    pub async fn arrivals(&self, chat: &ChatId) -> Vec<u64> {
        self.inner
            .lock()
            .await
            .arrivals
            .get(chat)
            .cloned()
            .unwrap_or_default()
    }

    /// Total single-record upsert calls, failed ones included.
    pub fn upsert_calls(&self) -> usize {
        self.upsert_calls.load(Ordering::SeqCst)
    }

    /// Total batch upsert calls, failed ones included.
    pub fn batch_calls(&self) -> usize {
        self.batch_calls.load(Ordering::SeqCst)
    }

    /// Total read calls.
    pub fn read_calls(&self) -> usize {
        self.read_calls.load(Ordering::SeqCst)
    }

    async fn read_delay(&self) {
        self.read_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(latency) = self.read_latency {
            tokio::time::sleep(latency).await;
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PluginAdapter for MemoryStore {
    fn name(&self) -> &str {
        "memory-store"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Store
    }

    async fn health_check(&self) -> Result<HealthStatus, TweakioError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), TweakioError> {
        Ok(())
    }
}

#[async_trait]
impl DurableStore for MemoryStore {
    async fn initialize(&self) -> Result<(), TweakioError> {
        Ok(())
    }

    async fn upsert(&self, record: &WriteRecord) -> Result<UpsertOutcome, TweakioError> {
        self.upsert_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let mut inner = self.inner.lock().await;
        inner.check(std::slice::from_ref(record))?;
        Ok(inner.apply(record))
    }

    async fn upsert_batch(
        &self,
        records: &[WriteRecord],
    ) -> Result<Vec<UpsertOutcome>, TweakioError> {
        self.batch_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let mut inner = self.inner.lock().await;
        inner.check(records)?;
        Ok(records.iter().map(|r| inner.apply(r)).collect())
    }

    async fn contains(&self, key: &RecordKey) -> Result<bool, TweakioError> {
        self.read_delay().await;
        Ok(self.inner.lock().await.entries.contains_key(key))
    }

    async fn stored_message_ids(&self, chat: &ChatId) -> Result<HashSet<MessageId>, TweakioError> {
        self.read_delay().await;
        let inner = self.inner.lock().await;
        Ok(inner
            .entries
            .keys()
            .filter(|k| &k.chat_id == chat)
            .filter_map(|k| k.message_id.clone())
            .collect())
    }

    async fn close(&self) -> Result<(), TweakioError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tweakio_core::{ChatId, Direction, Message, RecordPayload};

    use super::*;

    fn record(seq: u64, data_id: &str) -> WriteRecord {
        let msg = Message::new(ChatId::from_name("alice"), data_id, "hi", Direction::In);
        WriteRecord::new(seq, RecordPayload::from(msg))
    }

    #[tokio::test]
    async fn second_write_of_a_message_is_a_duplicate() {
        let store = MemoryStore::new();
        assert_eq!(store.upsert(&record(0, "m1")).await.unwrap(), UpsertOutcome::Inserted);
        assert_eq!(store.upsert(&record(1, "m1")).await.unwrap(), UpsertOutcome::Duplicate);
        assert_eq!(store.len().await, 1);
        assert_eq!(store.arrivals(&ChatId::from_name("alice")).await, vec![0, 1]);
    }

    #[tokio::test]
    async fn failing_key_fails_until_healed() {
        let store = MemoryStore::new();
        let rec = record(0, "m1");
        store.fail_key(rec.key(), Failure::Permanent).await;
        assert!(store.upsert(&rec).await.is_err());
        store.heal_key(&rec.key()).await;
        assert!(store.upsert(&rec).await.is_ok());
        assert_eq!(store.upsert_calls(), 2);
    }

    #[tokio::test]
    async fn batch_with_a_failing_key_applies_nothing() {
        let store = MemoryStore::new();
        let bad = record(1, "bad");
        store.fail_key(bad.key(), Failure::Transient).await;

        let batch = [record(0, "ok"), bad.clone(), record(2, "ok2")];
        assert!(store.upsert_batch(&batch).await.is_err());
        assert!(store.is_empty().await);

        store.heal_key(&bad.key()).await;
        let outcomes = store.upsert_batch(&batch).await.unwrap();
        assert_eq!(outcomes, vec![UpsertOutcome::Inserted; 3]);
        assert_eq!(store.batch_calls(), 2);
        assert_eq!(store.arrivals(&ChatId::from_name("alice")).await, vec![0, 1, 2]);

        let ids = store.stored_message_ids(&ChatId::from_name("alice")).await.unwrap();
        assert_eq!(ids.len(), 3);
        assert_eq!(store.read_calls(), 1);
    }
}
