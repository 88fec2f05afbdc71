// SPDX-FileCopyrightText: 2026 Tweakio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Durable store trait for persistence backends (SQLite, in-memory fakes).

use std::collections::HashSet;

use async_trait::async_trait;

use crate::error::TweakioError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{ChatId, MessageId, RecordKey, UpsertOutcome, WriteRecord};

/// Minimal contract the persistence queue needs from a backend.
///
/// Upserts must be idempotent on [`RecordKey`] so that at-least-once retries
/// never produce a second durable entry.
#[async_trait]
pub trait DurableStore: PluginAdapter {
    /// Initializes the backend (migrations, connection, etc.).
    async fn initialize(&self) -> Result<(), TweakioError>;

    /// Writes `record` unless an entry with the same key already exists.
    async fn upsert(&self, record: &WriteRecord) -> Result<UpsertOutcome, TweakioError>;

    /// Writes `records` atomically, returning one outcome per record in order.
    ///
    /// On error nothing from the batch is durable.
    async fn upsert_batch(
        &self,
        records: &[WriteRecord],
    ) -> Result<Vec<UpsertOutcome>, TweakioError>;

    /// Whether an entry with `key` is durably present.
    async fn contains(&self, key: &RecordKey) -> Result<bool, TweakioError>;

    /// Identifiers of every message of `chat` that is durably present.
    async fn stored_message_ids(&self, chat: &ChatId) -> Result<HashSet<MessageId>, TweakioError>;

    /// Flushes pending writes and releases connections.
    async fn close(&self) -> Result<(), TweakioError>;
}
