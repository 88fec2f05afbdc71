// SPDX-FileCopyrightText: 2026 Tweakio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end pipeline testing.
//!
//! `TestHarness` assembles a mock source, an in-memory store, a rate limiter,
//! a running persistence queue and a coordinator over them. Defaults are
//! permissive (no throttling, millisecond backoffs) so tests only configure
//! what they exercise.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tweakio_config::model::TweakioConfig;
use tweakio_core::{Chat, Message, TweakioError};
use tweakio_pipeline::Coordinator;
use tweakio_queue::{PersistenceObserver, PersistenceQueue, ShutdownReport};
use tweakio_ratelimit::{RateLimiter, RatePolicy};

use crate::memory_store::MemoryStore;
use crate::mock_source::MockSource;
use crate::observer::RecordingObserver;

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    source: MockSource,
    store: MemoryStore,
    config: TweakioConfig,
    policy: Option<RatePolicy>,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        let mut config = TweakioConfig::default();
        config.rate_limit.limit = 10_000;
        config.rate_limit.period = 1;
        config.rate_limit.max_delay = 1;
        config.queue.backoff_base = 1;
        config.queue.backoff_max = 10;
        config.fetch.retry_backoff = 1;
        Self {
            source: MockSource::new(),
            store: MemoryStore::new(),
            config,
            policy: None,
        }
    }

    /// Generate `chats` chats with `messages_per_chat` messages each.
    pub fn with_generated(mut self, chats: usize, messages_per_chat: usize) -> Self {
        self.source = MockSource::with_generated(chats, messages_per_chat);
        self
    }

    /// Add one scripted chat.
    pub fn with_chat(mut self, chat: Chat, messages: Vec<Message>) -> Self {
        self.source = self.source.with_chat(chat, messages);
        self
    }

    /// Replace the source entirely.
    pub fn with_source(mut self, source: MockSource) -> Self {
        self.source = source;
        self
    }

    pub fn with_store(mut self, store: MemoryStore) -> Self {
        self.store = store;
        self
    }

    /// Adjust the configuration the harness was seeded with.
    pub fn with_config(mut self, adjust: impl FnOnce(&mut TweakioConfig)) -> Self {
        adjust(&mut self.config);
        self
    }

    /// Use `policy` for every limiter key instead of the configured one.
    pub fn with_rate_policy(mut self, policy: RatePolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    /// Build the harness. Must be called from within a tokio runtime.
    pub async fn build(self) -> Result<TestHarness, TweakioError> {
        let source = Arc::new(self.source);
        let store = Arc::new(self.store);
        let observer = Arc::new(RecordingObserver::new());

        let limiter = match self.policy {
            Some(policy) => RateLimiter::new(policy).with_scope(self.config.rate_limit.scope),
            None => RateLimiter::from_config(&self.config.rate_limit),
        };
        let limiter = Arc::new(limiter);

        let queue = Arc::new(PersistenceQueue::start_with_observer(
            &self.config.queue,
            store.clone(),
            observer.clone() as Arc<dyn PersistenceObserver>,
        ));

        let cancel = CancellationToken::new();
        let coordinator = Coordinator::new(
            source.clone(),
            store.clone(),
            limiter.clone(),
            queue.clone(),
            &self.config,
        )
        .with_cancel(cancel.clone());

        Ok(TestHarness {
            source,
            store,
            observer,
            limiter,
            queue,
            coordinator,
            cancel,
            config: self.config,
        })
    }
}

/// A fully wired pipeline over mock collaborators.
pub struct TestHarness {
    pub source: Arc<MockSource>,
    pub store: Arc<MemoryStore>,
    pub observer: Arc<RecordingObserver>,
    pub limiter: Arc<RateLimiter>,
    pub queue: Arc<PersistenceQueue>,
    pub coordinator: Coordinator,
    pub cancel: CancellationToken,
    pub config: TweakioConfig,
}

impl TestHarness {
    /// Create a new builder for configuring the test environment.
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Drain the queue with a generous deadline.
    pub async fn shutdown(&self) -> Result<ShutdownReport, TweakioError> {
        self.queue.shutdown(Duration::from_secs(30)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn harness_syncs_generated_chats() {
        let harness = TestHarness::builder()
            .with_generated(2, 3)
            .build()
            .await
            .unwrap();

        let summary = harness.coordinator.sync(10).await.unwrap();
        assert_eq!(summary.chats, 2);
        assert_eq!(summary.messages, 6);
        assert_eq!(harness.store.len().await, 8);
        harness.shutdown().await.unwrap();
    }
}
