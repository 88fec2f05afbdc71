// SPDX-FileCopyrightText: 2026 Tweakio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The coordinator: fetchers in, persistence queue out.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use tweakio_config::model::{FetchConfig, TweakioConfig};
use tweakio_core::{
    Chat, ChatId, ChatSource, DurableStore, MessageId, MessageSource, RecordPayload, TweakioError,
};
use tweakio_fetch::{ChatFetcher, MessageFetcher, Step};
use tweakio_queue::{PersistenceQueue, ShutdownReport};
use tweakio_ratelimit::RateLimiter;

use crate::summary::{Operation, RunSummary, Termination};

/// Running counts for one run.
#[derive(Debug, Default)]
struct Tally {
    processed: usize,
    chats: usize,
    messages: usize,
    skipped: usize,
}

/// Drives chat and message fetchers into the persistence queue.
///
/// One coordinator runs one fetch flow at a time; the queue's workers write
/// concurrently in the background. A cancelled run shuts the queue down, so
/// the coordinator cannot be reused after cancellation.
pub struct Coordinator {
    chats: Arc<dyn ChatSource>,
    messages: Arc<dyn MessageSource>,
    store: Arc<dyn DurableStore>,
    limiter: Arc<RateLimiter>,
    queue: Arc<PersistenceQueue>,
    fetch: FetchConfig,
    drain_deadline: Duration,
    cancel: CancellationToken,
}

impl Coordinator {
    /// Wire a scraping source, the store behind the queue, the limiter and the queue.
    ///
    /// `store` is only read, once per chat, for already-persisted checks; all
    /// writes go through `queue`.
    pub fn new<S>(
        source: Arc<S>,
        store: Arc<dyn DurableStore>,
        limiter: Arc<RateLimiter>,
        queue: Arc<PersistenceQueue>,
        config: &TweakioConfig,
    ) -> Self
    where
        S: ChatSource + MessageSource,
    {
        Self {
            chats: source.clone(),
            messages: source,
            store,
            limiter,
            queue,
            fetch: config.fetch.clone(),
            drain_deadline: config.queue.drain_deadline(),
            cancel: CancellationToken::new(),
        }
    }

    /// Stop at the next suspend point once `cancel` fires.
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn queue(&self) -> &Arc<PersistenceQueue> {
        &self.queue
    }

    /// Enumerate up to `max_chats` chats and persist their metadata.
    pub async fn collect_chats(&self, max_chats: usize) -> Result<RunSummary, TweakioError> {
        let run = Run::begin(self, Operation::CollectChats, Some(max_chats));
        let mut tally = Tally::default();
        let (termination, _) = self.enumerate_chats(max_chats, &mut tally).await?;
        self.finish(run, tally, termination).await
    }

    /// Fetch one chat's messages and persist them.
    pub async fn collect_messages(&self, chat: Chat) -> Result<RunSummary, TweakioError> {
        let requested = (self.fetch.max_messages > 0).then_some(self.fetch.max_messages);
        let run = Run::begin(self, Operation::CollectMessages, requested);
        let mut tally = Tally::default();
        let termination = self.drain_messages(chat, &mut tally, true).await?;
        self.finish(run, tally, termination).await
    }

    /// Enumerate up to `max_chats` chats, then fetch the messages of each in
    /// enumeration order. Stops at the first abnormal end.
    pub async fn sync(&self, max_chats: usize) -> Result<RunSummary, TweakioError> {
        let run = Run::begin(self, Operation::Sync, Some(max_chats));
        let mut tally = Tally::default();

        let (mut termination, chats) = self.enumerate_chats(max_chats, &mut tally).await?;
        if termination.is_normal() {
            for chat in chats {
                let end = self.drain_messages(chat, &mut tally, false).await?;
                if !end.is_normal() {
                    termination = end;
                    break;
                }
            }
        }
        self.finish(run, tally, termination).await
    }

    async fn enumerate_chats(
        &self,
        max_chats: usize,
        tally: &mut Tally,
    ) -> Result<(Termination, Vec<Chat>), TweakioError> {
        let mut fetcher = ChatFetcher::new(
            Arc::clone(&self.chats),
            Arc::clone(&self.limiter),
            &self.fetch,
            max_chats,
        )
        .with_cancel(self.cancel.clone());

        let mut seen = Vec::new();
        loop {
            match fetcher.next().await {
                Step::Item((chat, name)) => {
                    tally.processed += 1;
                    debug!(chat = %chat.id, name = name.as_str(), "chat enumerated");
                    if let Some(closed) = self.enqueue(chat.clone()).await? {
                        return Ok((closed, seen));
                    }
                    tally.chats += 1;
                    seen.push(chat);
                }
                Step::End(end) => return Ok((end.into(), seen)),
            }
        }
    }

    /// Fetch and enqueue one chat's messages. `drives` marks messages as the
    /// run's driving unit.
    async fn drain_messages(
        &self,
        chat: Chat,
        tally: &mut Tally,
        drives: bool,
    ) -> Result<Termination, TweakioError> {
        let chat_id = chat.id.clone();
        let stored = self.stored_ids(&chat_id).await;
        let mut fetcher = MessageFetcher::new(
            Arc::clone(&self.messages),
            Arc::clone(&self.limiter),
            &self.fetch,
            chat,
        )
        .with_cancel(self.cancel.clone());

        loop {
            match fetcher.next().await {
                Step::Item(message) => {
                    if drives {
                        tally.processed += 1;
                    }
                    if stored.contains(&message.id) {
                        tally.skipped += 1;
                        continue;
                    }
                    if let Some(closed) = self.enqueue(message).await? {
                        return Ok(closed);
                    }
                    tally.messages += 1;
                }
                Step::End(end) => {
                    debug!(chat = %chat_id, yielded = fetcher.yielded(), ?end, "chat messages done");
                    return Ok(end.into());
                }
            }
        }
    }

    /// Ids of `chat`'s messages already durable, read once before fetching.
    async fn stored_ids(&self, chat: &ChatId) -> HashSet<MessageId> {
        if !self.fetch.skip_persisted {
            return HashSet::new();
        }
        match self.store.stored_message_ids(chat).await {
            Ok(ids) => ids,
            Err(e) => {
                // Writes are idempotent on key.
                warn!(chat = %chat, error = %e, "persisted check failed, enqueueing everything");
                HashSet::new()
            }
        }
    }

    /// `Ok(Some(_))` ends the run: the queue closed, or cancellation fired
    /// while waiting for queue capacity. Other queue errors propagate.
    async fn enqueue(
        &self,
        payload: impl Into<RecordPayload>,
    ) -> Result<Option<Termination>, TweakioError> {
        let result = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Ok(Some(Termination::Cancelled)),
            result = self.queue.enqueue(payload) => result,
        };
        match result {
            Ok(_) => Ok(None),
            Err(TweakioError::QueueClosed) => {
                warn!("persistence queue closed, stopping run");
                Ok(Some(Termination::QueueClosed))
            }
            Err(e) => Err(e),
        }
    }

    async fn finish(
        &self,
        run: Run,
        tally: Tally,
        termination: Termination,
    ) -> Result<RunSummary, TweakioError> {
        let (termination, shutdown) = if termination == Termination::Cancelled {
            (termination, Some(self.drain().await?))
        } else {
            tokio::select! {
                flushed = self.queue.flush() => {
                    flushed?;
                    (termination, None)
                }
                _ = self.cancel.cancelled() => {
                    warn!(%termination, "cancelled while flushing");
                    (Termination::Cancelled, Some(self.drain().await?))
                }
            }
        };

        let summary = RunSummary {
            operation: run.operation,
            requested: run.requested,
            processed: tally.processed,
            chats: tally.chats,
            messages: tally.messages,
            skipped: tally.skipped,
            dead_lettered: self
                .queue
                .stats()
                .dead_lettered
                .saturating_sub(run.dead_before),
            termination,
            shutdown,
            elapsed: run.started.elapsed(),
        };

        if summary.termination.is_normal() {
            info!(summary = %summary, "run finished");
        } else {
            warn!(summary = %summary, "run ended early");
        }
        Ok(summary)
    }

    async fn drain(&self) -> Result<ShutdownReport, TweakioError> {
        info!(
            deadline_ms = self.drain_deadline.as_millis() as u64,
            "run cancelled, draining persistence queue"
        );
        self.queue.shutdown(self.drain_deadline).await
    }
}

/// Bookkeeping captured when a run starts.
struct Run {
    operation: Operation,
    requested: Option<usize>,
    started: Instant,
    dead_before: u64,
}

impl Run {
    fn begin(coordinator: &Coordinator, operation: Operation, requested: Option<usize>) -> Self {
        info!(%operation, requested, "run started");
        Self {
            operation,
            requested,
            started: Instant::now(),
            dead_before: coordinator.queue.stats().dead_lettered,
        }
    }
}
