// SPDX-FileCopyrightText: 2026 Tweakio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scripted scraping source for deterministic testing.
//!
//! `MockSource` implements `ChatSource` and `MessageSource` over fixed lists
//! of chats and messages. Failures can be queued for upcoming calls or pinned
//! to a chat index, and every call is counted for assertions.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use tweakio_core::{
    AdapterType, Chat, ChatHandle, ChatId, ChatSource, Direction, HealthStatus, Message,
    MessageSource, PluginAdapter, TweakioError,
};

/// Kind of injected failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    /// Reported as `TransientIo`; callers may retry.
    Transient,
    /// Reported as a non-retryable source error.
    Permanent,
}

impl Failure {
    pub fn to_error(self, what: &str) -> TweakioError {
        match self {
            Self::Transient => TweakioError::transient(format!("injected transient failure: {what}")),
            Self::Permanent => {
                TweakioError::source_failure(format!("injected permanent failure: {what}"))
            }
        }
    }
}

/// A mock scraping collaborator.
pub struct MockSource {
    chats: Vec<Chat>,
    messages: HashMap<ChatId, Vec<Message>>,
    queued_failures: Mutex<VecDeque<Failure>>,
    failing_chat_index: Mutex<Option<(usize, Failure)>>,
    latency: Option<Duration>,
    chat_calls: AtomicUsize,
    message_calls: AtomicUsize,
}

impl MockSource {
    /// Create an empty source.
    pub fn new() -> Self {
        Self {
            chats: Vec::new(),
            messages: HashMap::new(),
            queued_failures: Mutex::new(VecDeque::new()),
            failing_chat_index: Mutex::new(None),
            latency: None,
            chat_calls: AtomicUsize::new(0),
            message_calls: AtomicUsize::new(0),
        }
    }

    /// Source with `chats` chats named `Chat 0..n`, each holding
    /// `messages_per_chat` messages alternating incoming/outgoing.
    pub fn with_generated(chats: usize, messages_per_chat: usize) -> Self {
        let mut source = Self::new();
        for c in 0..chats {
            let chat = Chat::new(format!("Chat {c}"), ChatHandle(format!("row-{c}")));
            let messages = (0..messages_per_chat)
                .map(|m| {
                    let direction = if m % 2 == 0 { Direction::In } else { Direction::Out };
                    Message::new(
                        chat.id.clone(),
                        format!("c{c}-m{m}"),
                        format!("message {m} in chat {c}"),
                        direction,
                    )
                })
                .collect();
            source = source.with_chat(chat, messages);
        }
        source
    }

    /// Append a chat and its messages.
    pub fn with_chat(mut self, chat: Chat, messages: Vec<Message>) -> Self {
        self.messages.insert(chat.id.clone(), messages);
        self.chats.push(chat);
        self
    }

    /// Delay every call by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Make the next `count` calls (chat or message) fail.
    pub fn fail_next(&self, count: usize, failure: Failure) {
        let mut queued = lock(&self.queued_failures);
        queued.extend(std::iter::repeat_n(failure, count));
    }

    /// Make every request for the chat at `index` fail.
    pub fn fail_chat_at(&self, index: usize, failure: Failure) {
        *lock(&self.failing_chat_index) = Some((index, failure));
    }

    pub fn chats(&self) -> &[Chat] {
        &self.chats
    }

    pub fn messages_of(&self, chat_id: &ChatId) -> &[Message] {
        self.messages.get(chat_id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Total messages across all chats.
    pub fn message_total(&self) -> usize {
        self.messages.values().map(Vec::len).sum()
    }

    pub fn chat_calls(&self) -> usize {
        self.chat_calls.load(Ordering::SeqCst)
    }

    pub fn message_calls(&self) -> usize {
        self.message_calls.load(Ordering::SeqCst)
    }

    async fn before_call(&self, what: &str) -> Result<(), TweakioError> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        match lock(&self.queued_failures).pop_front() {
            Some(failure) => Err(failure.to_error(what)),
            None => Ok(()),
        }
    }
}

impl Default for MockSource {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl PluginAdapter for MockSource {
    fn name(&self) -> &str {
        "mock-source"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Source
    }

    async fn health_check(&self) -> Result<HealthStatus, TweakioError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), TweakioError> {
        Ok(())
    }
}

#[async_trait]
impl ChatSource for MockSource {
    async fn chat_at(&self, index: usize) -> Result<Option<Chat>, TweakioError> {
        self.chat_calls.fetch_add(1, Ordering::SeqCst);
        self.before_call("chat_at").await?;
        let pinned = *lock(&self.failing_chat_index);
        if let Some((failing, failure)) = pinned
            && failing == index
        {
            return Err(failure.to_error("chat_at"));
        }
        Ok(self.chats.get(index).cloned())
    }
}

#[async_trait]
impl MessageSource for MockSource {
    async fn message_at(
        &self,
        chat: &Chat,
        index: usize,
    ) -> Result<Option<Message>, TweakioError> {
        self.message_calls.fetch_add(1, Ordering::SeqCst);
        self.before_call("message_at").await?;
        Ok(self
            .messages
            .get(&chat.id)
            .and_then(|msgs| msgs.get(index))
            .cloned())
    }
}
