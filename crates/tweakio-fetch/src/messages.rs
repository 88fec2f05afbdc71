// SPDX-FileCopyrightText: 2026 Tweakio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-chat message fetching.

use std::sync::Arc;

use async_trait::async_trait;
use tweakio_config::model::FetchConfig;
use tweakio_core::{Chat, Message, MessageSource, TweakioError};
use tweakio_ratelimit::RateLimiter;

use crate::filter::MessageFilter;
use crate::iterator::{FetchIterator, FetchOptions, Puller};

/// Pulls one chat's messages in display order.
pub struct MessagePuller {
    source: Arc<dyn MessageSource>,
    chat: Chat,
    key: String,
    filter: MessageFilter,
}

impl MessagePuller {
    pub fn new(source: Arc<dyn MessageSource>, chat: Chat, key: impl Into<String>) -> Self {
        Self {
            source,
            chat,
            key: key.into(),
            filter: MessageFilter::default(),
        }
    }

    pub fn with_filter(mut self, filter: MessageFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn chat(&self) -> &Chat {
        &self.chat
    }
}

#[async_trait]
impl Puller for MessagePuller {
    type Item = Message;

    async fn pull(&self, index: usize) -> Result<Option<Message>, TweakioError> {
        self.source.message_at(&self.chat, index).await
    }

    fn limiter_key(&self) -> &str {
        &self.key
    }

    fn accept(&self, item: &Message) -> bool {
        self.filter.matches(item)
    }
}

/// Ordered message sequence for one chat.
pub type MessageFetcher = FetchIterator<MessagePuller>;

impl MessageFetcher {
    /// Fetch `chat`'s messages, honoring `max_messages` (0 = no cap) and the
    /// configured direction filter.
    ///
    /// The limiter key is `config.message_key`, scoped to the chat when the
    /// limiter runs per chat.
    pub fn new(
        source: Arc<dyn MessageSource>,
        limiter: Arc<RateLimiter>,
        config: &FetchConfig,
        chat: Chat,
    ) -> Self {
        let key = limiter.scoped_key(&config.message_key, Some(&chat.id));
        let mut options = FetchOptions::from_config(config);
        if config.max_messages > 0 {
            options = options.with_max(config.max_messages);
        }
        let puller = MessagePuller::new(source, chat, key)
            .with_filter(MessageFilter::new(config.direction));
        Self::from_puller(puller, limiter, options)
    }

    pub fn chat(&self) -> &Chat {
        self.puller().chat()
    }
}
