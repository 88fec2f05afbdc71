// SPDX-FileCopyrightText: 2026 Tweakio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Chat list enumeration.

use std::sync::Arc;

use async_trait::async_trait;
use tweakio_config::model::FetchConfig;
use tweakio_core::{Chat, ChatSource, TweakioError};
use tweakio_ratelimit::RateLimiter;

use crate::iterator::{FetchIterator, FetchOptions, Puller};

/// Pulls chats top-down from a [`ChatSource`].
pub struct ChatPuller {
    source: Arc<dyn ChatSource>,
    key: String,
}

impl ChatPuller {
    pub fn new(source: Arc<dyn ChatSource>, key: impl Into<String>) -> Self {
        Self {
            source,
            key: key.into(),
        }
    }
}

#[async_trait]
impl Puller for ChatPuller {
    type Item = (Chat, String);

    async fn pull(&self, index: usize) -> Result<Option<(Chat, String)>, TweakioError> {
        Ok(self.source.chat_at(index).await?.map(|chat| {
            let name = chat.name.clone();
            (chat, name)
        }))
    }

    fn limiter_key(&self) -> &str {
        &self.key
    }
}

/// Lazy `(Chat, name)` sequence capped at `max_chats`.
pub type ChatFetcher = FetchIterator<ChatPuller>;

impl ChatFetcher {
    /// Enumerate at most `max_chats` chats from the top of the list.
    ///
    /// The limiter is consulted on `config.chat_key` before every pull.
    pub fn new(
        source: Arc<dyn ChatSource>,
        limiter: Arc<RateLimiter>,
        config: &FetchConfig,
        max_chats: usize,
    ) -> Self {
        let key = limiter.scoped_key(&config.chat_key, None);
        Self::from_puller(
            ChatPuller::new(source, key),
            limiter,
            FetchOptions::from_config(config).with_max(max_chats),
        )
    }
}
