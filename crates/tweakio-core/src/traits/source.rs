// SPDX-FileCopyrightText: 2026 Tweakio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scraping collaborator traits.
//!
//! The browser-automation layer sits behind these two traits. Both are
//! index-addressed so a fetcher can restart from the top of the list or
//! resume from an explicit cursor without the source keeping any traversal
//! state of its own.

use async_trait::async_trait;

use crate::error::TweakioError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{Chat, Message};

/// Enumerates conversations in the order the platform currently lists them.
#[async_trait]
pub trait ChatSource: PluginAdapter {
    /// Returns the chat at `index` in the current list, or `None` past the end.
    ///
    /// Errors that may clear on retry (page still loading, element detached)
    /// must be reported as [`TweakioError::TransientIo`].
    async fn chat_at(&self, index: usize) -> Result<Option<Chat>, TweakioError>;
}

/// Reads the messages of one conversation, oldest first.
#[async_trait]
pub trait MessageSource: PluginAdapter {
    /// Returns the message at `index` within `chat`, or `None` past the end.
    async fn message_at(&self, chat: &Chat, index: usize)
    -> Result<Option<Message>, TweakioError>;
}
