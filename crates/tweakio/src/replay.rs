// SPDX-FileCopyrightText: 2026 Tweakio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scraping source backed by a captured JSONL dump.
//!
//! Each non-empty line is one object tagged by `type`:
//!
//! ```text
//! {"type":"chat","name":"Alice","unread":2,"handle":"row-0"}
//! {"type":"message","chat":"Alice","data_id":"false_1@c.us_A1","text":"hi","direction":"in"}
//! ```
//!
//! Lines starting with `#` are comments. Messages may name a chat that has
//! no `chat` line; it is created at the position of its first message.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tweakio_core::{
    AdapterType, Chat, ChatHandle, ChatId, ChatSource, DeliveryStatus, Direction, HealthStatus,
    Message, MessageSource, PluginAdapter, TweakioError,
};

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum CaptureLine {
    Chat {
        name: String,
        #[serde(default)]
        unread: u32,
        last_activity: Option<DateTime<Utc>>,
        handle: Option<String>,
    },
    Message {
        chat: String,
        data_id: String,
        #[serde(default)]
        text: String,
        direction: Direction,
        sender: Option<String>,
        timestamp: Option<DateTime<Utc>>,
        #[serde(default)]
        status: DeliveryStatus,
        data_type: Option<String>,
    },
}

/// Replays a capture file as if it were a live chat list.
#[derive(Debug, Default)]
pub struct ReplaySource {
    chats: Vec<Chat>,
    messages: HashMap<ChatId, Vec<Message>>,
}

impl ReplaySource {
    pub async fn load(path: &Path) -> Result<Self, TweakioError> {
        let content = tokio::fs::read_to_string(path).await.map_err(|e| TweakioError::Source {
            message: format!("cannot read capture {}", path.display()),
            source: Some(Box::new(e)),
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, TweakioError> {
        let mut source = Self::default();
        for (idx, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let parsed: CaptureLine =
                serde_json::from_str(line).map_err(|e| TweakioError::Source {
                    message: format!("capture line {}: {e}", idx + 1),
                    source: Some(Box::new(e)),
                })?;
            source.push(parsed);
        }
        Ok(source)
    }

    fn push(&mut self, line: CaptureLine) {
        match line {
            CaptureLine::Chat {
                name,
                unread,
                last_activity,
                handle,
            } => {
                let handle = ChatHandle(handle.unwrap_or_else(|| format!("row-{}", self.chats.len())));
                let mut chat = Chat::new(name, handle).with_unread(unread);
                chat.last_activity = last_activity;
                // A repeated chat line refreshes the snapshot in place.
                match self.chats.iter_mut().find(|c| c.id == chat.id) {
                    Some(existing) => *existing = chat,
                    None => self.chats.push(chat),
                }
            }
            CaptureLine::Message {
                chat,
                data_id,
                text,
                direction,
                sender,
                timestamp,
                status,
                data_type,
            } => {
                let chat_id = self.ensure_chat(&chat);
                let mut message = Message::new(chat_id.clone(), data_id, text, direction)
                    .with_status(status);
                if let Some(sender) = sender {
                    message = message.with_sender_name(sender);
                }
                if let Some(ts) = timestamp {
                    message = message.with_timestamp(ts);
                }
                if let Some(kind) = data_type {
                    message = message.with_data_type(kind);
                }
                self.messages.entry(chat_id).or_default().push(message);
            }
        }
    }

    fn ensure_chat(&mut self, name: &str) -> ChatId {
        let id = ChatId::from_name(name);
        if !self.chats.iter().any(|c| c.id == id) {
            let handle = ChatHandle(format!("row-{}", self.chats.len()));
            self.chats.push(Chat::new(name, handle));
        }
        id
    }

    pub fn chat_count(&self) -> usize {
        self.chats.len()
    }

    pub fn message_count(&self) -> usize {
        self.messages.values().map(Vec::len).sum()
    }
}

#[async_trait]
impl PluginAdapter for ReplaySource {
    fn name(&self) -> &str {
        "replay"
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
impl ChatSource for ReplaySource {
    async fn chat_at(&self, index: usize) -> Result<Option<Chat>, TweakioError> {
        Ok(self.chats.get(index).cloned())
    }
}

#[async_trait]
impl MessageSource for ReplaySource {
    async fn message_at(
        &self,
        chat: &Chat,
        index: usize,
    ) -> Result<Option<Message>, TweakioError> {
        Ok(self
            .messages
            .get(&chat.id)
            .and_then(|msgs| msgs.get(index))
            .cloned())
    }
}
