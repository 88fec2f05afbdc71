// SPDX-FileCopyrightText: 2026 Tweakio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Data model shared by the fetch, queue, and storage layers.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Prefix for chat identifiers derived from a display name.
pub const CHAT_KEY_PREFIX: &str = "wa::";

/// Prefix for message identifiers derived from a platform `data_id`.
pub const MESSAGE_KEY_PREFIX: &str = "wa-msg::";

/// Unique identifier for a chat.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChatId(pub String);

impl ChatId {
    /// Derive the identifier from a chat's display name.
    ///
    /// Names are case-folded and trimmed so that the same conversation maps to
    /// the same id across fetch cycles.
    pub fn from_name(name: &str) -> Self {
        Self(format!("{CHAT_KEY_PREFIX}{}", name.trim().to_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Unique identifier for a message within its chat.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MessageId(pub String);

impl MessageId {
    /// Derive the identifier from the platform's `data_id` attribute.
    pub fn from_data_id(data_id: &str) -> Self {
        Self(format!("{MESSAGE_KEY_PREFIX}{data_id}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque reference to the collaborator's UI element for a chat.
///
/// The core never interprets it; it is handed back to the scraping source
/// when that chat's messages are requested.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ChatHandle(pub String);

/// Snapshot of one conversation taken during enumeration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chat {
    pub id: ChatId,
    pub name: String,
    pub unread_count: u32,
    pub last_activity: Option<DateTime<Utc>>,
    pub handle: ChatHandle,
    /// When the snapshot was taken.
    pub observed_at: DateTime<Utc>,
}

impl Chat {
    pub fn new(name: impl Into<String>, handle: ChatHandle) -> Self {
        let name = name.into();
        Self {
            id: ChatId::from_name(&name),
            name,
            unread_count: 0,
            last_activity: None,
            handle,
            observed_at: Utc::now(),
        }
    }

    pub fn with_unread(mut self, unread_count: u32) -> Self {
        self.unread_count = unread_count;
        self
    }

    pub fn with_last_activity(mut self, at: DateTime<Utc>) -> Self {
        self.last_activity = Some(at);
        self
    }

    pub fn is_unread(&self) -> bool {
        self.unread_count > 0
    }
}

/// Which side of the conversation produced a message.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    In,
    Out,
}

/// Delivery/read status as shown by the platform's tick marks.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Pending,
    Sent,
    Delivered,
    Read,
    #[default]
    Unknown,
}

/// Who sent a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SenderInfo {
    pub direction: Direction,
    /// Display name, when the platform shows one (group chats).
    pub name: Option<String>,
}

/// One scraped message. Append-only: never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    /// Platform-unique id within the chat.
    pub data_id: String,
    /// Back-reference to the owning chat.
    pub chat_id: ChatId,
    pub text: String,
    pub sender: SenderInfo,
    pub timestamp: DateTime<Utc>,
    pub status: DeliveryStatus,
    /// Payload classification (text, image, video, quoted...), if known.
    pub data_type: Option<String>,
}

impl Message {
    pub fn new(
        chat_id: ChatId,
        data_id: impl Into<String>,
        text: impl Into<String>,
        direction: Direction,
    ) -> Self {
        let data_id = data_id.into();
        Self {
            id: MessageId::from_data_id(&data_id),
            data_id,
            chat_id,
            text: text.into(),
            sender: SenderInfo {
                direction,
                name: None,
            },
            timestamp: Utc::now(),
            status: DeliveryStatus::Unknown,
            data_type: None,
        }
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_sender_name(mut self, name: impl Into<String>) -> Self {
        self.sender.name = Some(name.into());
        self
    }

    pub fn with_status(mut self, status: DeliveryStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_data_type(mut self, data_type: impl Into<String>) -> Self {
        self.data_type = Some(data_type.into());
        self
    }

    pub fn is_incoming(&self) -> bool {
        self.sender.direction == Direction::In
    }
}

/// Idempotency key of a durable entry: (chat-id, message-id).
///
/// Chat metadata records have no message component.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordKey {
    pub chat_id: ChatId,
    pub message_id: Option<MessageId>,
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message_id {
            Some(m) => write!(f, "{}/{}", self.chat_id, m),
            None => write!(f, "{}/chat", self.chat_id),
        }
    }
}

/// What a write record carries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum RecordPayload {
    Chat(Chat),
    Message(Message),
}

impl RecordPayload {
    pub fn chat_id(&self) -> &ChatId {
        match self {
            Self::Chat(c) => &c.id,
            Self::Message(m) => &m.chat_id,
        }
    }

    pub fn key(&self) -> RecordKey {
        match self {
            Self::Chat(c) => RecordKey {
                chat_id: c.id.clone(),
                message_id: None,
            },
            Self::Message(m) => RecordKey {
                chat_id: m.chat_id.clone(),
                message_id: Some(m.id.clone()),
            },
        }
    }
}

impl From<Chat> for RecordPayload {
    fn from(chat: Chat) -> Self {
        Self::Chat(chat)
    }
}

impl From<Message> for RecordPayload {
    fn from(message: Message) -> Self {
        Self::Message(message)
    }
}

/// Envelope around a payload destined for durable storage.
///
/// The sequence number is assigned by the persistence queue at enqueue time
/// and increases monotonically within one chat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WriteRecord {
    pub seq: u64,
    pub enqueued_at: DateTime<Utc>,
    pub payload: RecordPayload,
}

impl WriteRecord {
    pub fn new(seq: u64, payload: RecordPayload) -> Self {
        Self {
            seq,
            enqueued_at: Utc::now(),
            payload,
        }
    }

    pub fn key(&self) -> RecordKey {
        self.payload.key()
    }

    pub fn chat_id(&self) -> &ChatId {
        self.payload.chat_id()
    }
}

/// Result of an idempotent upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
pub enum UpsertOutcome {
    /// A new durable entry was created (or chat metadata refreshed).
    Inserted,
    /// The key was already present; nothing new was written.
    Duplicate,
}

/// Health status reported by collaborator health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Fully operational.
    Healthy,
    /// Operational but experiencing issues.
    Degraded(String),
    /// Not operational.
    Unhealthy(String),
}

/// Identifies the kind of collaborator behind a [`crate::PluginAdapter`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Source,
    Store,
}
