// SPDX-FileCopyrightText: 2026 Tweakio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Row types returned by the read queries.
//!
//! Chats and messages themselves are the `tweakio-core` types; a stored
//! message additionally carries the bookkeeping written alongside it.

use serde::Serialize;
use tweakio_core::Message;

/// A persisted message plus its write-behind metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredMessage {
    /// Store-assigned row id; increases in persistence order.
    pub row_id: i64,
    #[serde(flatten)]
    pub message: Message,
    /// Per-chat sequence number assigned at enqueue time.
    pub seq: u64,
    pub enqueued_at: String,
    pub persisted_at: String,
}
