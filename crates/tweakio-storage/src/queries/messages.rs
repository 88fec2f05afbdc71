// SPDX-FileCopyrightText: 2026 Tweakio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Captured message operations.

use chrono::Utc;
use std::collections::HashSet;

use rusqlite::{params, Connection, Row};
use tweakio_core::{
    ChatId, DeliveryStatus, Direction, Message, MessageId, SenderInfo, TweakioError,
    UpsertOutcome,
};

use crate::database::{map_tr_err, Database};
use crate::models::StoredMessage;
use crate::queries::{enum_from_sql, ts_from_sql, ts_to_sql};

const MESSAGE_COLUMNS: &str = "id, chat_id, message_id, data_id, text, direction, sender_name, \
     status, data_type, timestamp, seq, enqueued_at, persisted_at";

/// Insert a message unless one with the same (chat_id, message_id) exists.
pub async fn insert_message(
    db: &Database,
    msg: &Message,
    seq: u64,
    enqueued_at: &str,
) -> Result<UpsertOutcome, TweakioError> {
    let msg = msg.clone();
    let enqueued_at = enqueued_at.to_string();
    let persisted_at = ts_to_sql(&Utc::now());
    db.connection()
        .call(move |conn| insert_message_row(conn, &msg, seq, &enqueued_at, &persisted_at))
        .await
        .map_err(map_tr_err)
}

/// Statement behind [`insert_message`], usable inside a transaction.
pub(crate) fn insert_message_row(
    conn: &Connection,
    msg: &Message,
    seq: u64,
    enqueued_at: &str,
    persisted_at: &str,
) -> Result<UpsertOutcome, rusqlite::Error> {
    let changed = conn.execute(
        "INSERT INTO messages (chat_id, message_id, data_id, text, direction, sender_name,
                               status, data_type, timestamp, seq, enqueued_at, persisted_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
         ON CONFLICT(chat_id, message_id) DO NOTHING",
        params![
            msg.chat_id.as_str(),
            msg.id.as_str(),
            msg.data_id,
            msg.text,
            msg.sender.direction.to_string(),
            msg.sender.name,
            msg.status.to_string(),
            msg.data_type,
            ts_to_sql(&msg.timestamp),
            seq as i64,
            enqueued_at,
            persisted_at,
        ],
    )?;
    Ok(if changed == 0 {
        UpsertOutcome::Duplicate
    } else {
        UpsertOutcome::Inserted
    })
}

/// Whether `message_id` is stored, optionally restricted to one chat.
pub async fn message_exists(
    db: &Database,
    chat_id: Option<&ChatId>,
    message_id: &MessageId,
) -> Result<bool, TweakioError> {
    let chat_id = chat_id.map(|c| c.as_str().to_string());
    let message_id = message_id.as_str().to_string();
    db.connection()
        .call(move |conn| -> Result<bool, rusqlite::Error> {
            let found: i64 = match chat_id {
                Some(chat_id) => conn.query_row(
                    "SELECT EXISTS(SELECT 1 FROM messages WHERE chat_id = ?1 AND message_id = ?2)",
                    params![chat_id, message_id],
                    |row| row.get(0),
                )?,
                None => conn.query_row(
                    "SELECT EXISTS(SELECT 1 FROM messages WHERE message_id = ?1)",
                    params![message_id],
                    |row| row.get(0),
                )?,
            };
            Ok(found != 0)
        })
        .await
        .map_err(map_tr_err)
}

/// Identifiers of every stored message of one chat.
pub async fn message_ids_for_chat(
    db: &Database,
    chat_id: &ChatId,
) -> Result<HashSet<MessageId>, TweakioError> {
    let chat_id = chat_id.as_str().to_string();
    db.connection()
        .call(move |conn| -> Result<HashSet<MessageId>, rusqlite::Error> {
            let mut stmt = conn.prepare("SELECT message_id FROM messages WHERE chat_id = ?1")?;
            let rows = stmt.query_map(params![chat_id], |row| row.get(0).map(MessageId))?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Messages of one chat in write order (sequence, then row id).
pub async fn messages_for_chat(
    db: &Database,
    chat_id: &ChatId,
    limit: Option<i64>,
) -> Result<Vec<StoredMessage>, TweakioError> {
    let chat_id = chat_id.as_str().to_string();
    db.connection()
        .call(move |conn| -> Result<Vec<StoredMessage>, rusqlite::Error> {
            let mut stmt = conn.prepare(&format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages WHERE chat_id = ?1
                 ORDER BY seq ASC, id ASC LIMIT ?2"
            ))?;
            // SQLite treats a negative LIMIT as "no limit".
            let rows = stmt.query_map(params![chat_id, limit.unwrap_or(-1)], row_to_stored)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Most recently persisted messages across all chats, newest first.
pub async fn recent_messages(
    db: &Database,
    limit: i64,
    offset: i64,
) -> Result<Vec<StoredMessage>, TweakioError> {
    db.connection()
        .call(move |conn| -> Result<Vec<StoredMessage>, rusqlite::Error> {
            let mut stmt = conn.prepare(&format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages ORDER BY id DESC LIMIT ?1 OFFSET ?2"
            ))?;
            let rows = stmt.query_map(params![limit, offset], row_to_stored)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Number of stored messages, optionally for one chat.
pub async fn count_messages(db: &Database, chat_id: Option<&ChatId>) -> Result<u64, TweakioError> {
    let chat_id = chat_id.map(|c| c.as_str().to_string());
    db.connection()
        .call(move |conn| -> Result<u64, rusqlite::Error> {
            let count: i64 = match chat_id {
                Some(chat_id) => conn.query_row(
                    "SELECT COUNT(*) FROM messages WHERE chat_id = ?1",
                    params![chat_id],
                    |row| row.get(0),
                )?,
                None => conn.query_row("SELECT COUNT(*) FROM messages", [], |row| row.get(0))?,
            };
            Ok(count as u64)
        })
        .await
        .map_err(map_tr_err)
}

fn row_to_stored(row: &Row<'_>) -> Result<StoredMessage, rusqlite::Error> {
    let direction: String = row.get(5)?;
    let status: String = row.get(7)?;
    let timestamp: String = row.get(9)?;
    let seq: i64 = row.get(10)?;
    Ok(StoredMessage {
        row_id: row.get(0)?,
        message: Message {
            chat_id: ChatId(row.get(1)?),
            id: MessageId(row.get(2)?),
            data_id: row.get(3)?,
            text: row.get(4)?,
            sender: SenderInfo {
                direction: enum_from_sql::<Direction>(5, &direction)?,
                name: row.get(6)?,
            },
            status: enum_from_sql::<DeliveryStatus>(7, &status)?,
            data_type: row.get(8)?,
            timestamp: ts_from_sql(9, &timestamp)?,
        },
        seq: seq as u64,
        enqueued_at: row.get(11)?,
        persisted_at: row.get(12)?,
    })
}
