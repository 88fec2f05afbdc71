// SPDX-FileCopyrightText: 2026 Tweakio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Chat snapshot operations.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tweakio_core::{Chat, ChatHandle, ChatId, TweakioError};

use crate::database::{map_tr_err, Database};
use crate::queries::{ts_from_sql, ts_to_sql};

const CHAT_COLUMNS: &str =
    "chat_id, name, unread_count, last_activity, handle, observed_at";

/// Insert a chat snapshot or refresh the stored one.
pub async fn upsert_chat(db: &Database, chat: &Chat) -> Result<(), TweakioError> {
    let chat = chat.clone();
    let now = ts_to_sql(&Utc::now());
    db.connection()
        .call(move |conn| upsert_chat_row(conn, &chat, &now))
        .await
        .map_err(map_tr_err)
}

/// Statement behind [`upsert_chat`], usable inside a transaction.
pub(crate) fn upsert_chat_row(
    conn: &Connection,
    chat: &Chat,
    updated_at: &str,
) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT INTO chats (chat_id, name, unread_count, last_activity, handle, observed_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
         ON CONFLICT(chat_id) DO UPDATE SET
            name = excluded.name,
            unread_count = excluded.unread_count,
            last_activity = excluded.last_activity,
            handle = excluded.handle,
            observed_at = excluded.observed_at,
            updated_at = excluded.updated_at",
        params![
            chat.id.as_str(),
            chat.name,
            chat.unread_count,
            chat.last_activity.as_ref().map(ts_to_sql),
            chat.handle.0,
            ts_to_sql(&chat.observed_at),
            updated_at,
        ],
    )?;
    Ok(())
}

pub async fn get_chat(db: &Database, chat_id: &ChatId) -> Result<Option<Chat>, TweakioError> {
    let chat_id = chat_id.as_str().to_string();
    db.connection()
        .call(move |conn| -> Result<Option<Chat>, rusqlite::Error> {
            conn.query_row(
                &format!("SELECT {CHAT_COLUMNS} FROM chats WHERE chat_id = ?1"),
                params![chat_id],
                row_to_chat,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// All stored chats, most recently active first.
pub async fn list_chats(db: &Database) -> Result<Vec<Chat>, TweakioError> {
    db.connection()
        .call(|conn| -> Result<Vec<Chat>, rusqlite::Error> {
            let mut stmt = conn.prepare(&format!(
                "SELECT {CHAT_COLUMNS} FROM chats
                 ORDER BY last_activity IS NULL, last_activity DESC, name ASC"
            ))?;
            let rows = stmt.query_map([], row_to_chat)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

fn row_to_chat(row: &Row<'_>) -> Result<Chat, rusqlite::Error> {
    let last_activity: Option<String> = row.get(3)?;
    let observed_at: String = row.get(5)?;
    Ok(Chat {
        id: ChatId(row.get(0)?),
        name: row.get(1)?,
        unread_count: row.get(2)?,
        last_activity: last_activity
            .as_deref()
            .map(|raw| ts_from_sql(3, raw))
            .transpose()?,
        handle: ChatHandle(row.get(4)?),
        observed_at: ts_from_sql(5, &observed_at)?,
    })
}
