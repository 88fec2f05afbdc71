// SPDX-FileCopyrightText: 2026 Tweakio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `tweakio chats` and `tweakio messages` command implementations.

use tweakio_config::model::TweakioConfig;
use tweakio_core::{ChatId, Direction, TweakioError};
use tweakio_storage::queries::{chats, messages};
use tweakio_storage::{Database, StoredMessage};

async fn open(config: &TweakioConfig) -> Result<Database, TweakioError> {
    Database::open_with_options(&config.storage.database_path, config.storage.wal_mode).await
}

/// Print stored chats, most recently active first.
pub async fn run_chats(config: &TweakioConfig, json: bool) -> Result<(), TweakioError> {
    let db = open(config).await?;
    let chats = chats::list_chats(&db).await?;
    if json {
        println!("{}", to_json(&chats)?);
    } else if chats.is_empty() {
        println!("no chats stored");
    } else {
        for chat in &chats {
            let count = messages::count_messages(&db, Some(&chat.id)).await?;
            println!(
                "{:<32} {:>5} messages  {:>3} unread",
                chat.name, count, chat.unread_count
            );
        }
    }
    db.close().await
}

/// Print stored messages: one chat in write order, or the newest overall.
pub async fn run_messages(
    config: &TweakioConfig,
    chat: Option<&str>,
    limit: usize,
    json: bool,
) -> Result<(), TweakioError> {
    let db = open(config).await?;
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);
    let rows = match chat {
        Some(name) => messages::messages_for_chat(&db, &ChatId::from_name(name), Some(limit)).await?,
        None => messages::recent_messages(&db, limit, 0).await?,
    };

    if json {
        println!("{}", to_json(&rows)?);
    } else if rows.is_empty() {
        println!("no messages stored");
    } else {
        for row in &rows {
            println!("{}", format_row(row));
        }
    }
    db.close().await
}

fn format_row(row: &StoredMessage) -> String {
    let msg = &row.message;
    let arrow = match msg.sender.direction {
        Direction::In => "<-",
        Direction::Out => "->",
    };
    let sender = msg.sender.name.as_deref().unwrap_or("");
    format!(
        "{} {} {arrow} {sender}: {}",
        msg.timestamp.format("%Y-%m-%d %H:%M"),
        msg.chat_id,
        msg.text
    )
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, TweakioError> {
    serde_json::to_string_pretty(value).map_err(|e| TweakioError::Internal(e.to_string()))
}
