// SPDX-FileCopyrightText: 2026 Tweakio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Batched writes of queue records.

use chrono::Utc;
use tweakio_core::{RecordPayload, TweakioError, UpsertOutcome, WriteRecord};

use crate::database::{map_tr_err, Database};
use crate::queries::chats::upsert_chat_row;
use crate::queries::messages::insert_message_row;
use crate::queries::ts_to_sql;

/// Write `records` in one transaction, returning an outcome per record.
///
/// Either every record is applied or none is.
pub async fn write_records(
    db: &Database,
    records: Vec<WriteRecord>,
) -> Result<Vec<UpsertOutcome>, TweakioError> {
    let now = ts_to_sql(&Utc::now());
    db.connection()
        .call(move |conn| -> Result<Vec<UpsertOutcome>, rusqlite::Error> {
            let tx = conn.transaction()?;
            let mut outcomes = Vec::with_capacity(records.len());
            for record in &records {
                let outcome = match &record.payload {
                    RecordPayload::Chat(chat) => {
                        upsert_chat_row(&tx, chat, &now)?;
                        UpsertOutcome::Inserted
                    }
                    RecordPayload::Message(msg) => {
                        let enqueued_at = ts_to_sql(&record.enqueued_at);
                        insert_message_row(&tx, msg, record.seq, &enqueued_at, &now)?
                    }
                };
                outcomes.push(outcome);
            }
            tx.commit()?;
            Ok(outcomes)
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use tweakio_core::{Chat, ChatHandle, Direction, Message};

    use super::*;
    use crate::queries::{chats, messages};

    fn message(chat: &Chat, data_id: &str) -> Message {
        Message::new(chat.id.clone(), data_id, "hi", Direction::In)
    }

    #[tokio::test]
    async fn batch_reports_duplicates_per_record() {
        let db = Database::open_in_memory().await.unwrap();
        let chat = Chat::new("Alice", ChatHandle("row-0".into()));
        let records = vec![
            WriteRecord::new(0, chat.clone().into()),
            WriteRecord::new(1, message(&chat, "m1").into()),
            WriteRecord::new(2, message(&chat, "m1").into()),
            WriteRecord::new(3, message(&chat, "m2").into()),
        ];

        let outcomes = write_records(&db, records).await.unwrap();

        assert_eq!(
            outcomes,
            vec![
                UpsertOutcome::Inserted,
                UpsertOutcome::Inserted,
                UpsertOutcome::Duplicate,
                UpsertOutcome::Inserted,
            ]
        );
        assert!(chats::get_chat(&db, &chat.id).await.unwrap().is_some());
        assert_eq!(messages::count_messages(&db, Some(&chat.id)).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn failed_batch_leaves_nothing_behind() {
        let db = Database::open_in_memory().await.unwrap();
        let chat = Chat::new("Bob", ChatHandle("row-1".into()));
        db.connection()
            .call(|conn| conn.execute_batch("DROP TABLE chats"))
            .await
            .unwrap();

        let records = vec![
            WriteRecord::new(0, message(&chat, "m1").into()),
            WriteRecord::new(1, chat.clone().into()),
        ];
        assert!(write_records(&db, records).await.is_err());
        assert_eq!(messages::count_messages(&db, None).await.unwrap(), 0);
    }
}
