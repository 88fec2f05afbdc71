// SPDX-FileCopyrightText: 2026 Tweakio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the DurableStore trait.

use std::collections::HashSet;

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::debug;

use tweakio_config::model::StorageConfig;
use tweakio_core::{
    AdapterType, ChatId, DurableStore, HealthStatus, MessageId, PluginAdapter, RecordKey,
    RecordPayload, TweakioError, UpsertOutcome, WriteRecord,
};

use crate::database::Database;
use crate::queries;

/// SQLite-backed durable store.
///
/// Wraps a [`Database`] handle and delegates all query operations to the
/// typed query modules. The database is lazily opened on the first call to
/// [`DurableStore::initialize`].
pub struct SqliteStore {
    config: StorageConfig,
    db: OnceCell<Database>,
}

impl SqliteStore {
    /// Create a new SqliteStore with the given configuration.
    ///
    /// The database connection is not opened until [`DurableStore::initialize`] is called.
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            db: OnceCell::new(),
        }
    }

    /// Wrap an already opened database.
    pub fn from_database(db: Database) -> Self {
        let config = StorageConfig {
            database_path: db.path().to_string(),
            ..StorageConfig::default()
        };
        Self {
            config,
            db: OnceCell::new_with(Some(db)),
        }
    }

    /// Returns the underlying Database, or an error if not initialized.
    pub fn database(&self) -> Result<&Database, TweakioError> {
        self.db.get().ok_or_else(|| TweakioError::Storage {
            source: "storage not initialized -- call initialize() first".into(),
        })
    }
}

#[async_trait]
impl PluginAdapter for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Store
    }

    async fn health_check(&self) -> Result<HealthStatus, TweakioError> {
        let db = self.database()?;
        db.connection()
            .call(|conn| -> Result<i64, rusqlite::Error> {
                conn.query_row("SELECT 1", [], |row| row.get(0))
            })
            .await
            .map_err(crate::database::map_tr_err)?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), TweakioError> {
        if let Some(db) = self.db.get() {
            db.checkpoint().await?;
            debug!("shutdown: WAL checkpoint complete");
        }
        Ok(())
    }
}

#[async_trait]
impl DurableStore for SqliteStore {
    async fn initialize(&self) -> Result<(), TweakioError> {
        let db =
            Database::open_with_options(&self.config.database_path, self.config.wal_mode).await?;
        self.db.set(db).map_err(|_| TweakioError::Storage {
            source: "storage already initialized".into(),
        })?;
        debug!(path = %self.config.database_path, "SQLite store initialized");
        Ok(())
    }

    async fn upsert(&self, record: &WriteRecord) -> Result<UpsertOutcome, TweakioError> {
        let db = self.database()?;
        match &record.payload {
            RecordPayload::Chat(chat) => {
                queries::chats::upsert_chat(db, chat).await?;
                Ok(UpsertOutcome::Inserted)
            }
            RecordPayload::Message(msg) => {
                let enqueued_at = queries::ts_to_sql(&record.enqueued_at);
                queries::messages::insert_message(db, msg, record.seq, &enqueued_at).await
            }
        }
    }

    async fn upsert_batch(
        &self,
        records: &[WriteRecord],
    ) -> Result<Vec<UpsertOutcome>, TweakioError> {
        let db = self.database()?;
        queries::records::write_records(db, records.to_vec()).await
    }

    async fn contains(&self, key: &RecordKey) -> Result<bool, TweakioError> {
        let db = self.database()?;
        match &key.message_id {
            Some(message_id) => {
                queries::messages::message_exists(db, Some(&key.chat_id), message_id).await
            }
            None => Ok(queries::chats::get_chat(db, &key.chat_id).await?.is_some()),
        }
    }

    async fn stored_message_ids(&self, chat: &ChatId) -> Result<HashSet<MessageId>, TweakioError> {
        queries::messages::message_ids_for_chat(self.database()?, chat).await
    }

    async fn close(&self) -> Result<(), TweakioError> {
        self.database()?.checkpoint().await
    }
}
