// SPDX-FileCopyrightText: 2026 Tweakio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and lifecycle.
//!
//! All writes are serialized through tokio-rusqlite's single background thread.
//! Do NOT create additional Connection instances for writes.

use std::time::Duration;

use rusqlite::ErrorCode;
use tokio_rusqlite::Connection;
use tracing::{debug, info};
use tweakio_core::TweakioError;

use crate::migrations;

/// How long SQLite itself waits on a locked database before reporting busy.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Handle to the capture database.
///
/// Wraps the one `tokio_rusqlite::Connection` every query goes through.
pub struct Database {
    conn: Connection,
    path: String,
}

impl Database {
    /// Open (or create) the database at `path` in WAL mode and run migrations.
    pub async fn open(path: &str) -> Result<Self, TweakioError> {
        Self::open_with_options(path, true).await
    }

    /// Open the database at `path`, choosing the journal mode.
    pub async fn open_with_options(path: &str, wal_mode: bool) -> Result<Self, TweakioError> {
        let conn = Connection::open(path)
            .await
            .map_err(|e| TweakioError::Storage {
                source: Box::new(e),
            })?;
        prepare(&conn, wal_mode).await?;
        info!(path, wal_mode, "database opened");
        Ok(Self {
            conn,
            path: path.to_string(),
        })
    }

    /// Open a private in-memory database with the full schema.
    pub async fn open_in_memory() -> Result<Self, TweakioError> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(|e| TweakioError::Storage {
                source: Box::new(e),
            })?;
        prepare(&conn, false).await?;
        Ok(Self {
            conn,
            path: ":memory:".to_string(),
        })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Checkpoint the WAL into the main file.
    pub async fn checkpoint(&self) -> Result<(), TweakioError> {
        self.conn
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.query_row("PRAGMA wal_checkpoint(TRUNCATE)", [], |_| Ok(()))
            })
            .await
            .map_err(map_tr_err)?;
        debug!(path = %self.path, "WAL checkpoint complete");
        Ok(())
    }

    /// Checkpoint and close the connection.
    pub async fn close(self) -> Result<(), TweakioError> {
        self.checkpoint().await?;
        self.conn.close().await.map_err(|e| TweakioError::Storage {
            source: Box::new(e),
        })?;
        debug!(path = %self.path, "database closed");
        Ok(())
    }
}

async fn prepare(conn: &Connection, wal_mode: bool) -> Result<(), TweakioError> {
    conn.call(move |conn| -> Result<(), TweakioError> {
        apply_pragmas(conn, wal_mode).map_err(|e| TweakioError::Storage {
            source: Box::new(e),
        })?;
        migrations::run_migrations(conn)
    })
    .await
    .map_err(|e| match e {
        tokio_rusqlite::Error::Error(inner) => inner,
        other => TweakioError::Storage {
            source: other.to_string().into(),
        },
    })
}

fn apply_pragmas(conn: &rusqlite::Connection, wal_mode: bool) -> Result<(), rusqlite::Error> {
    if wal_mode {
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        debug!(journal_mode = %mode, "journal mode set");
    }
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    Ok(())
}

/// Convert a tokio-rusqlite error into the pipeline error type.
///
/// A busy or locked database is transient: the persistence queue retries it.
/// Everything else is a permanent storage error.
pub fn map_tr_err(e: tokio_rusqlite::Error<rusqlite::Error>) -> TweakioError {
    if let tokio_rusqlite::Error::Error(inner) = &e
        && matches!(
            inner.sqlite_error_code(),
            Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked)
        )
    {
        return TweakioError::TransientIo {
            message: inner.to_string(),
            source: Some(Box::new(e)),
        };
    }
    TweakioError::Storage {
        source: Box::new(e),
    }
}
