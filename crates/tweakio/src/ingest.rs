// SPDX-FileCopyrightText: 2026 Tweakio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `tweakio ingest` command implementation.
//!
//! Replays a capture file through the full pipeline (rate limiter, fetchers,
//! write-behind queue) into the configured SQLite database.

use std::path::Path;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tweakio_config::model::TweakioConfig;
use tweakio_core::{DurableStore, TweakioError};
use tweakio_pipeline::{Coordinator, RunSummary};
use tweakio_queue::PersistenceQueue;
use tweakio_ratelimit::RateLimiter;
use tweakio_storage::SqliteStore;

use crate::replay::ReplaySource;

/// Runs the `tweakio ingest` command.
///
/// The queue is always drained before returning, even when the run itself
/// failed. Records that could not be written are logged individually.
pub async fn run_ingest(
    config: &TweakioConfig,
    capture: &Path,
    max_chats: Option<usize>,
    cancel: CancellationToken,
) -> Result<RunSummary, TweakioError> {
    let source = Arc::new(ReplaySource::load(capture).await?);
    info!(
        capture = %capture.display(),
        chats = source.chat_count(),
        messages = source.message_count(),
        "capture loaded"
    );

    let store = Arc::new(SqliteStore::new(config.storage.clone()));
    store.initialize().await?;

    let limiter = Arc::new(RateLimiter::from_config(&config.rate_limit));
    let queue = Arc::new(PersistenceQueue::start(&config.queue, store.clone()));
    let coordinator = Coordinator::new(
        source,
        store.clone(),
        limiter,
        Arc::clone(&queue),
        config,
    )
    .with_cancel(cancel);

    let result = coordinator
        .sync(max_chats.unwrap_or(config.fetch.max_chats))
        .await;

    if !queue.is_closed() {
        queue.shutdown(config.queue.drain_deadline()).await?;
    }
    for letter in queue.dead_letters() {
        error!(
            key = %letter.record.key(),
            reason = %letter.reason,
            write_in_flight = letter.write_in_flight,
            error = %letter.to_error(),
            "record not persisted"
        );
    }
    store.close().await?;

    result
}
