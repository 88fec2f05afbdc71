// SPDX-FileCopyrightText: 2026 Tweakio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Hooks for watching what the persistence workers do.

use std::time::Duration;

use tracing::{debug, error, warn};
use tweakio_core::{TweakioError, UpsertOutcome, WriteRecord};

use crate::dead_letter::DeadLetter;

/// Receives persistence events from the queue workers.
///
/// Called inline on the worker task; implementations must not block.
pub trait PersistenceObserver: Send + Sync {
    fn on_written(&self, _record: &WriteRecord, _outcome: UpsertOutcome) {}

    fn on_retry(
        &self,
        _record: &WriteRecord,
        _attempt: u32,
        _error: &TweakioError,
        _delay: Duration,
    ) {
    }

    fn on_dead_letter(&self, _letter: &DeadLetter) {}
}

/// Default observer: structured log lines via `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl PersistenceObserver for TracingObserver {
    fn on_written(&self, record: &WriteRecord, outcome: UpsertOutcome) {
        debug!(key = %record.key(), seq = record.seq, %outcome, "record persisted");
    }

    fn on_retry(&self, record: &WriteRecord, attempt: u32, error: &TweakioError, delay: Duration) {
        warn!(
            key = %record.key(),
            attempt,
            delay_ms = delay.as_millis() as u64,
            error = %error,
            "transient write failure, retrying"
        );
    }

    fn on_dead_letter(&self, letter: &DeadLetter) {
        error!(
            key = %letter.record.key(),
            seq = letter.record.seq,
            reason = %letter.reason,
            attempts = letter.attempts,
            write_in_flight = letter.write_in_flight,
            error = %letter.error,
            "record moved to dead-letter area"
        );
    }
}
