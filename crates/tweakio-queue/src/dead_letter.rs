// SPDX-FileCopyrightText: 2026 Tweakio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Holding area for records that could not be persisted.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;
use strum::Display;
use tweakio_core::{TweakioError, WriteRecord};

/// Why a record ended up in the dead-letter area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DeadLetterReason {
    /// Transient failures outlasted the retry budget.
    RetriesExhausted,
    /// The store returned a non-retryable error.
    Permanent,
    /// Shutdown's drain deadline elapsed before the record was written.
    ///
    /// See [`DeadLetter::write_in_flight`]: such a record may be durable too.
    DrainDeadline,
}

/// A record that permanently failed to persist, kept for inspection/replay.
#[derive(Debug, Clone, Serialize)]
pub struct DeadLetter {
    pub record: WriteRecord,
    pub reason: DeadLetterReason,
    /// Write attempts made before giving up (0 if never attempted).
    pub attempts: u32,
    pub error: String,
    pub failed_at: DateTime<Utc>,
    /// A store write for this record was still running when it was given up.
    /// The write may have committed anyway; replaying is safe because writes
    /// are idempotent on key.
    pub write_in_flight: bool,
}

impl DeadLetter {
    pub fn new(
        record: WriteRecord,
        reason: DeadLetterReason,
        attempts: u32,
        error: impl Into<String>,
    ) -> Self {
        Self {
            record,
            reason,
            attempts,
            error: error.into(),
            failed_at: Utc::now(),
            write_in_flight: false,
        }
    }

    pub fn with_write_in_flight(mut self, in_flight: bool) -> Self {
        self.write_in_flight = in_flight;
        self
    }

    /// The failure as a pipeline error, for callers that want to surface it.
    pub fn to_error(&self) -> TweakioError {
        TweakioError::PersistenceFailure {
            key: self.record.key().to_string(),
            attempts: self.attempts,
            message: format!("{}: {}", self.reason, self.error),
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct DeadLetterArea {
    letters: Mutex<Vec<DeadLetter>>,
}

impl DeadLetterArea {
    pub(crate) fn push(&self, letter: DeadLetter) {
        self.with(|letters| letters.push(letter));
    }

    pub(crate) fn snapshot(&self) -> Vec<DeadLetter> {
        self.with(|letters| letters.clone())
    }

    pub(crate) fn take_all(&self) -> Vec<DeadLetter> {
        self.with(std::mem::take)
    }

    /// Put letters back at the front, ahead of anything added meanwhile.
    pub(crate) fn restore(&self, mut returned: Vec<DeadLetter>) {
        self.with(|letters| {
            returned.append(letters);
            *letters = returned;
        });
    }

    pub(crate) fn len(&self) -> usize {
        self.with(|letters| letters.len())
    }

    fn with<R>(&self, f: impl FnOnce(&mut Vec<DeadLetter>) -> R) -> R {
        // A panic while holding the lock cannot leave the Vec half-modified.
        let mut guard = self
            .letters
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut guard)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tweakio_core::{ChatId, Direction, Message};

    fn letter(data_id: &str) -> DeadLetter {
        let msg = Message::new(ChatId::from_name("a"), data_id, "x", Direction::In);
        DeadLetter::new(
            WriteRecord::new(0, msg.into()),
            DeadLetterReason::Permanent,
            1,
            "constraint",
        )
    }

    #[test]
    fn restore_keeps_returned_letters_first() {
        let area = DeadLetterArea::default();
        area.push(letter("1"));
        let taken = area.take_all();
        assert_eq!(area.len(), 0);
        area.push(letter("2"));
        area.restore(taken);
        let ids: Vec<String> = area
            .snapshot()
            .iter()
            .map(|l| l.record.key().to_string())
            .collect();
        assert_eq!(ids, vec!["wa::a/wa-msg::1", "wa::a/wa-msg::2"]);
    }

    #[test]
    fn to_error_is_persistence_failure() {
        let err = letter("9").to_error();
        assert!(matches!(err, TweakioError::PersistenceFailure { attempts: 1, .. }));
        assert!(err.to_string().contains("permanent: constraint"));
    }
}
