// SPDX-FileCopyrightText: 2026 Tweakio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persistence observer that records every event for assertions.

use std::sync::Mutex;
use std::time::Duration;

use tweakio_core::{RecordKey, TweakioError, UpsertOutcome, WriteRecord};
use tweakio_queue::{DeadLetter, DeadLetterReason, PersistenceObserver};

#[derive(Default)]
struct Events {
    written: Vec<(RecordKey, UpsertOutcome)>,
    retries: Vec<(RecordKey, u32)>,
    dead: Vec<(RecordKey, DeadLetterReason)>,
}

#[derive(Default)]
pub struct RecordingObserver {
    events: Mutex<Events>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn written(&self) -> Vec<(RecordKey, UpsertOutcome)> {
        self.events().written.clone()
    }

    pub fn retries(&self) -> Vec<(RecordKey, u32)> {
        self.events().retries.clone()
    }

    pub fn dead_letters(&self) -> Vec<(RecordKey, DeadLetterReason)> {
        self.events().dead.clone()
    }

    fn events(&self) -> std::sync::MutexGuard<'_, Events> {
        self.events.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl PersistenceObserver for RecordingObserver {
    fn on_written(&self, record: &WriteRecord, outcome: UpsertOutcome) {
        self.events().written.push((record.key(), outcome));
    }

    fn on_retry(&self, record: &WriteRecord, attempt: u32, _error: &TweakioError, _delay: Duration) {
        self.events().retries.push((record.key(), attempt));
    }

    fn on_dead_letter(&self, letter: &DeadLetter) {
        self.events().dead.push((letter.record.key(), letter.reason));
    }
}
