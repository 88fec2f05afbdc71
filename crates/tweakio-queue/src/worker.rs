// SPDX-FileCopyrightText: 2026 Tweakio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shard writer loop.
//!
//! A worker collects up to `batch_size` records, or whatever arrived within
//! `flush_interval` of the first one, and writes them in one store call. A
//! batch that fails is retried record by record so that retries, duplicates
//! and dead letters are still accounted per record.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, OwnedSemaphorePermit};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use tweakio_core::{DurableStore, TweakioError, UpsertOutcome, WriteRecord};

use crate::backoff::Backoff;
use crate::dead_letter::{DeadLetter, DeadLetterArea, DeadLetterReason};
use crate::observer::PersistenceObserver;
use crate::state::QueueState;

pub(crate) enum Command {
    /// Persist one record. The permit, if any, frees a capacity slot when dropped.
    Write {
        record: WriteRecord,
        permit: Option<OwnedSemaphorePermit>,
    },
    /// Acknowledge once every command queued ahead of it has been handled.
    Barrier(oneshot::Sender<()>),
}

/// State shared by every worker of one queue.
pub(crate) struct Shared {
    pub(crate) store: Arc<dyn DurableStore>,
    pub(crate) state: QueueState,
    pub(crate) dead_letters: DeadLetterArea,
    pub(crate) observer: Arc<dyn PersistenceObserver>,
    pub(crate) backoff: Backoff,
    pub(crate) retry_attempts: u32,
    pub(crate) batch_size: usize,
    pub(crate) flush_interval: Duration,
    /// Cancelled when the drain deadline passes; pending records are dead-lettered.
    pub(crate) abandon: CancellationToken,
}

struct Pending {
    record: WriteRecord,
    permit: Option<OwnedSemaphorePermit>,
}

/// Why a record is being given up.
struct Failure {
    reason: DeadLetterReason,
    attempts: u32,
    error: String,
    /// The store call was still running when the record was given up.
    in_flight: bool,
}

enum Attempt {
    Written(UpsertOutcome),
    Failed(Failure),
}

enum BatchAttempt {
    Written(Vec<UpsertOutcome>),
    Abandoned { in_flight: bool },
    Failed(TweakioError),
}

pub(crate) struct Worker {
    pub(crate) id: usize,
    pub(crate) rx: mpsc::UnboundedReceiver<Command>,
    pub(crate) shared: Arc<Shared>,
}

impl Worker {
    pub(crate) async fn run(mut self) {
        debug!(worker = self.id, batch_size = self.shared.batch_size, "persistence worker started");
        let mut batch: Vec<Pending> = Vec::with_capacity(self.shared.batch_size);
        let mut fill_until = Instant::now();

        loop {
            let command = if batch.is_empty() {
                self.rx.recv().await
            } else if batch.len() >= self.shared.batch_size || self.shared.abandon.is_cancelled() {
                self.write_batch(&mut batch).await;
                continue;
            } else {
                match tokio::time::timeout_at(fill_until, self.rx.recv()).await {
                    Ok(command) => command,
                    Err(_) => {
                        self.write_batch(&mut batch).await;
                        continue;
                    }
                }
            };

            match command {
                Some(Command::Write { record, permit }) => {
                    if batch.is_empty() {
                        fill_until = Instant::now() + self.shared.flush_interval;
                    }
                    batch.push(Pending { record, permit });
                }
                Some(Command::Barrier(ack)) => {
                    self.write_batch(&mut batch).await;
                    let _ = ack.send(());
                }
                None => {
                    self.write_batch(&mut batch).await;
                    break;
                }
            }
        }

        self.shared.state.on_worker_exit(self.id);
        info!(worker = self.id, "persistence worker stopped");
    }

    /// Write and empty `batch`. Capacity permits are released afterwards.
    async fn write_batch(&self, batch: &mut Vec<Pending>) {
        let (records, permits): (Vec<WriteRecord>, Vec<Option<OwnedSemaphorePermit>>) =
            batch.drain(..).map(|p| (p.record, p.permit)).unzip();

        if records.len() > 1 {
            match self.persist_batch(&records).await {
                BatchAttempt::Written(outcomes) => {
                    debug!(worker = self.id, records = records.len(), "batch written");
                    for (record, outcome) in records.iter().zip(outcomes) {
                        self.written(record, outcome);
                    }
                }
                BatchAttempt::Abandoned { in_flight } => {
                    for record in records {
                        self.dead_letter(record, abandoned(0, in_flight));
                    }
                }
                BatchAttempt::Failed(e) => {
                    debug!(
                        worker = self.id,
                        records = records.len(),
                        error = %e,
                        "batch write failed, writing records one by one"
                    );
                    for record in records {
                        self.handle(record).await;
                    }
                }
            }
        } else {
            for record in records {
                self.handle(record).await;
            }
        }
        drop(permits);
    }

    async fn persist_batch(&self, records: &[WriteRecord]) -> BatchAttempt {
        let shared = &self.shared;
        if shared.abandon.is_cancelled() {
            return BatchAttempt::Abandoned { in_flight: false };
        }
        let result = tokio::select! {
            biased;
            _ = shared.abandon.cancelled() => return BatchAttempt::Abandoned { in_flight: true },
            result = shared.store.upsert_batch(records) => result,
        };
        match result {
            Ok(outcomes) if outcomes.len() == records.len() => BatchAttempt::Written(outcomes),
            Ok(outcomes) => BatchAttempt::Failed(TweakioError::Internal(format!(
                "store returned {} outcomes for a batch of {}",
                outcomes.len(),
                records.len()
            ))),
            Err(e) => BatchAttempt::Failed(e),
        }
    }

    async fn handle(&self, record: WriteRecord) {
        match self.persist(&record).await {
            Attempt::Written(outcome) => self.written(&record, outcome),
            Attempt::Failed(failure) => self.dead_letter(record, failure),
        }
    }

    fn written(&self, record: &WriteRecord, outcome: UpsertOutcome) {
        self.shared.state.on_written(self.id, outcome);
        self.shared.observer.on_written(record, outcome);
    }

    fn dead_letter(&self, record: WriteRecord, failure: Failure) {
        let in_flight = failure.in_flight;
        let letter = DeadLetter::new(record, failure.reason, failure.attempts, failure.error)
            .with_write_in_flight(in_flight);
        self.shared.state.on_dead_letter(self.id, in_flight);
        self.shared.observer.on_dead_letter(&letter);
        self.shared.dead_letters.push(letter);
    }

    /// Write with retry. Transient errors back off and retry; anything else,
    /// or an exhausted budget, fails the record.
    async fn persist(&self, record: &WriteRecord) -> Attempt {
        let shared = &self.shared;
        let mut attempt: u32 = 0;

        loop {
            if shared.abandon.is_cancelled() {
                return Attempt::Failed(abandoned(attempt, false));
            }

            let result = tokio::select! {
                biased;
                _ = shared.abandon.cancelled() => return Attempt::Failed(abandoned(attempt, true)),
                result = shared.store.upsert(record) => result,
            };
            attempt += 1;

            match result {
                Ok(outcome) => return Attempt::Written(outcome),
                Err(e) if e.is_transient() && attempt <= shared.retry_attempts => {
                    let delay = shared.backoff.delay(attempt - 1);
                    shared.state.on_retry();
                    shared.observer.on_retry(record, attempt, &e, delay);
                    tokio::select! {
                        biased;
                        _ = shared.abandon.cancelled() => {
                            return Attempt::Failed(abandoned(attempt, false));
                        }
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                Err(e) => return Attempt::Failed(failed(e, attempt)),
            }
        }
    }
}

fn abandoned(attempts: u32, in_flight: bool) -> Failure {
    Failure {
        reason: DeadLetterReason::DrainDeadline,
        attempts,
        error: "drain deadline elapsed before the record was written".to_string(),
        in_flight,
    }
}

fn failed(error: TweakioError, attempts: u32) -> Failure {
    let reason = if error.is_transient() {
        DeadLetterReason::RetriesExhausted
    } else {
        DeadLetterReason::Permanent
    };
    Failure {
        reason,
        attempts,
        error: error.to_string(),
        in_flight: false,
    }
}
