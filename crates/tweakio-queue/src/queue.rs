// SPDX-FileCopyrightText: 2026 Tweakio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The persistence queue front end: enqueue, flush, shutdown.

use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::{mpsc, oneshot, Semaphore};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tweakio_config::model::QueueConfig;
use tweakio_core::{ChatId, DurableStore, HealthStatus, RecordPayload, TweakioError, WriteRecord};

use crate::backoff::Backoff;
use crate::dead_letter::{DeadLetter, DeadLetterArea};
use crate::observer::{PersistenceObserver, TracingObserver};
use crate::state::{QueueState, QueueStats};
use crate::worker::{Command, Shared, Worker};

/// Outcome of [`PersistenceQueue::shutdown`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShutdownReport {
    /// Every pending record resolved before the deadline.
    pub drained: bool,
    /// Records resolved (written or duplicate) during shutdown.
    pub written: u64,
    /// Records dead-lettered during shutdown, including abandoned ones.
    pub dead_lettered: u64,
    /// Abandoned records whose store write was still running at the
    /// deadline. They are counted in `dead_lettered` but may also be durable.
    pub in_flight: u64,
    #[serde(with = "duration_ms")]
    pub elapsed: Duration,
}

mod duration_ms {
    use std::time::Duration;

    use serde::Serializer;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }
}

/// Write-behind queue in front of a [`DurableStore`].
pub struct PersistenceQueue {
    shared: Arc<Shared>,
    /// One sender per shard; `None` once shutdown has begun.
    senders: RwLock<Option<Vec<mpsc::UnboundedSender<Command>>>>,
    handles: Mutex<Vec<JoinHandle<()>>>,
    /// Next sequence number per chat. The entry lock also orders sends.
    sequences: DashMap<ChatId, u64>,
    capacity: Option<Arc<Semaphore>>,
    warn_backlog: usize,
    closed: AtomicBool,
}

impl PersistenceQueue {
    /// Spawn the workers and return a queue ready for `enqueue`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(config: &QueueConfig, store: Arc<dyn DurableStore>) -> Self {
        Self::start_with_observer(config, store, Arc::new(TracingObserver))
    }

    pub fn start_with_observer(
        config: &QueueConfig,
        store: Arc<dyn DurableStore>,
        observer: Arc<dyn PersistenceObserver>,
    ) -> Self {
        let workers = config.workers.max(1);
        let shared = Arc::new(Shared {
            store,
            state: QueueState::new(workers),
            dead_letters: DeadLetterArea::default(),
            observer,
            backoff: Backoff::from_config(config),
            retry_attempts: config.retry_attempts,
            batch_size: config.batch_size.max(1),
            flush_interval: config.flush_interval(),
            abandon: CancellationToken::new(),
        });

        let mut senders = Vec::with_capacity(workers);
        let mut handles = Vec::with_capacity(workers);
        for id in 0..workers {
            let (tx, rx) = mpsc::unbounded_channel();
            let worker = Worker {
                id,
                rx,
                shared: Arc::clone(&shared),
            };
            handles.push(tokio::spawn(worker.run()));
            senders.push(tx);
        }

        let capacity = (config.capacity > 0).then(|| Arc::new(Semaphore::new(config.capacity)));
        info!(
            workers,
            capacity = config.capacity,
            retry_attempts = config.retry_attempts,
            batch_size = config.batch_size,
            "persistence queue started"
        );

        Self {
            shared,
            senders: RwLock::new(Some(senders)),
            handles: Mutex::new(handles),
            sequences: DashMap::new(),
            capacity,
            warn_backlog: config.warn_backlog,
            closed: AtomicBool::new(false),
        }
    }

    /// Accept a record for asynchronous persistence and return its sequence number.
    ///
    /// Never touches storage. Waits only when a bounded queue is full. Fails
    /// with [`TweakioError::QueueClosed`] once shutdown has begun.
    pub async fn enqueue(&self, payload: impl Into<RecordPayload>) -> Result<u64, TweakioError> {
        if self.is_closed() {
            return Err(TweakioError::QueueClosed);
        }

        let permit = match &self.capacity {
            Some(sem) => Some(
                Arc::clone(sem)
                    .acquire_owned()
                    .await
                    .map_err(|_| TweakioError::QueueClosed)?,
            ),
            None => None,
        };

        let payload = payload.into();
        let senders = self.senders.read().map_err(|_| lock_poisoned())?;
        let Some(senders) = senders.as_ref() else {
            return Err(TweakioError::QueueClosed);
        };
        let tx = &senders[shard_for(payload.chat_id(), senders.len())];

        // Hold the chat's entry across the send so sequence order is channel order.
        let mut next = self.sequences.entry(payload.chat_id().clone()).or_insert(0);
        let seq = *next;
        let backlog = self.shared.state.on_enqueue();
        let record = WriteRecord::new(seq, payload);
        if tx.send(Command::Write { record, permit }).is_err() {
            self.shared.state.on_rejected();
            return Err(TweakioError::QueueClosed);
        }
        *next += 1;
        drop(next);

        if self.capacity.is_none() && backlog == self.warn_backlog {
            warn!(backlog, "persistence backlog crossed warning threshold");
        }
        Ok(seq)
    }

    /// Wait until every record enqueued before this call is written or dead-lettered.
    pub async fn flush(&self) -> Result<(), TweakioError> {
        let acks = {
            let senders = self.senders.read().map_err(|_| lock_poisoned())?;
            let Some(senders) = senders.as_ref() else {
                // Shutdown owns the drain from here on.
                return Ok(());
            };
            let mut acks = Vec::with_capacity(senders.len());
            for tx in senders {
                let (ack_tx, ack_rx) = oneshot::channel();
                tx.send(Command::Barrier(ack_tx))
                    .map_err(|_| TweakioError::Internal("persistence worker exited".into()))?;
                acks.push(ack_rx);
            }
            acks
        };

        for ack in acks {
            ack.await.map_err(|_| {
                TweakioError::Internal("persistence worker stopped before flush completed".into())
            })?;
        }
        Ok(())
    }

    /// Stop accepting records, drain the backlog, and stop the workers.
    ///
    /// Records still pending after `deadline` are moved to the dead-letter
    /// area. Calling it again returns an empty report.
    pub async fn shutdown(&self, deadline: Duration) -> Result<ShutdownReport, TweakioError> {
        let started = Instant::now();
        let already_closed = self.closed.swap(true, Ordering::AcqRel);
        if let Some(sem) = &self.capacity {
            sem.close();
        }
        let senders = self
            .senders
            .write()
            .map_err(|_| lock_poisoned())?
            .take();
        drop(senders);
        let handles = std::mem::take(&mut *self.handles.lock().map_err(|_| lock_poisoned())?);

        if already_closed && handles.is_empty() {
            return Ok(ShutdownReport {
                drained: true,
                written: 0,
                dead_lettered: 0,
                in_flight: 0,
                elapsed: started.elapsed(),
            });
        }

        let state = &self.shared.state;
        let (written_before, dead_before, in_flight_before) = (
            state.written(),
            state.dead_lettered(),
            state.in_flight_abandoned(),
        );
        let backlog = state.snapshot(true).backlog;
        info!(backlog, deadline_ms = deadline.as_millis() as u64, "draining persistence queue");

        let mut joined = std::pin::pin!(futures::future::join_all(handles));
        let drained = match tokio::time::timeout(deadline, joined.as_mut()).await {
            Ok(results) => {
                log_join_errors(results);
                true
            }
            Err(_) => {
                warn!(
                    remaining = state.snapshot(true).backlog,
                    "drain deadline elapsed, dead-lettering pending records"
                );
                self.shared.abandon.cancel();
                log_join_errors(joined.await);
                false
            }
        };

        let report = ShutdownReport {
            drained,
            written: state.written() - written_before,
            dead_lettered: state.dead_lettered() - dead_before,
            in_flight: state.in_flight_abandoned() - in_flight_before,
            elapsed: started.elapsed(),
        };
        info!(
            drained,
            written = report.written,
            dead_lettered = report.dead_lettered,
            in_flight = report.in_flight,
            "persistence queue stopped"
        );
        Ok(report)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn stats(&self) -> QueueStats {
        self.shared.state.snapshot(self.is_closed())
    }

    /// Aggregate worker health.
    pub fn health(&self) -> HealthStatus {
        let stats = self.stats();
        if stats.closed {
            return HealthStatus::Unhealthy("queue is closed".into());
        }
        let dead: Vec<usize> = stats.workers.iter().filter(|w| !w.alive).map(|w| w.id).collect();
        if !dead.is_empty() {
            return HealthStatus::Unhealthy(format!("workers {dead:?} exited"));
        }
        let failing = stats.workers.iter().filter(|w| !w.healthy).count();
        if failing > 0 {
            return HealthStatus::Degraded(format!(
                "{failing} worker(s) dead-lettered their last record"
            ));
        }
        HealthStatus::Healthy
    }

    /// Copy of the dead-letter area.
    pub fn dead_letters(&self) -> Vec<DeadLetter> {
        self.shared.dead_letters.snapshot()
    }

    pub fn dead_letter_count(&self) -> usize {
        self.shared.dead_letters.len()
    }

    /// Re-enqueue every dead-lettered record and return how many were accepted.
    ///
    /// Replayed records get fresh sequence numbers. If the queue closes part
    /// way, the rest go back into the dead-letter area.
    pub async fn replay_dead_letters(&self) -> Result<usize, TweakioError> {
        let mut letters = self.shared.dead_letters.take_all().into_iter();
        let mut replayed = 0;
        while let Some(letter) = letters.next() {
            if let Err(e) = self.enqueue(letter.record.payload.clone()).await {
                let mut rest = vec![letter];
                rest.extend(letters);
                self.shared.dead_letters.restore(rest);
                return Err(e);
            }
            replayed += 1;
        }
        if replayed > 0 {
            info!(replayed, "dead letters re-enqueued");
        }
        Ok(replayed)
    }
}

impl Drop for PersistenceQueue {
    fn drop(&mut self) {
        let backlog = self.shared.state.snapshot(self.is_closed()).backlog;
        if !self.is_closed() && backlog > 0 {
            warn!(backlog, "persistence queue dropped without shutdown, workers keep draining");
        }
    }
}

fn shard_for(chat_id: &ChatId, shards: usize) -> usize {
    let mut hasher = DefaultHasher::new();
    chat_id.hash(&mut hasher);
    (hasher.finish() % shards as u64) as usize
}

fn lock_poisoned() -> TweakioError {
    TweakioError::Internal("persistence queue lock poisoned".into())
}

fn log_join_errors(results: Vec<Result<(), tokio::task::JoinError>>) {
    for result in results {
        if let Err(e) = result {
            error!(error = %e, "persistence worker panicked");
        }
    }
}
