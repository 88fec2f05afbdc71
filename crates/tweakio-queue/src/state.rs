// SPDX-FileCopyrightText: 2026 Tweakio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Process-wide queue counters and worker health flags.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use serde::Serialize;
use tweakio_core::UpsertOutcome;

#[derive(Debug)]
struct WorkerFlags {
    alive: AtomicBool,
    healthy: AtomicBool,
    processed: AtomicU64,
}

impl WorkerFlags {
    fn new() -> Self {
        Self {
            alive: AtomicBool::new(true),
            healthy: AtomicBool::new(true),
            processed: AtomicU64::new(0),
        }
    }
}

/// Live queue state shared by producers and workers.
#[derive(Debug)]
pub(crate) struct QueueState {
    backlog: AtomicUsize,
    high_water: AtomicUsize,
    enqueued: AtomicU64,
    written: AtomicU64,
    duplicates: AtomicU64,
    retries: AtomicU64,
    dead_lettered: AtomicU64,
    in_flight_abandoned: AtomicU64,
    workers: Vec<WorkerFlags>,
}

impl QueueState {
    pub(crate) fn new(workers: usize) -> Self {
        Self {
            backlog: AtomicUsize::new(0),
            high_water: AtomicUsize::new(0),
            enqueued: AtomicU64::new(0),
            written: AtomicU64::new(0),
            duplicates: AtomicU64::new(0),
            retries: AtomicU64::new(0),
            dead_lettered: AtomicU64::new(0),
            in_flight_abandoned: AtomicU64::new(0),
            workers: (0..workers).map(|_| WorkerFlags::new()).collect(),
        }
    }

    /// Count a newly accepted record and return the backlog including it.
    pub(crate) fn on_enqueue(&self) -> usize {
        self.enqueued.fetch_add(1, Ordering::Relaxed);
        let backlog = self.backlog.fetch_add(1, Ordering::AcqRel) + 1;
        self.high_water.fetch_max(backlog, Ordering::AcqRel);
        backlog
    }

    /// Undo `on_enqueue` for a record that never reached a worker.
    pub(crate) fn on_rejected(&self) {
        self.enqueued.fetch_sub(1, Ordering::Relaxed);
        self.backlog.fetch_sub(1, Ordering::AcqRel);
    }

    pub(crate) fn on_written(&self, worker: usize, outcome: UpsertOutcome) {
        match outcome {
            UpsertOutcome::Inserted => self.written.fetch_add(1, Ordering::Relaxed),
            UpsertOutcome::Duplicate => self.duplicates.fetch_add(1, Ordering::Relaxed),
        };
        if let Some(w) = self.workers.get(worker) {
            w.healthy.store(true, Ordering::Release);
        }
        self.finish(worker);
    }

    pub(crate) fn on_retry(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    /// `in_flight` marks a record abandoned while its store write was running.
    pub(crate) fn on_dead_letter(&self, worker: usize, in_flight: bool) {
        self.dead_lettered.fetch_add(1, Ordering::Relaxed);
        if in_flight {
            self.in_flight_abandoned.fetch_add(1, Ordering::Relaxed);
        }
        if let Some(w) = self.workers.get(worker) {
            w.healthy.store(false, Ordering::Release);
        }
        self.finish(worker);
    }

    pub(crate) fn on_worker_exit(&self, worker: usize) {
        if let Some(w) = self.workers.get(worker) {
            w.alive.store(false, Ordering::Release);
        }
    }

    pub(crate) fn dead_lettered(&self) -> u64 {
        self.dead_lettered.load(Ordering::Acquire)
    }

    pub(crate) fn in_flight_abandoned(&self) -> u64 {
        self.in_flight_abandoned.load(Ordering::Acquire)
    }

    pub(crate) fn written(&self) -> u64 {
        self.written.load(Ordering::Acquire) + self.duplicates.load(Ordering::Acquire)
    }

    fn finish(&self, worker: usize) {
        self.backlog.fetch_sub(1, Ordering::AcqRel);
        if let Some(w) = self.workers.get(worker) {
            w.processed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn snapshot(&self, closed: bool) -> QueueStats {
        QueueStats {
            backlog: self.backlog.load(Ordering::Acquire),
            high_water: self.high_water.load(Ordering::Acquire),
            enqueued: self.enqueued.load(Ordering::Acquire),
            written: self.written.load(Ordering::Acquire),
            duplicates: self.duplicates.load(Ordering::Acquire),
            retries: self.retries.load(Ordering::Acquire),
            dead_lettered: self.dead_lettered.load(Ordering::Acquire),
            closed,
            workers: self
                .workers
                .iter()
                .enumerate()
                .map(|(id, w)| WorkerHealth {
                    id,
                    alive: w.alive.load(Ordering::Acquire),
                    healthy: w.healthy.load(Ordering::Acquire),
                    processed: w.processed.load(Ordering::Acquire),
                })
                .collect(),
        }
    }
}

/// Snapshot of one writer worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkerHealth {
    pub id: usize,
    /// The worker task is still running.
    pub alive: bool,
    /// The worker's most recent record was written rather than dead-lettered.
    pub healthy: bool,
    pub processed: u64,
}

/// Point-in-time copy of the queue counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    /// Records accepted but not yet written or dead-lettered.
    pub backlog: usize,
    /// Largest backlog observed since start.
    pub high_water: usize,
    pub enqueued: u64,
    /// Records that created a new durable entry.
    pub written: u64,
    /// Records whose key was already stored.
    pub duplicates: u64,
    pub retries: u64,
    pub dead_lettered: u64,
    pub closed: bool,
    pub workers: Vec<WorkerHealth>,
}
