// SPDX-FileCopyrightText: 2026 Tweakio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Write-behind persistence queue.
//!
//! Producers hand records to [`PersistenceQueue::enqueue`] and move on; a pool
//! of background workers writes them to a [`tweakio_core::DurableStore`].
//! Records are sharded by chat id so each chat has exactly one writer, which
//! keeps intra-chat order equal to enqueue order. Transient store failures are
//! retried with bounded exponential backoff; anything that still fails lands
//! in the dead-letter area and is reported to the [`PersistenceObserver`].

pub mod backoff;
pub mod dead_letter;
pub mod observer;
pub mod queue;
pub mod state;
mod worker;

pub use backoff::Backoff;
pub use dead_letter::{DeadLetter, DeadLetterReason};
pub use observer::{PersistenceObserver, TracingObserver};
pub use queue::{PersistenceQueue, ShutdownReport};
pub use state::{QueueStats, WorkerHealth};
