// SPDX-FileCopyrightText: 2026 Tweakio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Run summaries reported by the coordinator.

use std::fmt;
use std::time::Duration;

use serde::Serialize;
use strum::Display;
use tweakio_fetch::FetchEnd;
use tweakio_queue::ShutdownReport;

/// Which coordinator entry point produced a summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    CollectChats,
    CollectMessages,
    Sync,
}

/// Why a run stopped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum Termination {
    MaxReached,
    Exhausted,
    RateLimited { retry_after_ms: u64 },
    Cancelled,
    CollaboratorFailure { message: String, yielded: usize },
    /// The queue was shut down underneath the run.
    QueueClosed,
}

impl Termination {
    /// Max reached or exhausted.
    pub fn is_normal(&self) -> bool {
        matches!(self, Self::MaxReached | Self::Exhausted)
    }
}

impl From<FetchEnd> for Termination {
    fn from(end: FetchEnd) -> Self {
        match end {
            FetchEnd::MaxReached => Self::MaxReached,
            FetchEnd::Exhausted => Self::Exhausted,
            FetchEnd::RateLimited { retry_after } => Self::RateLimited {
                retry_after_ms: retry_after.as_millis() as u64,
            },
            FetchEnd::Cancelled => Self::Cancelled,
            FetchEnd::CollaboratorFailure { message, yielded } => {
                Self::CollaboratorFailure { message, yielded }
            }
        }
    }
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MaxReached => f.write_str("max reached"),
            Self::Exhausted => f.write_str("source exhausted"),
            Self::RateLimited { retry_after_ms } => {
                write!(f, "rate limited, retry after {retry_after_ms}ms")
            }
            Self::Cancelled => f.write_str("cancelled"),
            Self::CollaboratorFailure { message, yielded } => {
                write!(f, "collaborator failure after {yielded} items: {message}")
            }
            Self::QueueClosed => f.write_str("persistence queue closed"),
        }
    }
}

/// What one coordinator run did.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub operation: Operation,
    /// Caller's cap on driving units (chats, or messages for a single chat).
    pub requested: Option<usize>,
    /// Driving units yielded.
    pub processed: usize,
    /// Chat records enqueued.
    pub chats: usize,
    /// Message records enqueued.
    pub messages: usize,
    /// Messages skipped because they were already stored.
    pub skipped: usize,
    /// Records dead-lettered while this run was active. Drain-deadline letters
    /// counted in `shutdown.in_flight` may also have been stored.
    pub dead_lettered: u64,
    pub termination: Termination,
    /// Present when the run ended by draining the queue.
    pub shutdown: Option<ShutdownReport>,
    #[serde(rename = "elapsed_ms", serialize_with = "as_millis")]
    pub elapsed: Duration,
}

impl RunSummary {
    /// Records handed to the queue.
    pub fn enqueued(&self) -> usize {
        self.chats + self.messages
    }

    /// Ended normally with nothing dead-lettered.
    pub fn is_clean(&self) -> bool {
        self.termination.is_normal() && self.dead_lettered == 0
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let unit = match self.operation {
            Operation::CollectMessages => "messages",
            Operation::CollectChats | Operation::Sync => "chats",
        };
        match self.requested {
            Some(max) => write!(f, "{}: {}/{} {unit}", self.operation, self.processed, max)?,
            None => write!(f, "{}: {} {unit}", self.operation, self.processed)?,
        }
        write!(
            f,
            " ({} chat records, {} messages, {} skipped, {} dead-lettered), {}",
            self.chats, self.messages, self.skipped, self.dead_lettered, self.termination
        )
    }
}

fn as_millis<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}
