// SPDX-FileCopyrightText: 2026 Tweakio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Capture pipeline for the tweakio framework.
//!
//! The [`Coordinator`] is the central driver that:
//! - Walks the chat list and each chat's messages through rate-limited fetchers
//! - Skips messages that are already durably stored
//! - Hands every scraped unit to the write-behind persistence queue
//! - Flushes at the end of a run, or drains with a deadline when cancelled
//! - Reports a [`RunSummary`] for every run

pub mod coordinator;
pub mod shutdown;
pub mod summary;

pub use coordinator::Coordinator;
pub use shutdown::install_signal_handler;
pub use summary::{Operation, RunSummary, Termination};
