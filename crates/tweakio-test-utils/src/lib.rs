// SPDX-FileCopyrightText: 2026 Tweakio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for tweakio integration tests.
//!
//! Provides fake collaborators and a harness for fast, deterministic tests
//! without a browser or a database.
//!
//! # Components
//!
//! - [`MockSource`] - Scripted chat/message source with failure injection
//! - [`MemoryStore`] - In-memory durable store with failure injection and write log
//! - [`RecordingObserver`] - Persistence observer that records every event
//! - [`TestHarness`] - Source, store, limiter, queue and coordinator wired together

pub mod harness;
pub mod memory_store;
pub mod mock_source;
pub mod observer;

pub use harness::TestHarness;
pub use memory_store::MemoryStore;
pub use mock_source::{Failure, MockSource};
pub use observer::RecordingObserver;
