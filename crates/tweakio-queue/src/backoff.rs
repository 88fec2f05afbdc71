// SPDX-FileCopyrightText: 2026 Tweakio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bounded exponential backoff.

use std::time::Duration;

use tweakio_config::model::QueueConfig;

/// `base * 2^attempt`, never more than `max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub base: Duration,
    pub max: Duration,
}

impl Backoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max: max.max(base),
        }
    }

    pub fn from_config(config: &QueueConfig) -> Self {
        Self::new(config.backoff_base(), config.backoff_max())
    }

    /// Delay before retry number `attempt` (0-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base
            .checked_mul(factor)
            .map_or(self.max, |d| d.min(self.max))
    }
}
