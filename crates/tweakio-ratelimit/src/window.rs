// SPDX-FileCopyrightText: 2026 Tweakio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-key window state for fixed and sliding accounting.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::time::Instant;
use tweakio_config::model::{RateLimitConfig, WindowMode};

/// Limit, period and accounting mode applied to one key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RatePolicy {
    pub mode: WindowMode,
    /// Maximum admissions per window. Never below 1.
    pub limit: u32,
    pub period: Duration,
    /// Longest wait answered with `Delay`; anything longer is a `Reject`.
    pub max_delay: Duration,
}

impl RatePolicy {
    pub fn new(mode: WindowMode, limit: u32, period: Duration) -> Self {
        Self {
            mode,
            limit: limit.max(1),
            period,
            max_delay: period,
        }
    }

    pub fn fixed(limit: u32, period: Duration) -> Self {
        Self::new(WindowMode::Fixed, limit, period)
    }

    pub fn sliding(limit: u32, period: Duration) -> Self {
        Self::new(WindowMode::Sliding, limit, period)
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.mode, config.limit, config.period()).with_max_delay(config.max_delay())
    }
}

/// Point-in-time view of a key's window, for status output and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowSnapshot {
    pub key: String,
    pub mode: WindowMode,
    pub window_start: Instant,
    pub count: u32,
    pub limit: u32,
    pub period: Duration,
}

/// Admission state for one key.
///
/// Fixed windows keep a start instant and a counter. Sliding windows keep the
/// instants of admissions inside the trailing period, never more than `limit`.
#[derive(Debug)]
pub struct RateWindow {
    policy: RatePolicy,
    window_start: Instant,
    count: u32,
    admitted: VecDeque<Instant>,
}

impl RateWindow {
    pub fn new(policy: RatePolicy, now: Instant) -> Self {
        let admitted = match policy.mode {
            WindowMode::Fixed => VecDeque::new(),
            WindowMode::Sliding => VecDeque::with_capacity(policy.limit as usize),
        };
        Self {
            policy,
            window_start: now,
            count: 0,
            admitted,
        }
    }

    pub fn policy(&self) -> &RatePolicy {
        &self.policy
    }

    /// Record an admission at `now` if the window has room.
    ///
    /// Returns the wait until a slot frees up otherwise. Nothing is recorded
    /// for a refused call.
    pub fn try_admit(&mut self, now: Instant) -> Result<(), Duration> {
        match self.policy.mode {
            WindowMode::Fixed => {
                self.rotate(now);
                if self.count < self.policy.limit {
                    self.count += 1;
                    Ok(())
                } else {
                    let elapsed = now.saturating_duration_since(self.window_start);
                    Err(self.policy.period.saturating_sub(elapsed))
                }
            }
            WindowMode::Sliding => {
                self.prune(now);
                if (self.admitted.len() as u32) < self.policy.limit {
                    self.admitted.push_back(now);
                    Ok(())
                } else {
                    let oldest = self.admitted.front().copied().unwrap_or(now);
                    let age = now.saturating_duration_since(oldest);
                    Err(self.policy.period.saturating_sub(age))
                }
            }
        }
    }

    /// Admissions still available at `now`.
    pub fn remaining(&mut self, now: Instant) -> u32 {
        self.policy.limit.saturating_sub(self.count_at(now))
    }

    pub fn snapshot(&mut self, key: &str, now: Instant) -> WindowSnapshot {
        let count = self.count_at(now);
        let window_start = match self.policy.mode {
            WindowMode::Fixed => self.window_start,
            WindowMode::Sliding => self.admitted.front().copied().unwrap_or(now),
        };
        WindowSnapshot {
            key: key.to_string(),
            mode: self.policy.mode,
            window_start,
            count,
            limit: self.policy.limit,
            period: self.policy.period,
        }
    }

    /// True once the window holds nothing a fresh window at `now` would not.
    pub fn is_idle(&self, now: Instant) -> bool {
        let period = self.policy.period;
        match self.policy.mode {
            WindowMode::Fixed => now.saturating_duration_since(self.window_start) >= period,
            WindowMode::Sliding => self
                .admitted
                .back()
                .is_none_or(|&t| now.saturating_duration_since(t) >= period),
        }
    }

    fn count_at(&mut self, now: Instant) -> u32 {
        match self.policy.mode {
            WindowMode::Fixed => {
                self.rotate(now);
                self.count
            }
            WindowMode::Sliding => {
                self.prune(now);
                self.admitted.len() as u32
            }
        }
    }

    /// Reset a fixed window once `period` has elapsed since it opened.
    fn rotate(&mut self, now: Instant) {
        if now.saturating_duration_since(self.window_start) >= self.policy.period {
            self.window_start = now;
            self.count = 0;
        }
    }

    /// Evict admissions that fell out of the trailing period.
    fn prune(&mut self, now: Instant) {
        let period = self.policy.period;
        while self
            .admitted
            .front()
            .is_some_and(|&t| now.saturating_duration_since(t) >= period)
        {
            self.admitted.pop_front();
        }
    }
}
