// SPDX-FileCopyrightText: 2026 Tweakio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Keyed rate limiter.
//!
//! Windows live in a [`DashMap`]; every decision for a key is taken while
//! holding that key's entry, so two concurrent callers can never both observe
//! the same pre-increment count.
//!
//! Per-chat scope creates a window per chat. Windows whose admissions have all
//! expired are swept every [`SWEEP_EVERY`] admissions, so the map is bounded by
//! the keys active within one period rather than every key ever seen.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;
use tracing::{debug, warn};
use tweakio_config::model::{RateLimitConfig, RateScope};
use tweakio_core::ChatId;

use crate::window::{RatePolicy, RateWindow, WindowSnapshot};

/// Answer to one proposed operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Proceed now. The admission has been counted.
    Allow,
    /// Wait exactly this long, then ask again. Nothing was counted.
    Delay(Duration),
    /// The wait exceeds the policy's `max_delay`; stop for this run.
    Reject { retry_after: Duration },
}

impl Decision {
    pub fn is_allow(&self) -> bool {
        matches!(self, Self::Allow)
    }
}

/// Admissions between two automatic idle sweeps.
pub const SWEEP_EVERY: u64 = 1024;

/// Per-key fixed/sliding window limiter.
pub struct RateLimiter {
    default_policy: RatePolicy,
    overrides: DashMap<String, RatePolicy>,
    windows: DashMap<String, RateWindow>,
    scope: RateScope,
    admits: AtomicU64,
}

impl RateLimiter {
    pub fn new(default_policy: RatePolicy) -> Self {
        Self {
            default_policy,
            overrides: DashMap::new(),
            windows: DashMap::new(),
            scope: RateScope::Global,
            admits: AtomicU64::new(0),
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(RatePolicy::from_config(config)).with_scope(config.scope)
    }

    pub fn with_scope(mut self, scope: RateScope) -> Self {
        self.scope = scope;
        self
    }

    /// Give `key` its own policy instead of the default.
    pub fn with_policy(self, key: impl Into<String>, policy: RatePolicy) -> Self {
        self.set_policy(key, policy);
        self
    }

    /// Replace the policy for `key`. Its window restarts on the next admit.
    pub fn set_policy(&self, key: impl Into<String>, policy: RatePolicy) {
        let key = key.into();
        self.windows.remove(&key);
        self.overrides.insert(key, policy);
    }

    pub fn scope(&self) -> RateScope {
        self.scope
    }

    /// Concrete limiter key for an operation class, honoring the scope.
    ///
    /// With per-chat scope, `message-scan` for chat `wa::bob` becomes
    /// `message-scan:wa::bob`; calls without a chat stay on the base key.
    pub fn scoped_key(&self, base: &str, chat: Option<&ChatId>) -> String {
        match (self.scope, chat) {
            (RateScope::PerChat, Some(chat)) => format!("{base}:{chat}"),
            _ => base.to_string(),
        }
    }

    pub fn policy_for(&self, key: &str) -> RatePolicy {
        self.overrides
            .get(key)
            .map(|p| *p)
            .unwrap_or(self.default_policy)
    }

    pub fn admit(&self, key: &str) -> Decision {
        self.admit_at(key, Instant::now())
    }

    /// Decide for `key` as if the current time were `now`.
    pub fn admit_at(&self, key: &str, now: Instant) -> Decision {
        let policy = self.policy_for(key);
        let outcome = self
            .windows
            .entry(key.to_string())
            .or_insert_with(|| RateWindow::new(policy, now))
            .try_admit(now);

        // The entry guard is released above; retain would deadlock on it.
        if self.admits.fetch_add(1, Ordering::Relaxed) % SWEEP_EVERY == SWEEP_EVERY - 1 {
            self.evict_idle_at(now);
        }

        match outcome {
            Ok(()) => {
                debug!(key, "admitted");
                Decision::Allow
            }
            Err(wait) if wait <= policy.max_delay => {
                debug!(key, wait_ms = wait.as_millis() as u64, "admission delayed");
                Decision::Delay(wait)
            }
            Err(wait) => {
                warn!(
                    key,
                    retry_after_ms = wait.as_millis() as u64,
                    max_delay_ms = policy.max_delay.as_millis() as u64,
                    "admission rejected"
                );
                Decision::Reject { retry_after: wait }
            }
        }
    }

    /// Admissions left in the current window. Unseen keys report the full limit.
    pub fn remaining(&self, key: &str) -> u32 {
        self.remaining_at(key, Instant::now())
    }

    pub fn remaining_at(&self, key: &str, now: Instant) -> u32 {
        match self.windows.get_mut(key) {
            Some(mut w) => w.remaining(now),
            None => self.policy_for(key).limit,
        }
    }

    pub fn window(&self, key: &str) -> Option<WindowSnapshot> {
        self.windows
            .get_mut(key)
            .map(|mut w| w.snapshot(key, Instant::now()))
    }

    /// Forget all admissions for `key`.
    pub fn reset(&self, key: &str) {
        self.windows.remove(key);
    }

    pub fn tracked_keys(&self) -> usize {
        self.windows.len()
    }

    /// Drop windows that would admit exactly like fresh ones. Returns how
    /// many were dropped.
    pub fn evict_idle(&self) -> usize {
        self.evict_idle_at(Instant::now())
    }

    pub fn evict_idle_at(&self, now: Instant) -> usize {
        let mut evicted = 0;
        self.windows.retain(|_, window| {
            let idle = window.is_idle(now);
            evicted += usize::from(idle);
            !idle
        });
        if evicted > 0 {
            debug!(evicted, tracked = self.windows.len(), "idle rate windows evicted");
        }
        evicted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_call_for_unseen_key_is_allowed() {
        let limiter = RateLimiter::new(RatePolicy::fixed(1, Duration::from_secs(60)));
        assert_eq!(limiter.tracked_keys(), 0);
        assert_eq!(limiter.admit("chat-scan"), Decision::Allow);
        assert_eq!(limiter.tracked_keys(), 1);
    }

    #[test]
    fn keys_are_independent() {
        let limiter = RateLimiter::new(RatePolicy::fixed(1, Duration::from_secs(60)));
        let t0 = Instant::now();
        assert!(limiter.admit_at("a", t0).is_allow());
        assert!(!limiter.admit_at("a", t0).is_allow());
        assert!(limiter.admit_at("b", t0).is_allow());
    }

    #[test]
    fn wait_beyond_max_delay_is_rejected() {
        let policy =
            RatePolicy::fixed(1, Duration::from_secs(60)).with_max_delay(Duration::from_secs(5));
        let limiter = RateLimiter::new(policy);
        let t0 = Instant::now();
        assert!(limiter.admit_at("k", t0).is_allow());
        assert_eq!(
            limiter.admit_at("k", t0 + Duration::from_secs(10)),
            Decision::Reject {
                retry_after: Duration::from_secs(50)
            }
        );
        assert_eq!(
            limiter.admit_at("k", t0 + Duration::from_secs(57)),
            Decision::Delay(Duration::from_secs(3))
        );
    }

    #[test]
    fn per_key_policy_overrides_default() {
        let limiter = RateLimiter::new(RatePolicy::fixed(1, Duration::from_secs(60)))
            .with_policy("burst", RatePolicy::fixed(3, Duration::from_secs(60)));
        let t0 = Instant::now();
        for _ in 0..3 {
            assert!(limiter.admit_at("burst", t0).is_allow());
        }
        assert!(!limiter.admit_at("burst", t0).is_allow());
        assert_eq!(limiter.remaining_at("other", t0), 1);
    }

    #[test]
    fn scoped_key_follows_scope() {
        let chat = ChatId::from_name("Bob");
        let global = RateLimiter::new(RatePolicy::fixed(1, Duration::from_secs(1)));
        assert_eq!(global.scoped_key("message-scan", Some(&chat)), "message-scan");

        let per_chat = RateLimiter::new(RatePolicy::fixed(1, Duration::from_secs(1)))
            .with_scope(RateScope::PerChat);
        assert_eq!(
            per_chat.scoped_key("message-scan", Some(&chat)),
            "message-scan:wa::bob"
        );
        assert_eq!(per_chat.scoped_key("chat-scan", None), "chat-scan");
    }

    #[test]
    fn reset_forgets_admissions() {
        let limiter = RateLimiter::new(RatePolicy::fixed(1, Duration::from_secs(60)));
        let t0 = Instant::now();
        assert!(limiter.admit_at("k", t0).is_allow());
        assert!(!limiter.admit_at("k", t0).is_allow());
        limiter.reset("k");
        assert!(limiter.admit_at("k", t0).is_allow());
    }

    #[test]
    fn idle_per_chat_windows_are_evicted() {
        let period = Duration::from_secs(10);
        let limiter =
            RateLimiter::new(RatePolicy::fixed(1, period)).with_scope(RateScope::PerChat);
        let t0 = Instant::now();
        for i in 0..50 {
            let chat = ChatId::from_name(&format!("chat-{i}"));
            let key = limiter.scoped_key("message-scan", Some(&chat));
            assert!(limiter.admit_at(&key, t0).is_allow());
        }
        assert_eq!(limiter.tracked_keys(), 50);

        assert_eq!(limiter.evict_idle_at(t0 + Duration::from_secs(5)), 0);
        assert_eq!(limiter.evict_idle_at(t0 + period), 50);
        assert_eq!(limiter.tracked_keys(), 0);
    }

    #[test]
    fn sweep_runs_automatically_and_keeps_live_windows() {
        let period = Duration::from_secs(1);
        let limiter = RateLimiter::new(RatePolicy::fixed(1, period));
        let t0 = Instant::now();
        for i in 0..SWEEP_EVERY - 2 {
            assert!(limiter.admit_at(&format!("k{i}"), t0).is_allow());
        }
        let later = t0 + Duration::from_secs(2);
        assert!(limiter.admit_at("live", later).is_allow());
        assert_eq!(limiter.tracked_keys(), SWEEP_EVERY as usize - 1);

        // The sweep fires on this admission and drops every stale window.
        assert!(!limiter.admit_at("live", later).is_allow());
        assert_eq!(limiter.tracked_keys(), 1);
        assert_eq!(limiter.remaining_at("live", later), 0);
    }

    #[test]
    #[tracing_test::traced_test]
    fn rejection_is_logged() {
        let policy =
            RatePolicy::fixed(1, Duration::from_secs(10)).with_max_delay(Duration::from_secs(1));
        let limiter = RateLimiter::new(policy);
        let t0 = Instant::now();
        assert!(limiter.admit_at("chat-scan", t0).is_allow());
        assert!(matches!(
            limiter.admit_at("chat-scan", t0),
            Decision::Reject { .. }
        ));
        assert!(logs_contain("admission rejected"));
    }
}
