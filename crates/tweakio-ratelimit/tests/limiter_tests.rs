// SPDX-FileCopyrightText: 2026 Tweakio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Behavioral tests for the keyed rate limiter.

use std::sync::Arc;
use std::time::Duration;

use proptest::prelude::*;
use tokio::time::Instant;
use tweakio_ratelimit::{Decision, RateLimiter, RatePolicy};

const TEN: Duration = Duration::from_secs(10);

#[test]
fn fixed_window_sixth_admit_is_not_allowed() {
    let limiter = RateLimiter::new(RatePolicy::fixed(5, TEN));
    let t0 = Instant::now();
    for i in 0..5 {
        assert_eq!(
            limiter.admit_at("chat-scan", t0 + Duration::from_secs(i)),
            Decision::Allow,
            "admission {i} should be allowed"
        );
    }
    let sixth = limiter.admit_at("chat-scan", t0 + Duration::from_secs(5));
    assert_ne!(sixth, Decision::Allow);
    assert_eq!(sixth, Decision::Delay(Duration::from_secs(5)));
}

#[test]
fn sliding_window_evicts_admission_after_period() {
    let limiter = RateLimiter::new(RatePolicy::sliding(1, TEN));
    let t0 = Instant::now();
    assert_eq!(limiter.admit_at("k", t0), Decision::Allow);
    assert!(!limiter.admit_at("k", t0 + Duration::from_secs(9)).is_allow());
    assert_eq!(limiter.remaining_at("k", t0 + Duration::from_secs(11)), 1);
    assert_eq!(
        limiter.admit_at("k", t0 + Duration::from_secs(11)),
        Decision::Allow
    );
}

#[test]
fn sliding_window_is_stricter_than_fixed_at_boundaries() {
    let fixed = RateLimiter::new(RatePolicy::fixed(2, TEN));
    let sliding = RateLimiter::new(RatePolicy::sliding(2, TEN));
    let t0 = Instant::now();
    let late = t0 + Duration::from_secs(9);
    let next = t0 + Duration::from_secs(10);

    // One admission early, one late in the first window.
    for limiter in [&fixed, &sliding] {
        assert!(limiter.admit_at("k", t0).is_allow());
        assert!(limiter.admit_at("k", late).is_allow());
    }

    // Fixed resets wholesale; sliding still remembers the late admission.
    assert!(fixed.admit_at("k", next).is_allow());
    assert!(fixed.admit_at("k", next).is_allow());
    assert!(sliding.admit_at("k", next).is_allow());
    assert_eq!(
        sliding.admit_at("k", next),
        Decision::Delay(Duration::from_secs(9))
    );
}

#[tokio::test(start_paused = true)]
async fn delay_then_retry_is_admitted_under_paused_time() {
    let limiter = RateLimiter::new(RatePolicy::fixed(1, TEN));
    assert!(limiter.admit("k").is_allow());
    let Decision::Delay(wait) = limiter.admit("k") else {
        panic!("second admission should be delayed");
    };
    tokio::time::sleep(wait).await;
    assert!(limiter.admit("k").is_allow());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_admits_never_exceed_limit() {
    let limiter = Arc::new(RateLimiter::new(RatePolicy::fixed(10, Duration::from_secs(3600))));
    let now = Instant::now();

    let mut handles = Vec::new();
    for _ in 0..64 {
        let limiter = Arc::clone(&limiter);
        handles.push(tokio::spawn(async move { limiter.admit_at("shared", now) }));
    }

    let mut allowed = 0;
    for handle in handles {
        if handle.await.unwrap().is_allow() {
            allowed += 1;
        }
    }
    assert_eq!(allowed, 10);
    assert_eq!(limiter.remaining_at("shared", now), 0);
}

#[test]
fn window_snapshot_reports_count() {
    let limiter = RateLimiter::new(RatePolicy::fixed(3, Duration::from_secs(3600)));
    assert!(limiter.window("k").is_none());
    limiter.admit("k");
    limiter.admit("k");
    let snap = limiter.window("k").unwrap();
    assert_eq!(snap.key, "k");
    assert_eq!(snap.count, 2);
    assert_eq!(snap.limit, 3);
}

proptest! {
    /// No trailing `period` ever contains more than `limit` sliding admissions.
    #[test]
    fn sliding_never_admits_more_than_limit_per_period(
        limit in 1u32..6,
        period_ms in 50u64..500,
        gaps in prop::collection::vec(0u64..200, 1..80),
    ) {
        let period = Duration::from_millis(period_ms);
        let limiter = RateLimiter::new(RatePolicy::sliding(limit, period));
        let t0 = Instant::now();

        let mut at = t0;
        let mut admitted = Vec::new();
        for gap in gaps {
            at += Duration::from_millis(gap);
            if limiter.admit_at("k", at).is_allow() {
                admitted.push(at);
            }
        }

        for (i, start) in admitted.iter().enumerate() {
            let in_window = admitted[i..]
                .iter()
                .take_while(|t| t.duration_since(*start) < period)
                .count();
            prop_assert!(in_window as u32 <= limit);
        }
    }

    /// A fixed window never admits more than `limit` between resets.
    #[test]
    fn fixed_admits_at_most_limit_without_time_passing(
        limit in 1u32..20,
        calls in 1usize..60,
    ) {
        let limiter = RateLimiter::new(RatePolicy::fixed(limit, TEN));
        let now = Instant::now();
        let allowed = (0..calls).filter(|_| limiter.admit_at("k", now).is_allow()).count();
        prop_assert_eq!(allowed, calls.min(limit as usize));
    }
}
