// SPDX-FileCopyrightText: 2026 Tweakio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Window-based admission control for scraping calls.
//!
//! [`RateLimiter`] keeps one [`RateWindow`] per logical key and answers each
//! proposed operation with a [`Decision`]. The limiter never sleeps; callers
//! honor `Delay` themselves so the limiter stays non-blocking and testable
//! under paused time.

pub mod limiter;
pub mod window;

pub use limiter::{Decision, RateLimiter};
pub use window::{RatePolicy, RateWindow, WindowSnapshot};
