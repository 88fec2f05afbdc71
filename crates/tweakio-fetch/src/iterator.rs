// SPDX-FileCopyrightText: 2026 Tweakio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Generic pull loop shared by the chat and message fetchers.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use tweakio_config::model::FetchConfig;
use tweakio_core::TweakioError;
use tweakio_ratelimit::{Decision, RateLimiter};

/// One collaborator call per index.
#[async_trait]
pub trait Puller: Send + Sync {
    type Item: Send;

    /// Fetch the unit at `index`, or `None` when the list is exhausted.
    async fn pull(&self, index: usize) -> Result<Option<Self::Item>, TweakioError>;

    /// Rate limiter key consulted before each pull.
    fn limiter_key(&self) -> &str;

    /// Whether a pulled item is handed to the caller. Rejected items still
    /// advance the cursor and still cost an admission.
    fn accept(&self, _item: &Self::Item) -> bool {
        true
    }
}

/// Why a fetch sequence stopped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum FetchEnd {
    /// The caller's maximum was reached.
    MaxReached,
    /// The collaborator had nothing more.
    Exhausted,
    /// The limiter refused further pulls for this run.
    RateLimited {
        #[serde(rename = "retry_after_ms", serialize_with = "as_millis")]
        retry_after: Duration,
    },
    /// The caller cancelled.
    Cancelled,
    /// The collaborator kept failing beyond the retry budget.
    CollaboratorFailure { message: String, yielded: usize },
}

impl FetchEnd {
    /// Max reached or exhausted.
    pub fn is_normal(&self) -> bool {
        matches!(self, Self::MaxReached | Self::Exhausted)
    }

    /// The abnormal ends as an error, for callers that want one.
    pub fn into_error(self, key: &str) -> Option<TweakioError> {
        match self {
            Self::MaxReached | Self::Exhausted | Self::Cancelled => None,
            Self::RateLimited { retry_after } => Some(TweakioError::RateLimited {
                key: key.to_string(),
                retry_after,
            }),
            Self::CollaboratorFailure { message, yielded } => {
                Some(TweakioError::CollaboratorFailure { message, yielded })
            }
        }
    }
}

fn as_millis<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

/// Result of a single [`FetchIterator::next`] call.
#[derive(Debug)]
pub enum Step<T> {
    Item(T),
    End(FetchEnd),
}

/// Everything a drained iterator produced.
#[derive(Debug)]
pub struct Fetched<T> {
    pub items: Vec<T>,
    pub end: FetchEnd,
    /// Cursor to pass as `start` to resume after the last pulled unit.
    pub cursor: usize,
}

/// Bounds and retry budget of one fetch.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Maximum yielded items. `None` pulls until exhausted.
    pub max: Option<usize>,
    /// Collaborator index to start from.
    pub start: usize,
    /// Retries of a transiently failing pull.
    pub retry_attempts: u32,
    /// First retry backoff; doubles per retry.
    pub retry_backoff: Duration,
}

impl FetchOptions {
    pub fn from_config(config: &FetchConfig) -> Self {
        Self {
            max: None,
            start: 0,
            retry_attempts: config.retry_attempts,
            retry_backoff: config.retry_backoff(),
        }
    }

    pub fn with_max(mut self, max: usize) -> Self {
        self.max = Some(max);
        self
    }

    pub fn starting_at(mut self, cursor: usize) -> Self {
        self.start = cursor;
        self
    }
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self::from_config(&FetchConfig::default())
    }
}

/// A cancellable, resumable, rate-limited pull sequence.
///
/// Nothing is fetched until [`next`](Self::next) is awaited. Once an end
/// condition is reached every further call returns the same end.
pub struct FetchIterator<P: Puller> {
    puller: P,
    limiter: Arc<RateLimiter>,
    cancel: CancellationToken,
    options: FetchOptions,
    cursor: usize,
    yielded: usize,
    end: Option<FetchEnd>,
}

impl<P: Puller> FetchIterator<P> {
    pub fn from_puller(puller: P, limiter: Arc<RateLimiter>, options: FetchOptions) -> Self {
        Self {
            cursor: options.start,
            puller,
            limiter,
            cancel: CancellationToken::new(),
            options,
            yielded: 0,
            end: None,
        }
    }

    /// Stop at the next suspend point once `cancel` fires.
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Resume from `cursor` instead of the top of the list.
    ///
    /// Meant for a fresh iterator; a finished one stays finished.
    pub fn starting_at(mut self, cursor: usize) -> Self {
        self.cursor = cursor;
        self.options.start = cursor;
        self
    }

    /// Index of the next collaborator unit to pull.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn yielded(&self) -> usize {
        self.yielded
    }

    pub fn end(&self) -> Option<&FetchEnd> {
        self.end.as_ref()
    }

    pub fn puller(&self) -> &P {
        &self.puller
    }

    /// Pull the next accepted item.
    pub async fn next(&mut self) -> Step<P::Item> {
        if let Some(end) = &self.end {
            return Step::End(end.clone());
        }

        loop {
            if self.cancel.is_cancelled() {
                return self.finish(FetchEnd::Cancelled);
            }
            if self.options.max.is_some_and(|max| self.yielded >= max) {
                return self.finish(FetchEnd::MaxReached);
            }
            if let Err(end) = self.admit().await {
                return self.finish(end);
            }

            match self.pull_with_retry().await {
                Ok(Some(item)) => {
                    self.cursor += 1;
                    if !self.puller.accept(&item) {
                        continue;
                    }
                    self.yielded += 1;
                    return Step::Item(item);
                }
                Ok(None) => return self.finish(FetchEnd::Exhausted),
                Err(end) => return self.finish(end),
            }
        }
    }

    /// Drain into a vector.
    pub async fn collect(mut self) -> Fetched<P::Item> {
        let mut items = Vec::new();
        loop {
            match self.next().await {
                Step::Item(item) => items.push(item),
                Step::End(end) => {
                    return Fetched {
                        items,
                        end,
                        cursor: self.cursor,
                    };
                }
            }
        }
    }

    /// Wait for admission. `Delay` sleeps and asks again.
    async fn admit(&self) -> Result<(), FetchEnd> {
        let key = self.puller.limiter_key();
        loop {
            match self.limiter.admit(key) {
                Decision::Allow => return Ok(()),
                Decision::Delay(wait) => {
                    debug!(key, wait_ms = wait.as_millis() as u64, "fetch waiting for admission");
                    tokio::select! {
                        biased;
                        _ = self.cancel.cancelled() => return Err(FetchEnd::Cancelled),
                        _ = tokio::time::sleep(wait) => {}
                    }
                }
                Decision::Reject { retry_after } => {
                    info!(
                        key,
                        yielded = self.yielded,
                        retry_after_ms = retry_after.as_millis() as u64,
                        "fetch stopped by rate limiter"
                    );
                    return Err(FetchEnd::RateLimited { retry_after });
                }
            }
        }
    }

    async fn pull_with_retry(&self) -> Result<Option<P::Item>, FetchEnd> {
        let mut retries: u32 = 0;
        loop {
            let result = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(FetchEnd::Cancelled),
                result = self.puller.pull(self.cursor) => result,
            };

            match result {
                Ok(item) => return Ok(item),
                Err(e) if e.is_transient() && retries < self.options.retry_attempts => {
                    let delay = self
                        .options
                        .retry_backoff
                        .saturating_mul(1u32 << retries.min(16));
                    retries += 1;
                    warn!(
                        index = self.cursor,
                        attempt = retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "collaborator call failed, retrying"
                    );
                    tokio::select! {
                        biased;
                        _ = self.cancel.cancelled() => return Err(FetchEnd::Cancelled),
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                Err(e) => {
                    warn!(
                        index = self.cursor,
                        yielded = self.yielded,
                        error = %e,
                        "collaborator failure, abandoning fetch"
                    );
                    return Err(FetchEnd::CollaboratorFailure {
                        message: e.to_string(),
                        yielded: self.yielded,
                    });
                }
            }
        }
    }

    fn finish(&mut self, end: FetchEnd) -> Step<P::Item> {
        debug!(
            key = self.puller.limiter_key(),
            yielded = self.yielded,
            cursor = self.cursor,
            ?end,
            "fetch ended"
        );
        self.end = Some(end.clone());
        Step::End(end)
    }
}
