// SPDX-FileCopyrightText: 2026 Tweakio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the tweakio capture pipeline.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level tweakio configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TweakioConfig {
    /// Logging settings.
    #[serde(default)]
    pub log: LogConfig,

    /// Admission control for scraping calls.
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Write-behind persistence queue settings.
    #[serde(default)]
    pub queue: QueueConfig,

    /// Chat and message fetching settings.
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LogConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// How admissions are counted inside a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowMode {
    /// Count resets entirely once `period` has elapsed since the window opened.
    #[default]
    Fixed,
    /// Count covers the trailing `period` from now.
    Sliding,
}

/// Whether one window is shared by every chat or kept per chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RateScope {
    #[default]
    Global,
    PerChat,
}

/// Rate limiter configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RateLimitConfig {
    /// Window accounting mode.
    #[serde(default)]
    pub mode: WindowMode,

    /// Maximum admitted operations per window.
    #[serde(default = "default_limit")]
    pub limit: u32,

    /// Window length in seconds.
    #[serde(default = "default_period")]
    pub period: u64,

    /// Longest wait, in seconds, answered with `Delay` instead of `Reject`.
    #[serde(default = "default_max_delay")]
    pub max_delay: u64,

    /// Key scope for admissions.
    #[serde(default)]
    pub scope: RateScope,
}

impl RateLimitConfig {
    pub fn period(&self) -> Duration {
        Duration::from_secs(self.period)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_secs(self.max_delay)
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            mode: WindowMode::default(),
            limit: default_limit(),
            period: default_period(),
            max_delay: default_max_delay(),
            scope: RateScope::default(),
        }
    }
}

fn default_limit() -> u32 {
    30
}

fn default_period() -> u64 {
    60
}

fn default_max_delay() -> u64 {
    30
}

/// Persistence queue configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct QueueConfig {
    /// Maximum records held before `enqueue` applies backpressure. 0 = unbounded.
    #[serde(default)]
    pub capacity: usize,

    /// Number of background writer workers (chat-id shards).
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Retries after the first failed write attempt before dead-lettering.
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,

    /// Initial retry backoff in milliseconds; doubles per attempt.
    #[serde(default = "default_backoff_base")]
    pub backoff_base: u64,

    /// Upper bound for a single retry backoff in milliseconds.
    #[serde(default = "default_backoff_max")]
    pub backoff_max: u64,

    /// Backlog size that triggers a warning when the queue is unbounded.
    #[serde(default = "default_warn_backlog")]
    pub warn_backlog: usize,

    /// Seconds to wait for the backlog to drain on shutdown.
    #[serde(default = "default_drain_deadline")]
    pub drain_deadline: u64,

    /// Most records a worker writes in one store transaction.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Milliseconds a worker waits to fill a partial batch before writing it.
    #[serde(default = "default_flush_interval")]
    pub flush_interval: u64,
}

impl QueueConfig {
    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base)
    }

    pub fn backoff_max(&self) -> Duration {
        Duration::from_millis(self.backoff_max)
    }

    pub fn drain_deadline(&self) -> Duration {
        Duration::from_secs(self.drain_deadline)
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval)
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: 0,
            workers: default_workers(),
            retry_attempts: default_retry_attempts(),
            backoff_base: default_backoff_base(),
            backoff_max: default_backoff_max(),
            warn_backlog: default_warn_backlog(),
            drain_deadline: default_drain_deadline(),
            batch_size: default_batch_size(),
            flush_interval: default_flush_interval(),
        }
    }
}

fn default_workers() -> usize {
    2
}

fn default_retry_attempts() -> u32 {
    5
}

fn default_backoff_base() -> u64 {
    100
}

fn default_backoff_max() -> u64 {
    5_000
}

fn default_warn_backlog() -> usize {
    10_000
}

fn default_drain_deadline() -> u64 {
    30
}

fn default_batch_size() -> usize {
    32
}

fn default_flush_interval() -> u64 {
    50
}

/// Which messages a fetch yields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DirectionFilter {
    #[default]
    All,
    Incoming,
    Outgoing,
}

/// Fetch configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FetchConfig {
    /// Default chat enumeration cap (`MaxChat`).
    #[serde(default = "default_max_chats")]
    pub max_chats: usize,

    /// Per-chat message cap. 0 = no cap.
    #[serde(default)]
    pub max_messages: usize,

    /// Retries of a failing collaborator call before the fetch is abandoned.
    #[serde(default = "default_fetch_retry_attempts")]
    pub retry_attempts: u32,

    /// Initial collaborator retry backoff in milliseconds; doubles per attempt.
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff: u64,

    /// Rate limiter key for chat enumeration.
    #[serde(default = "default_chat_key")]
    pub chat_key: String,

    /// Rate limiter key for message fetching.
    #[serde(default = "default_message_key")]
    pub message_key: String,

    /// Skip messages whose key is already durably stored.
    #[serde(default = "default_skip_persisted")]
    pub skip_persisted: bool,

    /// Direction filter applied to fetched messages.
    #[serde(default)]
    pub direction: DirectionFilter,
}

impl FetchConfig {
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff)
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_chats: default_max_chats(),
            max_messages: 0,
            retry_attempts: default_fetch_retry_attempts(),
            retry_backoff: default_retry_backoff(),
            chat_key: default_chat_key(),
            message_key: default_message_key(),
            skip_persisted: default_skip_persisted(),
            direction: DirectionFilter::default(),
        }
    }
}

fn default_max_chats() -> usize {
    20
}

fn default_fetch_retry_attempts() -> u32 {
    3
}

fn default_retry_backoff() -> u64 {
    250
}

fn default_chat_key() -> String {
    "chat-scan".to_string()
}

fn default_message_key() -> String {
    "message-scan".to_string()
}

fn default_skip_persisted() -> bool {
    true
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    "tweakio.db".to_string()
}

fn default_wal_mode() -> bool {
    true
}
