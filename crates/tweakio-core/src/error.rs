// SPDX-FileCopyrightText: 2026 Tweakio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the tweakio capture pipeline.

use std::time::Duration;

use thiserror::Error;

/// The primary error type used across collaborator traits and core operations.
#[derive(Debug, Error)]
pub enum TweakioError {
    /// Configuration errors (invalid TOML, out-of-range values, unknown keys).
    #[error("configuration error: {0}")]
    Config(String),

    /// A retryable I/O hiccup in storage or in the scraping collaborator.
    #[error("transient I/O error: {message}")]
    TransientIo {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The rate limiter refused further work for this run.
    #[error("rate limited on `{key}`, retry after {retry_after:?}")]
    RateLimited { key: String, retry_after: Duration },

    /// A record was offered to the persistence queue after shutdown began.
    #[error("persistence queue is closed")]
    QueueClosed,

    /// A record could not be persisted after exhausting its retry budget.
    #[error("failed to persist {key} after {attempts} attempts: {message}")]
    PersistenceFailure {
        key: String,
        attempts: u32,
        message: String,
    },

    /// The scraping collaborator kept failing beyond the retry budget.
    #[error("collaborator failure after {yielded} items: {message}")]
    CollaboratorFailure { message: String, yielded: usize },

    /// Non-retryable storage backend errors (schema, constraint, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Non-retryable scraping source errors (missing element, bad handle).
    #[error("source error: {message}")]
    Source {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl TweakioError {
    /// Build a [`TweakioError::TransientIo`] from a message alone.
    pub fn transient(message: impl Into<String>) -> Self {
        Self::TransientIo {
            message: message.into(),
            source: None,
        }
    }

    /// Build a [`TweakioError::Source`] from a message alone.
    pub fn source_failure(message: impl Into<String>) -> Self {
        Self::Source {
            message: message.into(),
            source: None,
        }
    }

    /// Whether a retry of the same operation may succeed.
    ///
    /// Only transient I/O and timeouts qualify. Everything else is routed
    /// straight to the caller's failure path (dead-letter, partial report).
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::TransientIo { .. } | Self::Timeout { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(TweakioError::transient("database is locked").is_transient());
        assert!(
            TweakioError::Timeout {
                duration: Duration::from_secs(1)
            }
            .is_transient()
        );
        assert!(!TweakioError::QueueClosed.is_transient());
        assert!(!TweakioError::source_failure("no such element").is_transient());
        assert!(
            !TweakioError::Storage {
                source: Box::new(std::io::Error::other("constraint"))
            }
            .is_transient()
        );
    }

    #[test]
    fn display_includes_context() {
        let err = TweakioError::PersistenceFailure {
            key: "wa::alice/wa-msg::1".into(),
            attempts: 4,
            message: "disk full".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("wa::alice/wa-msg::1"));
        assert!(msg.contains("4 attempts"));

        let err = TweakioError::CollaboratorFailure {
            message: "page crashed".into(),
            yielded: 3,
        };
        assert_eq!(err.to_string(), "collaborator failure after 3 items: page crashed");
    }
}
