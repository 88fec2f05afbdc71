// SPDX-FileCopyrightText: 2026 Tweakio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde attributes,
//! such as non-zero window sizes, worker bounds, and non-empty keys.

use crate::diagnostic::ConfigError;
use crate::model::TweakioConfig;

/// Upper bound on `rate_limit.max_delay` (24 hours).
const MAX_DELAY_CEILING_SECS: u64 = 24 * 60 * 60;

const MAX_WORKERS: usize = 64;

const MAX_BATCH_SIZE: usize = 1_000;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &TweakioConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut fail = |message: String| errors.push(ConfigError::Validation { message });

    if !LOG_LEVELS.contains(&config.log.level.trim().to_lowercase().as_str()) {
        fail(format!(
            "log.level `{}` is not one of {}",
            config.log.level,
            LOG_LEVELS.join(", ")
        ));
    }

    let rl = &config.rate_limit;
    if rl.limit < 1 {
        fail(format!("rate_limit.limit must be at least 1, got {}", rl.limit));
    }
    if rl.period < 1 {
        fail(format!("rate_limit.period must be at least 1 second, got {}", rl.period));
    }
    if rl.max_delay > MAX_DELAY_CEILING_SECS {
        fail(format!(
            "rate_limit.max_delay must be at most {MAX_DELAY_CEILING_SECS} seconds, got {}",
            rl.max_delay
        ));
    }

    let q = &config.queue;
    if q.workers < 1 || q.workers > MAX_WORKERS {
        fail(format!(
            "queue.workers must be between 1 and {MAX_WORKERS}, got {}",
            q.workers
        ));
    }
    if q.backoff_max < q.backoff_base {
        fail(format!(
            "queue.backoff_max ({}) must not be smaller than queue.backoff_base ({})",
            q.backoff_max, q.backoff_base
        ));
    }

    if q.batch_size < 1 || q.batch_size > MAX_BATCH_SIZE {
        fail(format!(
            "queue.batch_size must be between 1 and {MAX_BATCH_SIZE}, got {}",
            q.batch_size
        ));
    }

    let f = &config.fetch;
    if f.chat_key.trim().is_empty() {
        fail("fetch.chat_key must not be empty".to_string());
    }
    if f.message_key.trim().is_empty() {
        fail("fetch.message_key must not be empty".to_string());
    }

    if config.storage.database_path.trim().is_empty() {
        fail("storage.database_path must not be empty".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn has_error(errors: &[ConfigError], needle: &str) -> bool {
        errors
            .iter()
            .any(|e| matches!(e, ConfigError::Validation { message } if message.contains(needle)))
    }

    #[test]
    fn default_config_validates() {
        let config = TweakioConfig::default();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn empty_database_path_fails_validation() {
        let mut config = TweakioConfig::default();
        config.storage.database_path = "".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert!(has_error(&errors, "database_path"));
    }

    #[test]
    fn zero_limit_and_period_fail_validation() {
        let mut config = TweakioConfig::default();
        config.rate_limit.limit = 0;
        config.rate_limit.period = 0;
        let errors = validate_config(&config).unwrap_err();
        assert!(has_error(&errors, "rate_limit.limit"));
        assert!(has_error(&errors, "rate_limit.period"));
    }

    #[test]
    fn worker_bounds_are_enforced() {
        let mut config = TweakioConfig::default();
        config.queue.workers = 0;
        assert!(has_error(&validate_config(&config).unwrap_err(), "queue.workers"));

        config.queue.workers = 65;
        assert!(has_error(&validate_config(&config).unwrap_err(), "queue.workers"));

        config.queue.workers = 64;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn batch_size_bounds_are_enforced() {
        let mut config = TweakioConfig::default();
        config.queue.batch_size = 0;
        assert!(has_error(&validate_config(&config).unwrap_err(), "queue.batch_size"));

        config.queue.batch_size = 1;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn inverted_backoff_fails_validation() {
        let mut config = TweakioConfig::default();
        config.queue.backoff_base = 1_000;
        config.queue.backoff_max = 10;
        let errors = validate_config(&config).unwrap_err();
        assert!(has_error(&errors, "backoff_max"));
    }

    #[test]
    fn all_errors_are_collected() {
        let mut config = TweakioConfig::default();
        config.log.level = "loud".into();
        config.fetch.chat_key = " ".into();
        config.fetch.message_key = String::new();
        config.rate_limit.max_delay = MAX_DELAY_CEILING_SECS + 1;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 4);
    }
}
