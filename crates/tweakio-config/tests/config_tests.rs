// SPDX-FileCopyrightText: 2026 Tweakio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the tweakio configuration system.

use tweakio_config::diagnostic::ConfigError;
use tweakio_config::model::{DirectionFilter, RateScope, TweakioConfig, WindowMode};
use tweakio_config::{load_and_validate_str, load_config_from_str};

/// Valid TOML with all known fields deserializes successfully.
#[test]
fn valid_toml_deserializes_into_tweakio_config() {
    let toml = r#"
[log]
level = "debug"

[rate_limit]
mode = "sliding"
limit = 5
period = 10
max_delay = 2
scope = "per_chat"

[queue]
capacity = 128
workers = 4
retry_attempts = 2
backoff_base = 50
backoff_max = 400
warn_backlog = 64
drain_deadline = 5
batch_size = 8
flush_interval = 20

[fetch]
max_chats = 7
max_messages = 100
retry_attempts = 1
retry_backoff = 10
chat_key = "chats"
message_key = "messages"
skip_persisted = false
direction = "incoming"

[storage]
database_path = "/tmp/capture.db"
wal_mode = false
"#;

    let config = load_config_from_str(toml).expect("valid TOML should deserialize");
    assert_eq!(config.log.level, "debug");
    assert_eq!(config.rate_limit.mode, WindowMode::Sliding);
    assert_eq!(config.rate_limit.limit, 5);
    assert_eq!(config.rate_limit.period().as_secs(), 10);
    assert_eq!(config.rate_limit.max_delay().as_secs(), 2);
    assert_eq!(config.rate_limit.scope, RateScope::PerChat);
    assert_eq!(config.queue.capacity, 128);
    assert_eq!(config.queue.workers, 4);
    assert_eq!(config.queue.retry_attempts, 2);
    assert_eq!(config.queue.backoff_base().as_millis(), 50);
    assert_eq!(config.queue.backoff_max().as_millis(), 400);
    assert_eq!(config.queue.warn_backlog, 64);
    assert_eq!(config.queue.drain_deadline().as_secs(), 5);
    assert_eq!(config.queue.batch_size, 8);
    assert_eq!(config.queue.flush_interval().as_millis(), 20);
    assert_eq!(config.fetch.max_chats, 7);
    assert_eq!(config.fetch.max_messages, 100);
    assert_eq!(config.fetch.retry_attempts, 1);
    assert_eq!(config.fetch.retry_backoff().as_millis(), 10);
    assert_eq!(config.fetch.chat_key, "chats");
    assert_eq!(config.fetch.message_key, "messages");
    assert!(!config.fetch.skip_persisted);
    assert_eq!(config.fetch.direction, DirectionFilter::Incoming);
    assert_eq!(config.storage.database_path, "/tmp/capture.db");
    assert!(!config.storage.wal_mode);
}

#[test]
fn unknown_field_in_rate_limit_produces_error() {
    let toml = r#"
[rate_limit]
limt = 3
"#;

    let err = load_config_from_str(toml).expect_err("should reject unknown field");
    let err_str = format!("{err}");
    assert!(
        err_str.contains("unknown field") || err_str.contains("limt"),
        "error should mention unknown field or the bad key, got: {err_str}"
    );
}

#[test]
fn unknown_window_mode_is_rejected() {
    let toml = r#"
[rate_limit]
mode = "leaky"
"#;
    assert!(load_config_from_str(toml).is_err());
}

/// Missing optional sections use defaults without error.
#[test]
fn missing_optional_sections_use_defaults() {
    let config = load_config_from_str("").expect("empty TOML should use defaults");

    assert_eq!(config.log.level, "info");
    assert_eq!(config.rate_limit.mode, WindowMode::Fixed);
    assert_eq!(config.rate_limit.limit, 30);
    assert_eq!(config.rate_limit.period, 60);
    assert_eq!(config.rate_limit.max_delay, 30);
    assert_eq!(config.rate_limit.scope, RateScope::Global);
    assert_eq!(config.queue.capacity, 0);
    assert_eq!(config.queue.workers, 2);
    assert_eq!(config.queue.retry_attempts, 5);
    assert_eq!(config.queue.backoff_base, 100);
    assert_eq!(config.queue.backoff_max, 5_000);
    assert_eq!(config.queue.drain_deadline, 30);
    assert_eq!(config.queue.batch_size, 32);
    assert_eq!(config.queue.flush_interval, 50);
    assert_eq!(config.fetch.max_chats, 20);
    assert_eq!(config.fetch.max_messages, 0);
    assert_eq!(config.fetch.chat_key, "chat-scan");
    assert_eq!(config.fetch.message_key, "message-scan");
    assert!(config.fetch.skip_persisted);
    assert_eq!(config.fetch.direction, DirectionFilter::All);
    assert_eq!(config.storage.database_path, "tweakio.db");
    assert!(config.storage.wal_mode);
}

/// `TWEAKIO_FETCH_MAX_CHATS` maps to `fetch.max_chats`, not `fetch.max.chats`.
#[test]
fn env_style_override_uses_dotted_path() {
    use figment::{
        providers::{Format, Serialized, Toml},
        Figment,
    };

    let toml_content = r#"
[fetch]
max_chats = 3
"#;

    let path = tweakio_config::loader::env_key_to_path("fetch_max_chats");
    let config: TweakioConfig = Figment::new()
        .merge(Serialized::defaults(TweakioConfig::default()))
        .merge(Toml::string(toml_content))
        .merge((path.as_str(), 9))
        .extract()
        .expect("should merge env override");

    assert_eq!(config.fetch.max_chats, 9);
}

/// Missing config files are silently skipped (Figment's Toml::file() behavior).
#[test]
fn missing_config_files_silently_skipped() {
    let config = tweakio_config::load_config_from_path(std::path::Path::new(
        "/nonexistent/path/tweakio.toml",
    ))
    .expect("missing file should be silently skipped");
    assert_eq!(config.fetch.max_chats, 20);
}

#[test]
fn deny_unknown_fields_at_top_level() {
    let toml = r#"
[logging]
level = "debug"
"#;

    let err = load_config_from_str(toml).expect_err("unknown top-level section should be rejected");
    let err_str = format!("{err}");
    assert!(
        err_str.contains("unknown field") || err_str.contains("logging"),
        "error should mention unknown field, got: {err_str}"
    );
}

#[test]
fn diagnostic_error_includes_unknown_key_and_suggestion() {
    let toml = r#"
[queue]
wokers = 3
"#;

    let errors = load_and_validate_str(toml).expect_err("should produce errors");
    let has_unknown_key = errors.iter().any(|e| {
        matches!(e, ConfigError::UnknownKey { key, suggestion, valid_keys, .. } if {
            key == "wokers"
                && suggestion.as_deref() == Some("workers")
                && valid_keys.contains("retry_attempts")
        })
    });
    assert!(
        has_unknown_key,
        "should have UnknownKey error for 'wokers' with suggestion 'workers', got: {errors:?}"
    );
}

#[test]
fn diagnostic_invalid_type_message() {
    let toml = r#"
[rate_limit]
limit = "lots"
"#;

    let err = load_config_from_str(toml).expect_err("should reject invalid type");
    let err_str = format!("{err}");
    assert!(
        err_str.contains("invalid type") || err_str.contains("limit"),
        "error should mention type mismatch, got: {err_str}"
    );
}

#[test]
fn config_error_renders_with_miette() {
    use miette::GraphicalReportHandler;

    let error = ConfigError::UnknownKey {
        section: "queue".to_string(),
        key: "wokers".to_string(),
        suggestion: Some("workers".to_string()),
        valid_keys: "capacity, workers, retry_attempts".to_string(),
        span: None,
        src: None,
    };

    let handler = GraphicalReportHandler::new();
    let mut buf = String::new();
    handler
        .render_report(&mut buf, &error)
        .expect("should render without error");
    assert!(buf.contains("wokers"));
    assert!(buf.contains("did you mean `workers`"));
    assert!(buf.contains("[queue]"));
}

#[test]
fn load_and_validate_rejects_semantic_errors() {
    let toml = r#"
[rate_limit]
limit = 0

[queue]
workers = 0
"#;

    let errors = load_and_validate_str(toml).expect_err("zero limit and workers are invalid");
    assert_eq!(errors.len(), 2);
    assert!(errors
        .iter()
        .all(|e| matches!(e, ConfigError::Validation { .. })));
}

#[test]
fn load_and_validate_valid_toml() {
    let toml = r#"
[fetch]
max_chats = 5
"#;

    let config = load_and_validate_str(toml).expect("valid TOML should validate");
    assert_eq!(config.fetch.max_chats, 5);
}
