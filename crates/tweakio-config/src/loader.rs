// SPDX-FileCopyrightText: 2026 Tweakio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./tweakio.toml` > `~/.config/tweakio/tweakio.toml` > `/etc/tweakio/tweakio.toml`
//! with environment variable overrides via `TWEAKIO_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use tracing::debug;

use crate::model::TweakioConfig;

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/tweakio/tweakio.toml` (system-wide)
/// 3. `~/.config/tweakio/tweakio.toml` (user XDG config)
/// 4. `./tweakio.toml` (local directory)
/// 5. `TWEAKIO_*` environment variables
pub fn load_config() -> Result<TweakioConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
pub fn load_config_from_str(toml_content: &str) -> Result<TweakioConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(TweakioConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<TweakioConfig, figment::Error> {
    if !path.exists() {
        debug!(path = %path.display(), "config file not found, using defaults and env");
    }
    Figment::new()
        .merge(Serialized::defaults(TweakioConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used internally for config loading.
///
/// Returns the Figment before extraction so callers can inspect metadata.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(TweakioConfig::default()))
        .merge(Toml::file("/etc/tweakio/tweakio.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("tweakio/tweakio.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("tweakio.toml"))
        .merge(env_provider())
}

/// Map a lowercased, prefix-stripped env var name to its dotted config path.
///
/// Only the section prefix is rewritten, so `fetch_max_chats` becomes
/// `fetch.max_chats` rather than `fetch.max.chats`.
pub fn env_key_to_path(key: &str) -> String {
    const SECTIONS: &[&str] = &["rate_limit", "queue", "fetch", "storage", "log"];
    for section in SECTIONS {
        if let Some(rest) = key.strip_prefix(section).and_then(|r| r.strip_prefix('_')) {
            return format!("{section}.{rest}");
        }
    }
    key.to_string()
}

fn env_provider() -> Env {
    Env::prefixed("TWEAKIO_").map(|key| env_key_to_path(key.as_str()).into())
}
