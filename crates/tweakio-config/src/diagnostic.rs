// SPDX-FileCopyrightText: 2026 Tweakio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Config diagnostics for `tweakio.toml`.
//!
//! Figment reports where deserialization went wrong; this module turns that
//! into miette diagnostics that point at the offending line and name what
//! tweakio would have accepted in its place: the `[section]` headers, the keys
//! of one section, or the values of a mode-like setting.

#![allow(unused_assignments)] // miette's Diagnostic derive generates code triggering this lint

use figment::error::{Error as FigmentError, Kind};
use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

/// Minimum Jaro-Winkler similarity for a "did you mean" hint.
const SUGGESTION_THRESHOLD: f64 = 0.75;

/// One problem found in the tweakio configuration.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    /// A top-level table tweakio does not have, such as `[logging]`.
    #[error("unknown section `[{section}]`")]
    #[diagnostic(
        code(tweakio::config::unknown_section),
        help("{}", section_help(suggestion.as_deref(), sections))
    )]
    UnknownSection {
        section: String,
        suggestion: Option<String>,
        /// Every valid section, comma separated.
        sections: String,
        #[label("not a tweakio section")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    /// A key that does not belong to its section, such as `queue.wokers`.
    #[error("unknown key `{key}` in `[{section}]`")]
    #[diagnostic(
        code(tweakio::config::unknown_key),
        help("{}", key_help(section, suggestion.as_deref(), valid_keys))
    )]
    UnknownKey {
        section: String,
        key: String,
        suggestion: Option<String>,
        /// Keys `section` accepts, comma separated.
        valid_keys: String,
        #[label("this key is not recognized")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    /// A string setting outside its fixed set, such as `rate_limit.mode = "leaky"`.
    #[error("`{key}` cannot be `{value}`")]
    #[diagnostic(
        code(tweakio::config::unknown_value),
        help("{}", value_help(suggestion.as_deref(), expected))
    )]
    UnknownValue {
        key: String,
        value: String,
        suggestion: Option<String>,
        expected: String,
        #[label("unsupported value")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    /// A value of the wrong TOML type.
    #[error("invalid type for `{key}`: {detail}")]
    #[diagnostic(code(tweakio::config::invalid_type), help("`{key}` takes {expected}"))]
    InvalidType {
        key: String,
        detail: String,
        expected: String,
        #[label("wrong type here")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    /// A value that parsed but is out of range.
    #[error("validation error: {message}")]
    #[diagnostic(code(tweakio::config::validation))]
    Validation { message: String },

    #[error("configuration error: {0}")]
    #[diagnostic(code(tweakio::config::other))]
    Other(String),
}

fn section_help(suggestion: Option<&str>, sections: &str) -> String {
    match suggestion {
        Some(s) => format!("did you mean `[{s}]`? tweakio.toml has the sections {sections}"),
        None => format!("tweakio.toml has the sections {sections}"),
    }
}

fn key_help(section: &str, suggestion: Option<&str>, valid_keys: &str) -> String {
    match suggestion {
        Some(s) => format!("did you mean `{s}`? `[{section}]` accepts {valid_keys}"),
        None => format!("`[{section}]` accepts {valid_keys}"),
    }
}

fn value_help(suggestion: Option<&str>, expected: &str) -> String {
    match suggestion {
        Some(s) => format!("did you mean `\"{s}\"`? expected one of {expected}"),
        None => format!("expected one of {expected}"),
    }
}

/// Translate every error figment collected into a diagnostic.
///
/// `toml_sources` pairs each config file path with its content so that
/// diagnostics can point into the file.
pub fn figment_to_config_errors(
    err: FigmentError,
    toml_sources: &[(String, String)],
) -> Vec<ConfigError> {
    err.into_iter()
        .map(|error| to_config_error(&error, toml_sources))
        .collect()
}

fn to_config_error(error: &FigmentError, toml_sources: &[(String, String)]) -> ConfigError {
    let path: Vec<String> = error.path.clone();
    let source = source_of(error, toml_sources);

    match &error.kind {
        Kind::UnknownField(field, expected) if path.is_empty() => {
            let (span, src) = locate(source, &[], field, true);
            ConfigError::UnknownSection {
                section: field.clone(),
                suggestion: suggest_key(field, expected),
                sections: expected
                    .iter()
                    .map(|s| format!("[{s}]"))
                    .collect::<Vec<_>>()
                    .join(", "),
                span,
                src,
            }
        }
        Kind::UnknownField(field, expected) => {
            let (span, src) = locate(source, &path, field, false);
            ConfigError::UnknownKey {
                section: path.join("."),
                key: field.clone(),
                suggestion: suggest_key(field, expected),
                valid_keys: expected.join(", "),
                span,
                src,
            }
        }
        Kind::UnknownVariant(value, expected) => {
            let (span, src) = split_key(&path)
                .map(|(section, key)| locate(source, section, key, false))
                .unwrap_or((None, None));
            ConfigError::UnknownValue {
                key: path.join("."),
                value: value.clone(),
                suggestion: suggest_key(value, expected),
                expected: expected.join(", "),
                span,
                src,
            }
        }
        Kind::InvalidType(actual, expected) => {
            let (span, src) = split_key(&path)
                .map(|(section, key)| locate(source, section, key, false))
                .unwrap_or((None, None));
            ConfigError::InvalidType {
                key: path.join("."),
                detail: format!("found {actual}, expected {expected}"),
                expected: expected.to_string(),
                span,
                src,
            }
        }
        _ => ConfigError::Other(error.to_string()),
    }
}

/// `["queue", "workers"]` splits into the section path and the key.
fn split_key(path: &[String]) -> Option<(&[String], &str)> {
    path.split_last()
        .map(|(key, section)| (section, key.as_str()))
}

/// The loaded file `error` came from, if it is one of `toml_sources`.
fn source_of<'a>(
    error: &FigmentError,
    toml_sources: &'a [(String, String)],
) -> Option<(&'a str, &'a str)> {
    let origin = match error.metadata.as_ref().and_then(|m| m.source.as_ref()) {
        Some(figment::Source::File(path)) => Some(path.display().to_string()),
        _ => None,
    };
    let found = match origin {
        Some(origin) => toml_sources.iter().find(|(p, _)| *p == origin),
        // Inline strings carry no file source; a lone candidate is unambiguous.
        None if toml_sources.len() == 1 => toml_sources.first(),
        None => None,
    };
    found.map(|(p, content)| (p.as_str(), content.as_str()))
}

fn locate(
    source: Option<(&str, &str)>,
    section: &[String],
    name: &str,
    header: bool,
) -> (Option<SourceSpan>, Option<NamedSource<String>>) {
    let Some((path, content)) = source else {
        return (None, None);
    };
    let offset = if header {
        find_section_offset(content, name)
    } else {
        find_key_offset(content, section, name)
    };
    match offset {
        Some(offset) => (
            Some(SourceSpan::new(offset.into(), name.len())),
            Some(NamedSource::new(path, content.to_string())),
        ),
        None => (None, None),
    }
}

/// Byte offset of the name inside a `[name]` header, or of a top-level
/// `name = ...` line.
pub fn find_section_offset(content: &str, name: &str) -> Option<usize> {
    let header = format!("[{name}]");
    if let Some(pos) = content.find(&header) {
        return Some(pos + 1);
    }
    find_key_offset(content, &[], name)
}

/// Byte offset of `key` at the start of a line inside `[section]`, or before
/// the first header when `section` is empty.
pub fn find_key_offset(content: &str, section: &[String], key: &str) -> Option<usize> {
    let start = if section.is_empty() {
        0
    } else {
        let header = format!("[{}]", section.join("."));
        content.find(&header)? + header.len()
    };

    let mut offset = start;
    for line in content[start..].split_inclusive('\n') {
        let trimmed = line.trim_start();
        if section.is_empty() && trimmed.starts_with('[') {
            break;
        }
        if let Some(after) = trimmed.strip_prefix(key) {
            if after.trim_start().starts_with('=') {
                return Some(offset + line.len() - trimmed.len());
            }
        }
        offset += line.len();
    }
    None
}

/// Closest entry of `candidates` to `unknown`, if any is close enough.
pub fn suggest_key(unknown: &str, candidates: &[&str]) -> Option<String> {
    candidates
        .iter()
        .map(|&c| (strsim::jaro_winkler(unknown, c), c))
        .filter(|(score, _)| *score > SUGGESTION_THRESHOLD)
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, c)| c.to_string())
}

/// Print `errors` to stderr with miette's graphical handler.
pub fn render_errors(errors: &[ConfigError]) {
    use miette::GraphicalReportHandler;

    let handler = GraphicalReportHandler::new();
    for error in errors {
        let mut buf = String::new();
        let diagnostic: &dyn Diagnostic = error;
        if handler.render_report(&mut buf, diagnostic).is_ok() {
            eprint!("{buf}");
        } else {
            eprintln!("Error: {error}");
        }
    }
}
