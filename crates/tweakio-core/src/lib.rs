// SPDX-FileCopyrightText: 2026 Tweakio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the tweakio capture pipeline.
//!
//! This crate provides the error taxonomy, the chat/message data model, and
//! the collaborator traits (scraping source, durable store) that the rate
//! limiter, persistence queue, and fetchers are written against.

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::TweakioError;
pub use types::{
    AdapterType, Chat, ChatHandle, ChatId, DeliveryStatus, Direction, HealthStatus, Message,
    MessageId, RecordKey, RecordPayload, SenderInfo, UpsertOutcome, WriteRecord,
};

pub use traits::{ChatSource, DurableStore, MessageSource, PluginAdapter};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tweakio_error_has_pipeline_variants() {
        let _transient = TweakioError::transient("busy");
        let _limited = TweakioError::RateLimited {
            key: "chat-scan".into(),
            retry_after: std::time::Duration::from_secs(5),
        };
        let _closed = TweakioError::QueueClosed;
        let _persist = TweakioError::PersistenceFailure {
            key: "wa::a/chat".into(),
            attempts: 3,
            message: "locked".into(),
        };
        let _collab = TweakioError::CollaboratorFailure {
            message: "gone".into(),
            yielded: 0,
        };
    }

    #[test]
    fn adapter_type_round_trips() {
        use std::str::FromStr;

        for variant in [AdapterType::Source, AdapterType::Store] {
            let s = variant.to_string();
            assert_eq!(AdapterType::from_str(&s).expect("should parse back"), variant);
        }
    }

    #[test]
    fn all_trait_modules_are_exported() {
        fn _assert_plugin_adapter<T: PluginAdapter>() {}
        fn _assert_chat_source<T: ChatSource>() {}
        fn _assert_message_source<T: MessageSource>() {}
        fn _assert_durable_store<T: DurableStore>() {}
    }
}
