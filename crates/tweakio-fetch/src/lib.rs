// SPDX-FileCopyrightText: 2026 Tweakio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Lazy, rate-limited fetch sequences over the scraping collaborator.
//!
//! [`ChatFetcher`] walks the chat list and [`MessageFetcher`] walks one chat's
//! messages. Both are [`FetchIterator`]s: each pull asks the rate limiter for
//! admission, then calls the collaborator, retrying transient failures. A
//! sequence ends with a [`FetchEnd`] that tells the caller why it stopped.

pub mod chats;
pub mod filter;
pub mod iterator;
pub mod messages;

pub use chats::{ChatFetcher, ChatPuller};
pub use filter::MessageFilter;
pub use iterator::{FetchEnd, FetchIterator, FetchOptions, Fetched, Puller, Step};
pub use messages::{MessageFetcher, MessagePuller};
