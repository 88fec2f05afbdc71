// SPDX-FileCopyrightText: 2026 Tweakio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Direction filter for fetched messages.

use tweakio_config::model::DirectionFilter;
use tweakio_core::{Direction, Message};

/// Decides which scraped messages a [`crate::MessageFetcher`] yields.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MessageFilter {
    direction: DirectionFilter,
}

impl MessageFilter {
    pub fn new(direction: DirectionFilter) -> Self {
        Self { direction }
    }

    pub fn incoming() -> Self {
        Self::new(DirectionFilter::Incoming)
    }

    pub fn outgoing() -> Self {
        Self::new(DirectionFilter::Outgoing)
    }

    pub fn matches(&self, message: &Message) -> bool {
        match self.direction {
            DirectionFilter::All => true,
            DirectionFilter::Incoming => message.sender.direction == Direction::In,
            DirectionFilter::Outgoing => message.sender.direction == Direction::Out,
        }
    }
}
