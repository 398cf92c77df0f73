//! Conversation segmentation for truncation.
//!
//! Groups a flat message list into a protected leading system message, an
//! ordered run of turns, and an optional protected trailing user message.
//! A turn is the atomic unit of removal: a user message together with the
//! assistant reply that immediately follows it.

use std::collections::VecDeque;

use crate::chat::{Message, Role};

/// One user message and its immediate assistant reply, if any.
///
/// Out-of-order messages (an assistant without a preceding user, a second
/// system message, tool output) form degenerate single-message turns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    /// Position of the turn's first message in the original list
    pub index: usize,
    pub opener: Message,
    pub reply: Option<Message>,
}

impl Turn {
    fn open(index: usize, opener: Message) -> Self {
        Self {
            index,
            opener,
            reply: None,
        }
    }

    pub fn message_count(&self) -> usize {
        1 + usize::from(self.reply.is_some())
    }

    pub fn messages(&self) -> impl Iterator<Item = &Message> {
        std::iter::once(&self.opener).chain(self.reply.as_ref())
    }
}

/// A segmented conversation.
///
/// Concatenating `system`, `turns` and `tail` in that order reproduces the
/// original message order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Conversation {
    system: Option<Message>,
    turns: VecDeque<Turn>,
    tail: Option<Message>,
}

impl Conversation {
    pub fn system(&self) -> Option<&Message> {
        self.system.as_ref()
    }

    pub fn turns(&self) -> impl Iterator<Item = &Turn> {
        self.turns.iter()
    }

    pub fn turn_count(&self) -> usize {
        self.turns.len()
    }

    pub fn tail(&self) -> Option<&Message> {
        self.tail.as_ref()
    }

    /// Turns that may still be removed, oldest first.
    ///
    /// Without a trailing user message the most recent turn is protected.
    pub fn droppable_count(&self) -> usize {
        if self.tail.is_some() {
            self.turns.len()
        } else {
            self.turns.len().saturating_sub(1)
        }
    }

    /// Remove and return the oldest droppable turn.
    pub fn drop_oldest_turn(&mut self) -> Option<Turn> {
        if self.droppable_count() == 0 {
            return None;
        }
        self.turns.pop_front()
    }

    pub fn message_count(&self) -> usize {
        usize::from(self.system.is_some())
            + self.turns.iter().map(Turn::message_count).sum::<usize>()
            + usize::from(self.tail.is_some())
    }

    /// Reassemble the surviving messages in original relative order.
    pub fn to_messages(&self) -> Vec<Message> {
        let mut messages = Vec::with_capacity(self.message_count());
        messages.extend(self.system.iter().cloned());
        for turn in &self.turns {
            messages.extend(turn.messages().cloned());
        }
        messages.extend(self.tail.iter().cloned());
        messages
    }

    pub fn into_messages(self) -> Vec<Message> {
        let mut messages = Vec::with_capacity(self.message_count());
        messages.extend(self.system);
        for turn in self.turns {
            messages.push(turn.opener);
            messages.extend(turn.reply);
        }
        messages.extend(self.tail);
        messages
    }
}

/// Segments a message list into a [`Conversation`]. Never fails.
#[derive(Debug)]
pub struct MessageSegmenter;

impl MessageSegmenter {
    pub fn new() -> Self {
        Self
    }

    pub fn segment(&self, messages: Vec<Message>) -> Conversation {
        let mut conversation = Conversation::default();
        let mut open: Option<Turn> = None;
        let mut iter = messages.into_iter().enumerate().peekable();

        if let Some((_, first)) = iter.next_if(|(_, m)| m.role() == Role::System) {
            conversation.system = Some(first);
        }

        for (index, message) in iter {
            match message.role() {
                Role::User => {
                    conversation.turns.extend(open.take());
                    open = Some(Turn::open(index, message));
                }
                Role::Assistant if open.is_some() => {
                    if let Some(mut turn) = open.take() {
                        turn.reply = Some(message);
                        conversation.turns.push_back(turn);
                    }
                }
                role => {
                    tracing::warn!(
                        "Out-of-order {} message at index {} kept as its own turn",
                        role,
                        index
                    );
                    conversation.turns.extend(open.take());
                    conversation.turns.push_back(Turn::open(index, message));
                }
            }
        }

        // Only the final message can still be open: an unanswered user message.
        conversation.tail = open.map(|turn| turn.opener);
        conversation
    }
}

impl Default for MessageSegmenter {
    fn default() -> Self {
        Self::new()
    }
}
