//! FIFO of transmitted actions. Queue position is the only correlation key
//! between an action and its reply.

use std::collections::VecDeque;

use crate::action::Action;

/// Client text covered by a span action when it was sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Recorded {
    pub start: usize,
    pub end: usize,
    pub text: String,
    pub flags: u32,
}

#[derive(Debug, Clone)]
pub(crate) struct Queued {
    pub action: Action,
    pub recorded: Option<Recorded>,
}

#[derive(Default)]
pub(crate) struct ActionQueue {
    items: VecDeque<Queued>,
}

impl ActionQueue {
    pub fn push(&mut self, item: Queued) {
        self.items.push_back(item);
    }

    pub fn front(&self) -> Option<&Queued> {
        self.items.front()
    }

    pub fn pop_front(&mut self) -> Option<Queued> {
        self.items.pop_front()
    }

    /// Drop the most recent action after a failed send. Only the sending
    /// thread pushes, so the back is the action that failed.
    pub fn pop_back(&mut self) -> Option<Queued> {
        self.items.pop_back()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn clear(&mut self) -> Vec<Queued> {
        self.items.drain(..).collect()
    }
}
