//! Breadth-first frontier with a keyed visited set.
//!
//! A request key enters the visited set exactly once, when its entry is
//! accepted into the queue. Entries are popped in the order they were pushed,
//! so every depth-d entry is dispatched before the depth-d+1 entries it
//! produced.

use crate::result::{FrontierEntry, RequestKey};
use std::collections::{HashSet, VecDeque};
use tracing::debug;

#[derive(Debug, Default)]
pub struct Frontier {
    queue: VecDeque<FrontierEntry>,
    visited: HashSet<RequestKey>,
}

impl Frontier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check-and-insert on the visited set plus enqueue, as one step.
    /// Returns `false` if the key was already seen.
    pub fn push(&mut self, entry: FrontierEntry) -> bool {
        let key = entry.key();
        if !self.visited.insert(key) {
            debug!("Already seen {} {}", entry.method, entry.url);
            return false;
        }
        self.queue.push_back(entry);
        true
    }

    pub fn pop(&mut self) -> Option<FrontierEntry> {
        self.queue.pop_front()
    }

    pub fn is_visited(&self, key: &RequestKey) -> bool {
        self.visited.contains(key)
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn visited_count(&self) -> usize {
        self.visited.len()
    }
}
