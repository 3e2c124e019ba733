//! In-memory conversation history with snapshot reads.

use agentloom_core::memory::{ConversationMemory, Step};
use std::sync::RwLock;

/// A conversation memory backed by a locked Vec.
///
/// `history()` clones the step list, so a reader holds a stable copy even
/// while sibling agents append concurrently.
#[derive(Default)]
pub struct InMemoryHistory {
    steps: RwLock<Vec<Step>>,
}

impl InMemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of recorded steps.
    pub fn len(&self) -> usize {
        self.steps.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ConversationMemory for InMemoryHistory {
    fn add_step(&self, step: Step) {
        self.steps
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(step);
    }

    fn history(&self) -> Vec<Step> {
        self.steps
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn set_history(&self, steps: Vec<Step>) {
        *self.steps.write().unwrap_or_else(|e| e.into_inner()) = steps;
    }
}
