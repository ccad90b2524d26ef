use std::collections::HashSet;

use crate::types::RecordId;

/// Ids whose clear-text value is currently shown
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RevealSet {
    ids: HashSet<RecordId>,
}

impl RevealSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flip membership of `id`; returns whether it is revealed afterwards
    pub fn toggle(&mut self, id: &RecordId) -> bool {
        if self.ids.remove(id) {
            false
        } else {
            self.ids.insert(id.clone());
            true
        }
    }

    pub fn is_revealed(&self, id: &RecordId) -> bool {
        self.ids.contains(id)
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Masking glyphs shown in place of a hidden value. The length never depends
/// on the value being hidden.
pub fn mask(len: usize) -> String {
    "•".repeat(len)
}
