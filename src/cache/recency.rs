use std::collections::VecDeque;

use crate::key::CacheKey;

/// Strict-LRU bookkeeping: most recently used at the front, eviction
/// candidate at the back. Keys appear at most once.
#[derive(Debug, Default)]
pub(crate) struct RecencyList {
    order: VecDeque<CacheKey>,
}

impl RecencyList {
    pub fn push_front(&mut self, key: CacheKey) {
        debug_assert!(!self.contains(key), "key already tracked in LRU order");
        self.order.push_front(key);
    }

    /// Moves an already-tracked key to the front.
    pub fn promote(&mut self, key: CacheKey) {
        self.order.retain(|tracked| *tracked != key);
        self.order.push_front(key);
    }

    pub fn pop_back(&mut self) -> Option<CacheKey> {
        self.order.pop_back()
    }

    pub fn remove(&mut self, key: CacheKey) {
        self.order.retain(|tracked| *tracked != key);
    }

    pub fn contains(&self, key: CacheKey) -> bool {
        self.order.iter().any(|tracked| *tracked == key)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }
}
