//! Bounded shader cache with strict LRU eviction.
//!
//! The key mapping and the recency list are guarded by one mutex so every
//! operation observes them in agreement: each present key appears exactly
//! once in the recency list and vice versa, after every operation.

pub mod metadata;
mod recency;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::debug;

use crate::key::CacheKey;
use crate::metrics::JitMetrics;
use crate::pending::CompileHandle;

use metadata::EntryMetadata;
use recency::RecencyList;

/// Default upper bound on distinct cached entries.
pub const MAX_CACHE_SIZE: usize = 1000;

enum Slot<S> {
    Ready { shader: Arc<S>, meta: EntryMetadata },
    Pending(CompileHandle<S>),
}

/// Result of consulting the cache for a key.
pub enum CacheLookup<S> {
    /// Compiled and resident; promoted to most recently used.
    Ready(Arc<S>),
    /// Compilation in flight; requesters share this handle instead of
    /// enqueuing duplicate work.
    Pending(CompileHandle<S>),
    Miss,
}

/// Result of the combined check-and-reserve used by the background
/// scheduler. Distinguishing `Reserved` from `Pending` is what keeps N
/// concurrent misses for one key down to a single enqueued work item.
pub enum ReserveOutcome<S> {
    Ready(Arc<S>),
    /// Someone else already reserved the slot; share their handle.
    Pending(CompileHandle<S>),
    /// The caller won the reservation and must enqueue the compile.
    Reserved(CompileHandle<S>),
}

struct CacheInner<S> {
    entries: HashMap<CacheKey, Slot<S>>,
    recency: RecencyList,
}

/// Mapping from cache key to compiled unit (or in-flight handle), bounded
/// in size, evicted in strict LRU order. Owns the lifetimes of everything
/// it holds; callers access units only through lookups.
pub struct ShaderCache<S> {
    inner: Mutex<CacheInner<S>>,
    capacity: usize,
    metrics: Arc<JitMetrics>,
}

impl<S: Send + Sync + 'static> ShaderCache<S> {
    pub fn new(capacity: usize, metrics: Arc<JitMetrics>) -> Self {
        Self {
            inner: Mutex::new(CacheInner {
                entries: HashMap::new(),
                recency: RecencyList::default(),
            }),
            capacity: capacity.max(1),
            metrics,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().entries.is_empty()
    }

    /// Consults the cache. A hit promotes the key to most recently used;
    /// a miss has no side effect.
    pub fn lookup(&self, key: CacheKey) -> CacheLookup<S> {
        let mut inner = self.inner.lock();
        match inner.entries.get_mut(&key) {
            Some(Slot::Ready { shader, meta }) => {
                meta.record_access();
                let shader = Arc::clone(shader);
                inner.recency.promote(key);
                CacheLookup::Ready(shader)
            }
            Some(Slot::Pending(handle)) => {
                let handle = handle.clone();
                inner.recency.promote(key);
                CacheLookup::Pending(handle)
            }
            None => CacheLookup::Miss,
        }
    }

    /// Consults the cache and, on a miss, atomically reserves the slot with
    /// a fresh pending handle under the same lock acquisition. Hits promote
    /// as in `lookup`.
    pub fn lookup_or_reserve(&self, key: CacheKey) -> ReserveOutcome<S> {
        let mut inner = self.inner.lock();
        match inner.entries.get_mut(&key) {
            Some(Slot::Ready { shader, meta }) => {
                meta.record_access();
                let shader = Arc::clone(shader);
                inner.recency.promote(key);
                ReserveOutcome::Ready(shader)
            }
            Some(Slot::Pending(handle)) => {
                let handle = handle.clone();
                inner.recency.promote(key);
                ReserveOutcome::Pending(handle)
            }
            None => {
                let handle = CompileHandle::new();
                self.insert_slot(&mut inner, key, Slot::Pending(handle.clone()));
                ReserveOutcome::Reserved(handle)
            }
        }
    }

    /// Inserts or replaces the entry for `key` and marks it most recently
    /// used. When the key is new and the cache is full, the least recently
    /// used entry is evicted first.
    pub fn insert(&self, key: CacheKey, shader: Arc<S>, compile_time: Duration) {
        let mut inner = self.inner.lock();
        self.insert_slot(
            &mut inner,
            key,
            Slot::Ready {
                shader,
                meta: EntryMetadata::new(compile_time),
            },
        );
    }

    /// Reserves the slot for `key` with an in-flight handle so concurrent
    /// requesters observe the same handle rather than re-enqueuing work.
    /// Same eviction discipline as `insert`.
    pub fn insert_pending(&self, key: CacheKey, handle: CompileHandle<S>) {
        let mut inner = self.inner.lock();
        self.insert_slot(&mut inner, key, Slot::Pending(handle));
    }

    /// Drops the entry and its recency node, if present.
    pub fn remove(&self, key: CacheKey) {
        let mut inner = self.inner.lock();
        if inner.entries.remove(&key).is_some() {
            inner.recency.remove(key);
        }
    }

    /// Swaps a pending reservation for the finished unit. A no-op when the
    /// reservation was evicted or superseded in the meantime; holders of
    /// the handle still observe the result through the handle itself.
    pub(crate) fn publish(
        &self,
        key: CacheKey,
        shader: Arc<S>,
        compile_time: Duration,
        handle: &CompileHandle<S>,
    ) {
        let mut inner = self.inner.lock();
        if let Some(slot) = inner.entries.get_mut(&key) {
            if matches!(slot, Slot::Pending(pending) if pending.ptr_eq(handle)) {
                *slot = Slot::Ready {
                    shader,
                    meta: EntryMetadata::new(compile_time),
                };
            }
        }
    }

    /// Removes a pending reservation after a failed compile, so later
    /// lookups re-request compilation instead of hitting a dead handle.
    pub(crate) fn retract_pending(&self, key: CacheKey, handle: &CompileHandle<S>) {
        let mut inner = self.inner.lock();
        let retract = matches!(
            inner.entries.get(&key),
            Some(Slot::Pending(pending)) if pending.ptr_eq(handle)
        );
        if retract {
            inner.entries.remove(&key);
            inner.recency.remove(key);
        }
    }

    /// Reads a ready entry's metadata without touching LRU order. `None`
    /// for absent keys and in-flight reservations.
    pub fn entry_metadata(&self, key: CacheKey) -> Option<EntryMetadata> {
        let inner = self.inner.lock();
        match inner.entries.get(&key) {
            Some(Slot::Ready { meta, .. }) => Some(meta.clone()),
            _ => None,
        }
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock();
        let pending = inner
            .entries
            .values()
            .filter(|slot| matches!(slot, Slot::Pending(_)))
            .count();
        CacheStats {
            entries: inner.entries.len(),
            pending,
            capacity: self.capacity,
        }
    }

    /// Checks the map/recency-list bijection invariant. A `false` return
    /// is a defect in the cache itself, never a caller-visible condition.
    pub fn is_consistent(&self) -> bool {
        let inner = self.inner.lock();
        inner.recency.len() == inner.entries.len()
            && inner.entries.keys().all(|key| inner.recency.contains(*key))
    }

    fn insert_slot(&self, inner: &mut CacheInner<S>, key: CacheKey, slot: Slot<S>) {
        if inner.entries.contains_key(&key) {
            inner.entries.insert(key, slot);
            inner.recency.promote(key);
            return;
        }
        while inner.entries.len() >= self.capacity {
            let Some(victim) = inner.recency.pop_back() else {
                break;
            };
            inner.entries.remove(&victim);
            self.metrics.record_eviction();
            debug!(key = victim, "evicted least recently used shader");
        }
        inner.entries.insert(key, slot);
        inner.recency.push_front(key);
    }
}

/// Occupancy snapshot in the shape reported by `ShaderCache::stats`.
#[derive(Debug, Clone, Copy)]
pub struct CacheStats {
    pub entries: usize,
    pub pending: usize,
    pub capacity: usize,
}
