use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Engine counters. Cheap enough to keep hot; everything else about
/// instrumentation lives outside this crate.
#[derive(Debug, Default)]
pub struct JitMetrics {
    hits: AtomicU64,
    misses: AtomicU64,
    compiled: AtomicU64,
    failed: AtomicU64,
    evicted: AtomicU64,
}

impl JitMetrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_compile(&self) {
        self.compiled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_compile_failure(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_eviction(&self) {
        self.evicted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> JitMetricsSnapshot {
        JitMetricsSnapshot {
            cache_hits: self.hits.load(Ordering::Relaxed),
            cache_misses: self.misses.load(Ordering::Relaxed),
            shaders_compiled: self.compiled.load(Ordering::Relaxed),
            compile_failures: self.failed.load(Ordering::Relaxed),
            shaders_evicted: self.evicted.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct JitMetricsSnapshot {
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub shaders_compiled: u64,
    pub compile_failures: u64,
    pub shaders_evicted: u64,
}
