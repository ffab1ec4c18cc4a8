use std::collections::HashMap;

use crate::cache::MAX_CACHE_SIZE;

/// How cache misses are compiled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompileStrategy {
    /// Compile on the requesting thread. The caller stalls for the full
    /// compile latency; concurrent misses for one key may compile twice,
    /// but only one copy is ever kept.
    Inline,
    /// Hand misses to the worker pool and return a pending handle. The
    /// caller waits only at the point the result is required.
    Background,
}

#[derive(Debug, Clone, Copy)]
pub struct JitConfig {
    /// Hard upper bound on distinct cached entries before LRU eviction.
    pub max_cache_size: usize,
    /// Number of background compilation workers.
    pub workers: usize,
    pub strategy: CompileStrategy,
}

impl Default for JitConfig {
    fn default() -> Self {
        let workers = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);
        Self {
            max_cache_size: MAX_CACHE_SIZE,
            workers,
            strategy: CompileStrategy::Background,
        }
    }
}

/// Per-title adjustments applied on top of a base config, for titles whose
/// shader workloads want different cache or scheduling behaviour.
#[derive(Debug, Clone, Copy, Default)]
pub struct TitleConfig {
    pub max_cache_size: Option<usize>,
    pub workers: Option<usize>,
    pub strategy: Option<CompileStrategy>,
}

/// Table of per-title overrides keyed by 64-bit title id.
#[derive(Debug, Default)]
pub struct TitleOverrides {
    overrides: HashMap<u64, TitleConfig>,
}

impl TitleOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, title_id: u64, config: TitleConfig) {
        self.overrides.insert(title_id, config);
    }

    /// Resolves the effective config for a title: the base config with any
    /// registered overrides applied.
    pub fn resolve(&self, title_id: u64, base: JitConfig) -> JitConfig {
        let Some(overrides) = self.overrides.get(&title_id) else {
            return base;
        };
        JitConfig {
            max_cache_size: overrides.max_cache_size.unwrap_or(base.max_cache_size),
            workers: overrides.workers.unwrap_or(base.workers),
            strategy: overrides.strategy.unwrap_or(base.strategy),
        }
    }
}
