//! Engine facade consumed by the render-pipeline driver.
//!
//! `prepare` derives the key for a program, consults the cache, and on a
//! miss either compiles inline or hands the work to the pool, per the
//! configured strategy. `run` blocks until the prepared unit resolves;
//! `try_run` never blocks and reports a skip instead. Each engine owns its
//! cache and workers; dropping it drains the queue and joins the pool.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, warn};

use crate::cache::metadata::EntryMetadata;
use crate::cache::{CacheLookup, CacheStats, ReserveOutcome, ShaderCache};
use crate::compiler::{CompiledShader, ShaderCompiler};
use crate::config::{CompileStrategy, JitConfig};
use crate::errors::JitError;
use crate::key::{CacheKey, identity_key};
use crate::metrics::{JitMetrics, JitMetricsSnapshot};
use crate::pending::{CompileHandle, CompileOutcome};
use crate::pool::{CompilePool, WorkItem};
use crate::program::{MAX_PROGRAM_CODE_LENGTH, ProgramIdentity};

/// A program prepared for execution: ready immediately on a cache hit or
/// under inline compilation, pending while a worker is still translating.
pub struct PreparedShader<S> {
    key: CacheKey,
    entry_point: usize,
    slot: PreparedSlot<S>,
}

enum PreparedSlot<S> {
    Ready(Arc<S>),
    Pending(CompileHandle<S>),
}

impl<S> PreparedShader<S> {
    fn ready(key: CacheKey, entry_point: usize, shader: Arc<S>) -> Self {
        Self {
            key,
            entry_point,
            slot: PreparedSlot::Ready(shader),
        }
    }

    fn pending(key: CacheKey, entry_point: usize, handle: CompileHandle<S>) -> Self {
        Self {
            key,
            entry_point,
            slot: PreparedSlot::Pending(handle),
        }
    }

    pub fn key(&self) -> CacheKey {
        self.key
    }

    pub fn entry_point(&self) -> usize {
        self.entry_point
    }

    pub fn is_ready(&self) -> bool {
        match &self.slot {
            PreparedSlot::Ready(_) => true,
            PreparedSlot::Pending(handle) => handle.is_ready(),
        }
    }

    /// Blocks until the unit resolves. Repeated waits observe the same
    /// outcome.
    pub fn wait(&self) -> CompileOutcome<S> {
        match &self.slot {
            PreparedSlot::Ready(shader) => Ok(Arc::clone(shader)),
            PreparedSlot::Pending(handle) => handle.wait(),
        }
    }

    /// Non-blocking resolve. `None` while compilation is still in flight.
    pub fn try_resolve(&self) -> Option<CompileOutcome<S>> {
        match &self.slot {
            PreparedSlot::Ready(shader) => Some(Ok(Arc::clone(shader))),
            PreparedSlot::Pending(handle) => handle.try_get(),
        }
    }

    /// Non-blocking resolve for callers that want the transient state as an
    /// error value: `NotReady` while the worker is still translating,
    /// `Compile` if translation failed.
    pub fn try_wait(&self) -> Result<Arc<S>, JitError> {
        match self.try_resolve() {
            Some(Ok(shader)) => Ok(shader),
            Some(Err(err)) => Err(JitError::Compile(err)),
            None => Err(JitError::NotReady),
        }
    }
}

/// Outcome of a non-blocking execution attempt. Skipping a draw because
/// its shader is not ready or failed to compile is expected behaviour, not
/// an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    Skipped(SkipReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NotReady,
    CompileFailed,
}

/// JIT shader engine: key derivation, bounded LRU cache, and compilation
/// scheduling behind one entry point.
pub struct JitEngine<C: ShaderCompiler> {
    compiler: Arc<C>,
    cache: Arc<ShaderCache<C::Shader>>,
    pool: Option<CompilePool<C>>,
    metrics: Arc<JitMetrics>,
    config: JitConfig,
}

impl<C: ShaderCompiler> JitEngine<C> {
    pub fn new(compiler: C) -> Self {
        Self::with_config(compiler, JitConfig::default())
    }

    pub fn with_config(compiler: C, config: JitConfig) -> Self {
        let compiler = Arc::new(compiler);
        let metrics = JitMetrics::new();
        let cache = Arc::new(ShaderCache::new(config.max_cache_size, Arc::clone(&metrics)));
        let pool = match config.strategy {
            CompileStrategy::Background => Some(CompilePool::new(
                config.workers,
                Arc::clone(&compiler),
                Arc::clone(&cache),
                Arc::clone(&metrics),
            )),
            CompileStrategy::Inline => None,
        };
        Self {
            compiler,
            cache,
            pool,
            metrics,
            config,
        }
    }

    pub fn config(&self) -> JitConfig {
        self.config
    }

    pub fn metrics(&self) -> JitMetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Metadata for a resident compiled unit (compile duration, access
    /// count), keyed by `PreparedShader::key`. `None` while the unit is
    /// still compiling or after eviction.
    pub fn shader_metadata(&self, key: CacheKey) -> Option<EntryMetadata> {
        self.cache.entry_metadata(key)
    }

    /// Prepares a program for execution at `entry_point`.
    ///
    /// A hit reuses the cached unit (or joins the in-flight handle). A miss
    /// compiles inline or enqueues for the pool, per the configured
    /// strategy. Under inline compilation a failed compile surfaces here;
    /// under background compilation it surfaces when the handle resolves.
    pub fn prepare(
        &self,
        program: &ProgramIdentity,
        entry_point: usize,
    ) -> Result<PreparedShader<C::Shader>, JitError> {
        if entry_point >= MAX_PROGRAM_CODE_LENGTH {
            return Err(JitError::InvalidEntryPoint(entry_point));
        }
        let key = identity_key(program);
        match &self.pool {
            // Check-and-reserve happens under one lock acquisition, so N
            // concurrent misses for one key enqueue exactly one work item.
            Some(pool) => match self.cache.lookup_or_reserve(key) {
                ReserveOutcome::Ready(shader) => {
                    self.metrics.record_hit();
                    debug!(key, "shader cache hit");
                    Ok(PreparedShader::ready(key, entry_point, shader))
                }
                ReserveOutcome::Pending(handle) => {
                    self.metrics.record_hit();
                    debug!(key, "joined in-flight shader compilation");
                    Ok(PreparedShader::pending(key, entry_point, handle))
                }
                ReserveOutcome::Reserved(handle) => {
                    self.metrics.record_miss();
                    pool.submit(WorkItem {
                        key,
                        program: program.clone(),
                        handle: handle.clone(),
                    });
                    debug!(key, "queued shader compilation");
                    Ok(PreparedShader::pending(key, entry_point, handle))
                }
            },
            None => match self.cache.lookup(key) {
                CacheLookup::Ready(shader) => {
                    self.metrics.record_hit();
                    debug!(key, "shader cache hit");
                    Ok(PreparedShader::ready(key, entry_point, shader))
                }
                // Inline strategy never reserves, so pending entries do not
                // occur here.
                CacheLookup::Pending(handle) => {
                    self.metrics.record_hit();
                    Ok(PreparedShader::pending(key, entry_point, handle))
                }
                CacheLookup::Miss => {
                    self.metrics.record_miss();
                    self.compile_inline(key, program, entry_point)
                }
            },
        }
    }

    /// Strategy B's blocking-at-prepare variant: enqueue, then wait for the
    /// worker before returning. The returned shader is always ready.
    pub fn prepare_blocking(
        &self,
        program: &ProgramIdentity,
        entry_point: usize,
    ) -> Result<PreparedShader<C::Shader>, JitError> {
        let prepared = self.prepare(program, entry_point)?;
        let shader = prepared.wait()?;
        Ok(PreparedShader::ready(prepared.key, entry_point, shader))
    }

    /// Executes a prepared program, blocking until its unit resolves. A
    /// compile failure is per-request: the caller skips the draw.
    pub fn run(
        &self,
        prepared: &PreparedShader<C::Shader>,
        state: &mut <C::Shader as CompiledShader>::State,
    ) -> Result<(), JitError> {
        let shader = prepared.wait()?;
        shader.run(state, prepared.entry_point);
        Ok(())
    }

    /// Non-blocking execution attempt: runs the unit if it is ready,
    /// otherwise reports why the draw was skipped.
    pub fn try_run(
        &self,
        prepared: &PreparedShader<C::Shader>,
        state: &mut <C::Shader as CompiledShader>::State,
    ) -> RunOutcome {
        match prepared.try_resolve() {
            Some(Ok(shader)) => {
                shader.run(state, prepared.entry_point);
                RunOutcome::Completed
            }
            Some(Err(_)) => RunOutcome::Skipped(SkipReason::CompileFailed),
            None => RunOutcome::Skipped(SkipReason::NotReady),
        }
    }

    fn compile_inline(
        &self,
        key: CacheKey,
        program: &ProgramIdentity,
        entry_point: usize,
    ) -> Result<PreparedShader<C::Shader>, JitError> {
        let started = Instant::now();
        let shader = match self.compiler.compile(program) {
            Ok(shader) => Arc::new(shader),
            Err(err) => {
                self.metrics.record_compile_failure();
                warn!(key, error = %err, "shader compilation failed");
                return Err(JitError::Compile(err));
            }
        };
        self.metrics.record_compile();
        // A concurrent miss may have compiled and inserted first. Reuse the
        // published unit so the cache never holds two copies of one key.
        if let CacheLookup::Ready(existing) = self.cache.lookup(key) {
            return Ok(PreparedShader::ready(key, entry_point, existing));
        }
        self.cache.insert(key, Arc::clone(&shader), started.elapsed());
        Ok(PreparedShader::ready(key, entry_point, shader))
    }
}
