//! Just-in-time compilation cache for an emulated GPU shader pipeline.
//!
//! Shader programs arrive as raw microcode plus swizzle tables and must be
//! translated to native code before execution. Translation is expensive
//! relative to a draw call, so this crate keys each program by content
//! hash, caches compiled units under a bounded LRU policy, and deduplicates
//! in-flight compilations so the render thread never pays for the same
//! program twice.
//!
//! The actual instruction selection is supplied by the embedder through the
//! [`ShaderCompiler`] trait; this crate decides when and where that step
//! runs (inline on the requesting thread, or on a background worker pool)
//! and manages the lifetime of everything it produces.
//!
//! ```no_run
//! use shaderjit::{JitEngine, ProgramIdentity, RunOutcome};
//! # use shaderjit::{CompileError, CompiledShader, ShaderCompiler};
//! # struct Nop;
//! # struct NopShader;
//! # impl CompiledShader for NopShader {
//! #     type State = ();
//! #     fn run(&self, _: &mut (), _: usize) {}
//! # }
//! # impl ShaderCompiler for Nop {
//! #     type Shader = NopShader;
//! #     fn compile(&self, _: &ProgramIdentity) -> Result<NopShader, CompileError> {
//! #         Ok(NopShader)
//! #     }
//! # }
//!
//! let engine = JitEngine::new(Nop);
//! let program = ProgramIdentity::new(vec![0x4e00_0000u32], vec![0u32]);
//! let prepared = engine.prepare(&program, 0)?;
//! let mut state = ();
//! match engine.try_run(&prepared, &mut state) {
//!     RunOutcome::Completed => {}
//!     RunOutcome::Skipped(_) => {} // draw skipped, retry next frame
//! }
//! # Ok::<(), shaderjit::JitError>(())
//! ```

pub mod cache;
pub mod compiler;
pub mod config;
pub mod engine;
pub mod errors;
pub mod key;
pub mod metrics;
pub mod pending;
pub mod program;

mod pool;

pub use cache::metadata::EntryMetadata;
pub use cache::{CacheLookup, CacheStats, MAX_CACHE_SIZE, ReserveOutcome, ShaderCache};
pub use compiler::{CompileError, CompiledShader, ShaderCompiler};
pub use config::{CompileStrategy, JitConfig, TitleConfig, TitleOverrides};
pub use engine::{JitEngine, PreparedShader, RunOutcome, SkipReason};
pub use errors::JitError;
pub use key::{CacheKey, derive_key};
pub use metrics::{JitMetrics, JitMetricsSnapshot};
pub use pending::{CompileHandle, CompileOutcome};
pub use program::{MAX_PROGRAM_CODE_LENGTH, MAX_SWIZZLE_DATA_LENGTH, ProgramIdentity};
