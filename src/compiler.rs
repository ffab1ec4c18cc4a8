use thiserror::Error;

use crate::program::ProgramIdentity;

/// Failure reported by the translate-to-native step. Recoverable: the
/// request yields no usable unit and the operation requiring it is skipped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    #[error("malformed shader program: {0}")]
    MalformedProgram(String),
    #[error("native code emission failed: {0}")]
    Emission(String),
    #[error("compiler panicked: {0}")]
    Panic(String),
}

/// Executable artifact produced by translating one program.
///
/// Immutable once built; invoked at an entry point against the caller's
/// interpreter state. Exactly one concrete representation is expected per
/// target architecture.
pub trait CompiledShader: Send + Sync + 'static {
    /// Interpreter state the shader mutates when it runs.
    type State;

    fn run(&self, state: &mut Self::State, entry_point: usize);
}

/// The opaque compile step consumed by the engine.
///
/// Implementations must be safe to invoke concurrently from multiple worker
/// threads on independent inputs, and should report failures through
/// [`CompileError`] rather than panicking. Background workers convert a
/// panic into [`CompileError::Panic`] so the pool and the pending
/// reservation survive, but an inline compile panics on the calling thread.
pub trait ShaderCompiler: Send + Sync + 'static {
    type Shader: CompiledShader;

    fn compile(&self, program: &ProgramIdentity) -> Result<Self::Shader, CompileError>;
}
