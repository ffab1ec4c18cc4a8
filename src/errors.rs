use thiserror::Error;

use crate::compiler::CompileError;

/// Per-request failures surfaced by the engine facade.
///
/// None of these are process-fatal: an `InvalidEntryPoint` signals a usage
/// defect upstream, a `Compile` failure means the draw using the program is
/// skipped, and `NotReady` is a valid transient state under background
/// compilation, not an error condition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JitError {
    #[error("entry point {0:#x} is outside the maximum program length")]
    InvalidEntryPoint(usize),
    #[error("shader compilation failed: {0}")]
    Compile(#[from] CompileError),
    #[error("shader is still compiling")]
    NotReady,
}
