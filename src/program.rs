use std::sync::Arc;

/// Upper bound on program code length, in 32-bit words. Entry points must
/// fall below this offset.
pub const MAX_PROGRAM_CODE_LENGTH: usize = 4096;

/// Upper bound on swizzle table length, in 32-bit words.
pub const MAX_SWIZZLE_DATA_LENGTH: usize = 4096;

/// Immutable snapshot of the content that identifies a shader program.
///
/// The identity is the pair of code and swizzle buffers only. Entry points
/// are deliberately excluded: the same compiled unit can be entered at
/// different offsets, so programs differing only in entry point share one
/// cache entry.
///
/// Buffers are held behind `Arc` so that work items queued for background
/// compilation carry an owned snapshot, never a borrow of caller memory.
#[derive(Debug, Clone)]
pub struct ProgramIdentity {
    code: Arc<[u32]>,
    swizzle_data: Arc<[u32]>,
}

impl ProgramIdentity {
    pub fn new(code: impl Into<Arc<[u32]>>, swizzle_data: impl Into<Arc<[u32]>>) -> Self {
        Self {
            code: code.into(),
            swizzle_data: swizzle_data.into(),
        }
    }

    pub fn code(&self) -> &[u32] {
        &self.code
    }

    pub fn swizzle_data(&self) -> &[u32] {
        &self.swizzle_data
    }
}
