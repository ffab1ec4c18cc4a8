use ahash::AHasher;
use std::hash::Hasher;

use crate::program::ProgramIdentity;

/// Fixed-size digest of a program identity, used for O(1) cache lookup.
///
/// Derivation is deterministic; collision probability across independent
/// inputs is treated as negligible, not zero.
pub type CacheKey = u64;

/// Derives the cache key for a (code, swizzle) pair.
///
/// Each buffer is hashed independently and the two digests are mixed, so
/// programs with identical code but different swizzle tables cannot collide
/// by construction.
pub fn derive_key(code: &[u32], swizzle_data: &[u32]) -> CacheKey {
    hash_combine(hash_words(code), hash_words(swizzle_data))
}

pub fn identity_key(program: &ProgramIdentity) -> CacheKey {
    derive_key(program.code(), program.swizzle_data())
}

fn hash_words(words: &[u32]) -> u64 {
    // AHasher::default() uses fixed keys, keeping derivation deterministic.
    let mut hasher = AHasher::default();
    for word in words {
        hasher.write_u32(*word);
    }
    hasher.write_usize(words.len());
    hasher.finish()
}

// 64-bit variant of the boost-style combine.
fn hash_combine(lhs: u64, rhs: u64) -> u64 {
    lhs ^ rhs
        .wrapping_add(0x9e37_79b9_7f4a_7c15)
        .wrapping_add(lhs << 12)
        .wrapping_add(lhs >> 4)
}
