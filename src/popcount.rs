//! Scalar 64-bit population count primitive.
//!
//! This is the leaf of the dependency graph: every wider kernel eventually
//! bottoms out in a popcount of a 64-bit lane. `u64::count_ones` compiles to
//! the hardware `POPCNT` instruction whenever the target feature is enabled
//! (or unconditionally on `aarch64`/other targets with native support), and
//! falls back to a SWAR bit-trick otherwise, so there is no separate
//! "software fallback" path to maintain here.

/// Number of 1-bits in `x`.
#[inline(always)]
pub fn popcnt64(x: u64) -> u32 {
    x.count_ones()
}
