//! The kernel family and the dispatch table that selects among them.
//!
//! REDESIGN FLAGS (spec §9): the reference implementation's macro-generated,
//! conditionally-compiled kernel variants collapse here into a small set of
//! plain functions sharing one signature, selected at runtime by
//! [`select_dense`]. On non-x86_64 targets only [`scalar`] is compiled in.

pub mod scalar;

#[cfg(target_arch = "x86_64")]
pub mod avx2;
#[cfg(target_arch = "x86_64")]
pub mod avx512;
#[cfg(target_arch = "x86_64")]
pub mod sse;

use crate::cpu;

/// popcount(A ∧ B) over two equal-length word slices.
pub type KernelFn = fn(&[u64], &[u64]) -> u64;

/// The sparse positional kernel: (dense A, dense B, positions of A, positions of B) -> popcount(A ∧ B).
pub type SparseKernelFn = fn(&[u64], &[u64], &[u32], &[u32]) -> u64;

/// Selects the widest dense kernel the host CPU supports and that
/// `words_per_vector` is large enough to make worthwhile (spec §4.7, point
/// 2): a kernel at lane width `L` requires `words_per_vector >= 16*(L/64)`,
/// otherwise dispatch falls through to the next narrower kernel.
pub fn select_dense(words_per_vector: usize) -> KernelFn {
    #[cfg(target_arch = "x86_64")]
    {
        let features = cpu::detect();

        if features.has_avx512bw() && words_per_vector >= avx512::MIN_WORDS {
            return avx512::intersect_simd_avx512;
        }
        if features.has_avx2() && words_per_vector >= avx2::MIN_WORDS {
            return avx2::intersect_simd_avx2;
        }
        if features.has_sse41() && words_per_vector >= sse::MIN_WORDS {
            return sse::intersect_simd_sse;
        }
    }
    #[cfg(not(target_arch = "x86_64"))]
    {
        let _ = words_per_vector;
    }

    scalar::intersect_scalar
}

/// The sparse positional kernel has a single implementation regardless of
/// SIMD width (spec §4.5 describes no per-lane-width variant).
pub fn sparse_kernel() -> SparseKernelFn {
    scalar::intersect_scalar_list
}
