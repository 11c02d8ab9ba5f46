#![deny(bare_trait_objects)]

//! Sum of pairwise bitmap-intersection cardinalities.
//!
//! Given `N` equal-length bit vectors of `M` bits each, this crate computes
//! `Σ_{i<j} popcount(Vᵢ ∧ Vⱼ)` — the all-pairs AND-popcount sum used, e.g.,
//! to aggregate similarity over dense binary features such as genotype
//! presence masks.
//!
//! # External differences from a hand-rolled kernel
//!  - The dense kernel is chosen once per call by runtime CPU-feature
//!    detection (POPCNT/SSE4.1/AVX2/AVX-512BW), not by compile-time target
//!    features — a binary built for a baseline x86_64 target still uses the
//!    host's widest available kernel.
//!  - Only x86_64 has a SIMD path; every other target compiles the scalar
//!    kernel only.
//!  - The public entry points take borrowed slices ([`VectorBundle`],
//!    [`SparseLayout`]), not raw pointers. [`intersect_raw`] and
//!    [`intersect_sparse_raw`] retain the raw-pointer shape of the
//!    language-neutral interface for FFI-style callers.
//!
//! # Internal differences
//!  - All SIMD kernels work on the Harley–Seal carry-save-adder reduction
//!    (one popcount per 16 lane-width blocks, not one per block), which is
//!    what makes the dense path memory-bandwidth bound rather than
//!    popcount-throughput bound.
//!  - The all-pairs driver tiles the bundle into cache-sized blocks so a
//!    loaded vector is reused `B` times instead of once.
//!
//! # Non-goals
//!  - Producing the intersection bitmap itself — only the cardinality.
//!  - Bit vectors of unequal length within one call.
//!  - Persistence or internal concurrency (the engine is pure, re-entrant,
//!    and single-threaded; see the module docs on `cpu` for the one piece
//!    of shared state).

mod alloc;
mod bundle;
mod cpu;
mod driver;
mod kernel;
mod popcount;

pub use alloc::{required_alignment, AlignedVec};
pub use bundle::{BuildError, SparseLayout, VectorBundle};

/// Default cache working-set budget, in bytes, used to size a block tile
/// (spec §3, §6). Approximates an L2 working set.
pub const DEFAULT_BLOCK_BUDGET_BYTES: usize = 256_000;

/// The block size the dispatch façade computes for a given
/// `words_per_vector`, per spec §3: `⌊budget / (W·8)⌋`, clamped to `>= 1`.
pub fn block_size_for(words_per_vector: usize) -> usize {
    if words_per_vector == 0 {
        return 1;
    }
    (DEFAULT_BLOCK_BUDGET_BYTES / (words_per_vector * 8)).max(1)
}

/// Σ popcount(Vᵢ ∧ Vⱼ) over every unordered pair in `bundle`.
///
/// Detects CPU features once (cached process-wide), selects the widest
/// kernel both the host and `bundle.words_per_vector()` support, and drives
/// the cache-blocked all-pairs traversal.
pub fn intersect(bundle: &VectorBundle) -> u64 {
    let kernel = kernel::select_dense(bundle.words_per_vector());
    let block_size = block_size_for(bundle.words_per_vector());
    driver::sum_pairs_dense(bundle, kernel, block_size)
}

/// Σ popcount(Vᵢ ∧ Vⱼ) over every unordered pair in `bundle`, using the
/// sparse positional kernel for any pair where either operand's popcount is
/// below `cutoff` (spec §4.6's sparse-aware variant).
///
/// Bit-exact with [`intersect`] for the same bundle at any `cutoff`,
/// including `cutoff == 0` (dense path always taken) and a cutoff larger
/// than every popcount in `layout` (sparse path always taken) — this
/// equivalence is a required property (spec §8, property 2).
pub fn intersect_sparse(bundle: &VectorBundle, layout: &SparseLayout, cutoff: u32) -> u64 {
    let dense_kernel = kernel::select_dense(bundle.words_per_vector());
    let sparse_kernel = kernel::sparse_kernel();
    let block_size = block_size_for(bundle.words_per_vector());
    driver::sum_pairs_sparse(bundle, layout, cutoff, dense_kernel, sparse_kernel, block_size)
}

/// Raw-pointer form of [`intersect`], mirroring spec §6's language-neutral
/// `intersect(bundle_ptr, n_vectors, words_per_vector) -> u64` signature.
///
/// # Safety
/// `bundle_ptr` must be valid for reads of `n_vectors * words_per_vector`
/// `u64`s and aligned to [`required_alignment`] bytes. The engine never
/// writes through `bundle_ptr`. Misaligned or null-with-nonzero-count
/// pointers are contract violations (spec §7), not detected here.
pub unsafe fn intersect_raw(bundle_ptr: *const u64, n_vectors: u32, words_per_vector: u32) -> u64 {
    let total = n_vectors as usize * words_per_vector as usize;
    let words = std::slice::from_raw_parts(bundle_ptr, total);
    let bundle = VectorBundle::new_unchecked(words, n_vectors as usize, words_per_vector as usize);
    intersect(&bundle)
}

/// Raw-pointer form of [`intersect_sparse`], mirroring spec §6's
/// `intersect_sparse(bundle_ptr, n_vectors, words_per_vector, popcounts_ptr,
/// positions_ptr, offsets_ptr, cutoff) -> u64` signature.
///
/// # Safety
/// Same contract as [`intersect_raw`] for `bundle_ptr`, plus: `popcounts_ptr`
/// and `offsets_ptr` must be valid for reads of `n_vectors` `u32`s each, and
/// `positions_ptr` valid for reads of `offsets_ptr[n_vectors-1] +
/// popcounts_ptr[n_vectors-1]` `u32`s, strictly ascending within each
/// vector's window and each value `< words_per_vector * 64` — unenforced
/// (spec §7).
pub unsafe fn intersect_sparse_raw(
    bundle_ptr: *const u64,
    n_vectors: u32,
    words_per_vector: u32,
    popcounts_ptr: *const u32,
    positions_ptr: *const u32,
    offsets_ptr: *const u32,
    cutoff: u32,
) -> u64 {
    let total = n_vectors as usize * words_per_vector as usize;
    let words = std::slice::from_raw_parts(bundle_ptr, total);
    let bundle = VectorBundle::new_unchecked(words, n_vectors as usize, words_per_vector as usize);

    let n = n_vectors as usize;
    let popcounts = std::slice::from_raw_parts(popcounts_ptr, n);
    let offsets = std::slice::from_raw_parts(offsets_ptr, n);
    let n_positions =
        offsets.last().copied().unwrap_or(0) as usize + popcounts.last().copied().unwrap_or(0) as usize;
    let positions = std::slice::from_raw_parts(positions_ptr, n_positions);
    let layout = SparseLayout::new_unchecked(popcounts, offsets, positions);

    intersect_sparse(&bundle, &layout, cutoff)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bundle_of<'a>(words: &'a [u64], n_vectors: usize, words_per_vector: usize) -> VectorBundle<'a> {
        VectorBundle::new(words, n_vectors, words_per_vector).unwrap()
    }

    // S1
    #[test]
    fn scenario_disjoint_halves() {
        let words = [0x0000_0000_0000_000Fu64, 0x0000_000F_0000_0000u64];
        let bundle = bundle_of(&words, 2, 1);
        assert_eq!(intersect(&bundle), 0);
    }

    // S2
    #[test]
    fn scenario_identical_all_ones() {
        let words = [u64::MAX, u64::MAX];
        let bundle = bundle_of(&words, 2, 1);
        assert_eq!(intersect(&bundle), 64);
    }

    // S3
    #[test]
    fn scenario_three_vectors_alternating_bits() {
        let words = [0xAAAA_AAAA_AAAA_AAAAu64, 0x5555_5555_5555_5555u64, u64::MAX];
        let bundle = bundle_of(&words, 3, 1);
        assert_eq!(intersect(&bundle), 64);
    }

    // S4
    #[test]
    fn scenario_four_vectors_two_words_all_ones() {
        let words = [u64::MAX; 8];
        let bundle = bundle_of(&words, 4, 2);
        assert_eq!(intersect(&bundle), 768);
    }

    // S5
    #[test]
    fn scenario_five_vectors_one_bit_each_disjoint() {
        let words_per_vector = 16;
        let mut words = vec![0u64; 5 * words_per_vector];
        for i in 0..5usize {
            words[i * words_per_vector] = 1u64 << i;
        }
        let bundle = bundle_of(&words, 5, words_per_vector);
        assert_eq!(intersect(&bundle), 0);
    }

    // S6
    #[test]
    fn scenario_sparse_path_matches_dense() {
        let words_per_vector = 1024 / 64;
        let mut words = vec![0u64; 3 * words_per_vector];

        let v0_positions = [10u32, 100, 500, 900, 1000];
        let v1_positions = [100u32, 200, 900];

        for &p in &v0_positions {
            words[(p as usize) / 64] |= 1u64 << (p % 64);
        }
        let v0_words: Vec<u64> = words[0..words_per_vector].to_vec();

        let mut v1_words = vec![0u64; words_per_vector];
        for &p in &v1_positions {
            v1_words[(p as usize) / 64] |= 1u64 << (p % 64);
        }
        words[words_per_vector..2 * words_per_vector].copy_from_slice(&v1_words);
        words[2 * words_per_vector..3 * words_per_vector].copy_from_slice(&v0_words);

        let bundle = bundle_of(&words, 3, words_per_vector);
        assert_eq!(intersect(&bundle), 2 + 5 + 2);

        let popcounts = [5u32, 3, 5];
        let offsets = [0u32, 5, 8];
        let mut positions = Vec::new();
        positions.extend_from_slice(&v0_positions);
        positions.extend_from_slice(&v1_positions);
        positions.extend_from_slice(&v0_positions);
        let layout = SparseLayout::new(&popcounts, &offsets, &positions).unwrap();

        assert_eq!(intersect_sparse(&bundle, &layout, 10), 9);
        assert_eq!(intersect_sparse(&bundle, &layout, 0), 9);
        assert_eq!(intersect_sparse(&bundle, &layout, u32::MAX), 9);
    }

    #[test]
    fn fewer_than_two_vectors_returns_zero() {
        let words = [0u64; 3];
        let bundle = bundle_of(&words, 1, 3);
        assert_eq!(intersect(&bundle), 0);

        let empty: [u64; 0] = [];
        let bundle = bundle_of(&empty, 0, 0);
        assert_eq!(intersect(&bundle), 0);
    }

    #[test]
    fn zero_words_per_vector_returns_zero() {
        let empty: [u64; 0] = [];
        let bundle = bundle_of(&empty, 5, 0);
        assert_eq!(intersect(&bundle), 0);
    }

    #[test]
    fn raw_api_matches_safe_api() {
        let words = [u64::MAX; 6];
        unsafe {
            assert_eq!(intersect_raw(words.as_ptr(), 3, 2), 3 * 128);
        }
    }
}
