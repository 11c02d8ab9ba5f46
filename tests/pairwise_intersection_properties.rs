//! Property-based tests for the pairwise intersection-count engine.
//!
//! Mirrors the universal properties enumerated for the all-pairs AND-popcount
//! sum: kernel-width equivalence, dense/sparse equivalence, commutativity
//! of pair order, identity/annihilator bundles, additivity over disjoint
//! splits, and alignment/block-size invariance.

use std::sync::Once;

use proptest::prelude::*;

use fast_intersect::{block_size_for, intersect, intersect_sparse, required_alignment, SparseLayout, VectorBundle};

static LOGGING: Once = Once::new();

/// Initializes `env_logger` once per test process, mirroring the teacher
/// pack's own `init_logging` helper (`fgantt-yse/src/tuning/performance.rs`),
/// so `cpu::detect`'s one-time `log::debug!` feature-detection line is
/// observable when the suite is run with `RUST_LOG=debug`.
fn init_logging() {
    LOGGING.call_once(|| {
        env_logger::init();
    });
}

fn cases(default: u32) -> u32 {
    std::env::var("PROPTEST_CASES")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn config() -> ProptestConfig {
    ProptestConfig::with_cases(cases(256))
}

/// A bundle of `n_vectors` random bit vectors, `words_per_vector` words each.
fn arb_bundle_words(max_n: usize, max_w: usize) -> impl Strategy<Value = (usize, usize, Vec<u64>)> {
    (1..=max_n, 1..=max_w).prop_flat_map(|(n, w)| {
        prop::collection::vec(any::<u64>(), n * w).prop_map(move |words| (n, w, words))
    })
}

fn naive_sum(words: &[u64], n: usize, w: usize) -> u64 {
    let mut total = 0u64;
    for i in 0..n {
        for j in (i + 1)..n {
            let a = &words[i * w..(i + 1) * w];
            let b = &words[j * w..(j + 1) * w];
            let mut pair = 0u64;
            for k in 0..w {
                pair += (a[k] & b[k]).count_ones() as u64;
            }
            total += pair;
        }
    }
    total
}

fn sparse_layout_for(words: &[u64], n: usize, w: usize) -> (Vec<u32>, Vec<u32>, Vec<u32>) {
    let mut popcounts = Vec::with_capacity(n);
    let mut offsets = Vec::with_capacity(n);
    let mut positions = Vec::new();

    for v in 0..n {
        offsets.push(positions.len() as u32);
        let vector = &words[v * w..(v + 1) * w];
        let mut count = 0u32;
        for (word_idx, &word) in vector.iter().enumerate() {
            for bit in 0..64 {
                if (word >> bit) & 1 != 0 {
                    positions.push((word_idx * 64 + bit) as u32);
                    count += 1;
                }
            }
        }
        popcounts.push(count);
    }

    (popcounts, offsets, positions)
}

proptest! {
    #![proptest_config(config())]

    /// Property 1: whatever kernel gets selected agrees with a naive
    /// per-bit reference sum, for arbitrary small-to-moderate bundles.
    #[test]
    fn matches_naive_reference((n, w, words) in arb_bundle_words(8, 40)) {
        init_logging();
        let bundle = VectorBundle::new(&words, n, w).unwrap();
        prop_assert_eq!(intersect(&bundle), naive_sum(&words, n, w));
    }

    /// Property 2: the sparse-aware path is bit-exact with the dense-only
    /// path at any cutoff, including the two extremes (always dense, always
    /// sparse).
    #[test]
    fn sparse_matches_dense_at_every_cutoff((n, w, words) in arb_bundle_words(6, 20), cutoff_pick in 0..3u32) {
        init_logging();
        let bundle = VectorBundle::new(&words, n, w).unwrap();
        let (popcounts, offsets, positions) = sparse_layout_for(&words, n, w);
        let layout = SparseLayout::new(&popcounts, &offsets, &positions).unwrap();

        let cutoff = match cutoff_pick {
            0 => 0,
            1 => u32::MAX,
            _ => (w as u32 * 64) / 2,
        };

        let dense = intersect(&bundle);
        let sparse = intersect_sparse(&bundle, &layout, cutoff);
        prop_assert_eq!(dense, sparse);
    }

    /// Property 3: the result does not depend on which of two vectors is
    /// "first" — reversing the bundle's vector order leaves the sum fixed.
    #[test]
    fn order_of_vectors_does_not_matter((n, w, words) in arb_bundle_words(8, 20)) {
        init_logging();
        let bundle = VectorBundle::new(&words, n, w).unwrap();
        let forward = intersect(&bundle);

        let mut reversed_words = vec![0u64; words.len()];
        for i in 0..n {
            let src = &words[i * w..(i + 1) * w];
            let dst_start = (n - 1 - i) * w;
            reversed_words[dst_start..dst_start + w].copy_from_slice(src);
        }
        let reversed_bundle = VectorBundle::new(&reversed_words, n, w).unwrap();
        prop_assert_eq!(forward, intersect(&reversed_bundle));
    }

    /// Property 4: a bundle of identical copies of one vector of popcount
    /// `p` sums to `C(n,2) * p`.
    #[test]
    fn identical_vectors_sum_to_closed_form(w in 1..12usize, n in 2..8usize, seed in any::<u64>()) {
        init_logging();
        let mut single = vec![0u64; w];
        let mut s = seed;
        for word in single.iter_mut() {
            s = s.wrapping_mul(0x9E37_79B9_7F4A_7C15).wrapping_add(1);
            *word = s;
        }
        let words: Vec<u64> = (0..n).flat_map(|_| single.clone()).collect();
        let bundle = VectorBundle::new(&words, n, w).unwrap();

        let p: u64 = single.iter().map(|x| x.count_ones() as u64).sum();
        let pairs = (n * (n - 1) / 2) as u64;
        prop_assert_eq!(intersect(&bundle), pairs * p);
    }

    /// Property 5: a bundle where every vector is all-zero words always
    /// sums to zero, regardless of n or w.
    #[test]
    fn all_zero_bundle_is_annihilator(n in 0..10usize, w in 0..10usize) {
        init_logging();
        let words = vec![0u64; n * w];
        let bundle = VectorBundle::new(&words, n, w).unwrap();
        prop_assert_eq!(intersect(&bundle), 0);
    }

    /// Property 6: splitting a bundle's vectors into two disjoint groups,
    /// the whole-bundle sum equals the sum of each group's internal pairs
    /// plus the sum of every cross pair between the groups.
    #[test]
    fn additive_over_disjoint_vector_splits((n, w, words) in arb_bundle_words(10, 16), split_pick in 0..10usize) {
        init_logging();
        prop_assume!(n >= 2);
        let split = 1 + split_pick % (n - 1);

        let bundle = VectorBundle::new(&words, n, w).unwrap();
        let whole = intersect(&bundle);

        let left_words = &words[0..split * w];
        let right_words = &words[split * w..];
        let left_bundle = VectorBundle::new(left_words, split, w).unwrap();
        let right_bundle = VectorBundle::new(right_words, n - split, w).unwrap();

        let mut cross = 0u64;
        for i in 0..split {
            for j in 0..(n - split) {
                let a = left_bundle.vector(i);
                let b = right_bundle.vector(j);
                let mut pair = 0u64;
                for k in 0..w {
                    pair += (a[k] & b[k]).count_ones() as u64;
                }
                cross += pair;
            }
        }

        prop_assert_eq!(whole, intersect(&left_bundle) + intersect(&right_bundle) + cross);
    }

    /// Property 7: `required_alignment` and `block_size_for` are pure,
    /// deterministic functions of (implicit) CPU features and
    /// `words_per_vector` — repeated calls never disagree.
    #[test]
    fn alignment_and_block_size_are_stable(w in 0..64usize) {
        init_logging();
        prop_assert_eq!(required_alignment(), required_alignment());
        prop_assert_eq!(block_size_for(w), block_size_for(w));
        prop_assert!(matches!(required_alignment(), 8 | 16 | 32 | 64));
        prop_assert!(block_size_for(w) >= 1);
    }
}
