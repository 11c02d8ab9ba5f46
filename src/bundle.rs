//! Safe, slice-based value types for the engine's two public entry points.
//!
//! The language-neutral interface (spec §6) describes a raw `(ptr, n,
//! words_per_vector)` triple. The idiomatic Rust expression of that
//! "indexed slice view" (REDESIGN FLAGS, spec §9) is [`VectorBundle`]: a
//! borrowed slice plus the two dimensions, with `vector(i)` returning the
//! `i`-th sub-slice instead of the caller doing pointer arithmetic.

use thiserror::Error;

/// Boundary-construction errors for [`VectorBundle`] and [`SparseLayout`].
///
/// These are raised once per call, at construction time — never on the
/// per-pair hot path inside a kernel. The kernels themselves never return
/// `Result`: a violated precondition past this point is a contract
/// violation per spec §7, not a recoverable error.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BuildError {
    #[error(
        "bundle length mismatch: n_vectors ({n_vectors}) * words_per_vector \
         ({words_per_vector}) = {expected}, but the buffer holds {actual} words"
    )]
    MismatchedBundleLength {
        n_vectors: usize,
        words_per_vector: usize,
        expected: usize,
        actual: usize,
    },

    #[error(
        "sparse side-table arrays disagree in length: popcounts has {popcounts} \
         entries, offsets has {offsets}"
    )]
    MismatchedSparseArrays { popcounts: usize, offsets: usize },
}

/// A borrowed view over `n_vectors` bit vectors of `words_per_vector` 64-bit
/// words each, packed contiguously (spec §3's "vector bundle").
#[derive(Debug, Clone, Copy)]
pub struct VectorBundle<'a> {
    words: &'a [u64],
    n_vectors: usize,
    words_per_vector: usize,
}

impl<'a> VectorBundle<'a> {
    /// Builds a bundle view, checking that `words` holds exactly
    /// `n_vectors * words_per_vector` words.
    pub fn new(
        words: &'a [u64],
        n_vectors: usize,
        words_per_vector: usize,
    ) -> Result<Self, BuildError> {
        let expected = n_vectors * words_per_vector;
        if words.len() != expected {
            return Err(BuildError::MismatchedBundleLength {
                n_vectors,
                words_per_vector,
                expected,
                actual: words.len(),
            });
        }

        Ok(Self {
            words,
            n_vectors,
            words_per_vector,
        })
    }

    /// Builds a bundle view without checking `words.len()`.
    ///
    /// # Safety (contract, not memory-safety)
    /// The caller must ensure `words.len() == n_vectors * words_per_vector`;
    /// violating this is a documented contract violation (spec §7), not
    /// undefined behavior in the Rust sense — out-of-range reads inside
    /// `vector()` would simply panic rather than corrupt memory — but the
    /// returned cardinality is meaningless if the shape is wrong.
    pub(crate) fn new_unchecked(words: &'a [u64], n_vectors: usize, words_per_vector: usize) -> Self {
        Self {
            words,
            n_vectors,
            words_per_vector,
        }
    }

    #[inline]
    pub fn n_vectors(&self) -> usize {
        self.n_vectors
    }

    #[inline]
    pub fn words_per_vector(&self) -> usize {
        self.words_per_vector
    }

    #[inline]
    pub fn words(&self) -> &'a [u64] {
        self.words
    }

    /// The `i`-th vector's words, `i < n_vectors`.
    #[inline]
    pub fn vector(&self, i: usize) -> &'a [u64] {
        let start = i * self.words_per_vector;
        &self.words[start..start + self.words_per_vector]
    }
}

/// A borrowed view over the sparse side-table of spec §3: per-vector
/// popcount, the offset of that vector's set-bit positions within
/// `positions`, and the concatenated ascending position lists themselves.
#[derive(Debug, Clone, Copy)]
pub struct SparseLayout<'a> {
    popcounts: &'a [u32],
    offsets: &'a [u32],
    positions: &'a [u32],
}

impl<'a> SparseLayout<'a> {
    /// Builds a sparse layout view, checking that `popcounts` and `offsets`
    /// agree in length (one entry per vector).
    ///
    /// Per spec §7, `positions` being non-ascending or containing an
    /// out-of-range index is a contract violation the engine need not
    /// detect in release builds; in debug builds, [`SparseLayout::vector`]
    /// asserts the slice it hands back is ascending.
    pub fn new(
        popcounts: &'a [u32],
        offsets: &'a [u32],
        positions: &'a [u32],
    ) -> Result<Self, BuildError> {
        if popcounts.len() != offsets.len() {
            return Err(BuildError::MismatchedSparseArrays {
                popcounts: popcounts.len(),
                offsets: offsets.len(),
            });
        }

        Ok(Self {
            popcounts,
            offsets,
            positions,
        })
    }

    /// Builds a sparse layout view without checking array-length agreement;
    /// see [`VectorBundle::new_unchecked`]'s safety note for the same
    /// "contract, not memory-safety" caveat.
    pub(crate) fn new_unchecked(popcounts: &'a [u32], offsets: &'a [u32], positions: &'a [u32]) -> Self {
        Self {
            popcounts,
            offsets,
            positions,
        }
    }

    #[inline]
    pub fn popcount(&self, i: usize) -> u32 {
        self.popcounts[i]
    }

    /// The ascending set-bit positions of vector `i`.
    #[inline]
    pub fn positions(&self, i: usize) -> &'a [u32] {
        let start = self.offsets[i] as usize;
        let end = start + self.popcounts[i] as usize;
        let slice = &self.positions[start..end];

        debug_assert!(
            slice.windows(2).all(|w| w[0] < w[1]),
            "positions for vector {} are not strictly ascending",
            i
        );

        slice
    }
}
