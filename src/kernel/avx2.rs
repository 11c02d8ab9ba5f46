//! AVX2 Harley-Seal AND-popcount kernel (spec §4.4, lane width 256).
//!
//! The reduction tree is the 4th-iteration AVX2 Harley-Seal algorithm from
//! Mula, Kurz & Lemire, "Faster Population Counts using AVX2 Instructions"
//! (https://arxiv.org/abs/1611.07612), adapted here to fold `A & B` into the
//! carry-save tree instead of a single operand's popcount.

use std::arch::x86_64::*;

const WORDS_PER_REGISTER: usize = 4;

/// Minimum word count for which the AVX2 kernel is worthwhile: one full
/// 16-register Harley-Seal iteration (spec §4.7).
pub const MIN_WORDS: usize = 16 * WORDS_PER_REGISTER;

/// popcount(A ∧ B) over two equal-length, equally-sized word slices.
///
/// Dispatch only selects this kernel after confirming AVX2 support via
/// [`crate::cpu::detect`]; the `unsafe` call below is sound under that
/// precondition.
pub fn intersect_simd_avx2(a: &[u64], b: &[u64]) -> u64 {
    debug_assert_eq!(a.len(), b.len());
    unsafe { intersect_avx2_inner(a, b) }
}

#[target_feature(enable = "avx2")]
unsafe fn intersect_avx2_inner(a: &[u64], b: &[u64]) -> u64 {
    let len = a.len();
    let n_registers = len / WORDS_PER_REGISTER;
    let ra = a.as_ptr() as *const __m256i;
    let rb = b.as_ptr() as *const __m256i;

    let mut cnt = _mm256_setzero_si256();
    let mut ones = _mm256_setzero_si256();
    let mut twos = _mm256_setzero_si256();
    let mut fours = _mm256_setzero_si256();
    let mut eights = _mm256_setzero_si256();
    let mut sixteens = _mm256_setzero_si256();
    let (mut twos_a, mut twos_b, mut fours_a, mut fours_b, mut eights_a, mut eights_b);
    twos_a = _mm256_setzero_si256();
    twos_b = _mm256_setzero_si256();
    fours_a = _mm256_setzero_si256();
    fours_b = _mm256_setzero_si256();
    eights_a = _mm256_setzero_si256();
    eights_b = _mm256_setzero_si256();

    let limit = n_registers - n_registers % 16;
    let mut i = 0isize;
    macro_rules! block {
        ($k:expr) => {
            _mm256_and_si256(
                _mm256_loadu_si256(ra.offset(i + $k)),
                _mm256_loadu_si256(rb.offset(i + $k)),
            )
        };
    }

    while (i as usize) < limit {
        csa256(ones, block!(0), block!(1), &mut twos_a, &mut ones);
        csa256(ones, block!(2), block!(3), &mut twos_b, &mut ones);
        csa256(twos, twos_a, twos_b, &mut fours_a, &mut twos);
        csa256(ones, block!(4), block!(5), &mut twos_a, &mut ones);
        csa256(ones, block!(6), block!(7), &mut twos_b, &mut ones);
        csa256(twos, twos_a, twos_b, &mut fours_b, &mut twos);
        csa256(fours, fours_a, fours_b, &mut eights_a, &mut fours);
        csa256(ones, block!(8), block!(9), &mut twos_a, &mut ones);
        csa256(ones, block!(10), block!(11), &mut twos_b, &mut ones);
        csa256(twos, twos_a, twos_b, &mut fours_a, &mut twos);
        csa256(ones, block!(12), block!(13), &mut twos_a, &mut ones);
        csa256(ones, block!(14), block!(15), &mut twos_b, &mut ones);
        csa256(twos, twos_a, twos_b, &mut fours_b, &mut twos);
        csa256(fours, fours_a, fours_b, &mut eights_b, &mut fours);
        csa256(eights, eights_a, eights_b, &mut sixteens, &mut eights);

        cnt = _mm256_add_epi64(cnt, popcount256(sixteens));
        i += 16;
    }

    cnt = _mm256_slli_epi64(cnt, 4);
    cnt = _mm256_add_epi64(cnt, _mm256_slli_epi64(popcount256(eights), 3));
    cnt = _mm256_add_epi64(cnt, _mm256_slli_epi64(popcount256(fours), 2));
    cnt = _mm256_add_epi64(cnt, _mm256_slli_epi64(popcount256(twos), 1));
    cnt = _mm256_add_epi64(cnt, popcount256(ones));

    let mut total = sum_lanes_256(cnt);

    // Residual registers (n_registers mod 16): plain AND-popcount.
    while (i as usize) < n_registers {
        total += sum_lanes_256(popcount256(block!(0)));
        i += 1;
    }

    // Residual words (len mod WORDS_PER_REGISTER).
    for k in (n_registers * WORDS_PER_REGISTER)..len {
        total += crate::popcount::popcnt64(a[k] & b[k]) as u64;
    }

    total
}

#[inline]
#[target_feature(enable = "avx2")]
unsafe fn sum_lanes_256(v: __m256i) -> u64 {
    _mm256_extract_epi64(v, 0) as u64
        + _mm256_extract_epi64(v, 1) as u64
        + _mm256_extract_epi64(v, 2) as u64
        + _mm256_extract_epi64(v, 3) as u64
}

/// Carry-save adder: `l = a⊕b⊕c`, `h = maj(a,b,c)`.
#[inline]
#[target_feature(enable = "avx2")]
unsafe fn csa256(a: __m256i, b: __m256i, c: __m256i, h: &mut __m256i, l: &mut __m256i) {
    let u = _mm256_xor_si256(a, b);
    *h = _mm256_or_si256(_mm256_and_si256(a, b), _mm256_and_si256(u, c));
    *l = _mm256_xor_si256(u, c);
}

/// Nibble-lookup + sum-of-absolute-differences popcount of a 256-bit lane,
/// sub-lane popcounts landing in each 64-bit slot.
#[inline]
#[target_feature(enable = "avx2")]
unsafe fn popcount256(v: __m256i) -> __m256i {
    let lookup = _mm256_setr_epi8(
        0, 1, 1, 2, 1, 2, 2, 3, 1, 2, 2, 3, 2, 3, 3, 4, 0, 1, 1, 2, 1, 2, 2, 3, 1, 2, 2, 3, 2, 3,
        3, 4,
    );
    let low_mask = _mm256_set1_epi8(0x0f);
    let lo = _mm256_and_si256(v, low_mask);
    let hi = _mm256_and_si256(_mm256_srli_epi16(v, 4), low_mask);
    let popcnt_lo = _mm256_shuffle_epi8(lookup, lo);
    let popcnt_hi = _mm256_shuffle_epi8(lookup, hi);

    _mm256_sad_epu8(_mm256_add_epi8(popcnt_lo, popcnt_hi), _mm256_setzero_si256())
}
