//! SSE4.1 Harley-Seal AND-popcount kernel (spec §4.4, lane width 128).
//!
//! At 128 bits there is no cheap in-register byte-popcount shuffle worth
//! the setup cost, so popcount of a lane is computed by extracting its two
//! 64-bit halves and using the scalar primitive directly (spec §4.2's
//! "explicit 64-bit extract+popcount at 128" option).

use std::arch::x86_64::*;

use crate::popcount::popcnt64;

const WORDS_PER_REGISTER: usize = 2;

/// Minimum word count for which the SSE4.1 kernel is worthwhile.
pub const MIN_WORDS: usize = 16 * WORDS_PER_REGISTER;

pub fn intersect_simd_sse(a: &[u64], b: &[u64]) -> u64 {
    debug_assert_eq!(a.len(), b.len());
    unsafe { intersect_sse_inner(a, b) }
}

#[target_feature(enable = "sse4.1")]
unsafe fn intersect_sse_inner(a: &[u64], b: &[u64]) -> u64 {
    let len = a.len();
    let n_registers = len / WORDS_PER_REGISTER;
    let ra = a.as_ptr() as *const __m128i;
    let rb = b.as_ptr() as *const __m128i;

    let mut ones = _mm_setzero_si128();
    let mut twos = _mm_setzero_si128();
    let mut fours = _mm_setzero_si128();
    let mut eights = _mm_setzero_si128();
    let mut sixteens = _mm_setzero_si128();
    let mut twos_a = _mm_setzero_si128();
    let mut twos_b = _mm_setzero_si128();
    let mut fours_a = _mm_setzero_si128();
    let mut fours_b = _mm_setzero_si128();
    let mut eights_a = _mm_setzero_si128();
    let mut eights_b = _mm_setzero_si128();

    let limit = n_registers - n_registers % 16;
    let mut i = 0isize;
    macro_rules! block {
        ($k:expr) => {
            _mm_and_si128(
                _mm_loadu_si128(ra.offset(i + $k)),
                _mm_loadu_si128(rb.offset(i + $k)),
            )
        };
    }

    let mut cnt: u64 = 0;
    while (i as usize) < limit {
        csa128(ones, block!(0), block!(1), &mut twos_a, &mut ones);
        csa128(ones, block!(2), block!(3), &mut twos_b, &mut ones);
        csa128(twos, twos_a, twos_b, &mut fours_a, &mut twos);
        csa128(ones, block!(4), block!(5), &mut twos_a, &mut ones);
        csa128(ones, block!(6), block!(7), &mut twos_b, &mut ones);
        csa128(twos, twos_a, twos_b, &mut fours_b, &mut twos);
        csa128(fours, fours_a, fours_b, &mut eights_a, &mut fours);
        csa128(ones, block!(8), block!(9), &mut twos_a, &mut ones);
        csa128(ones, block!(10), block!(11), &mut twos_b, &mut ones);
        csa128(twos, twos_a, twos_b, &mut fours_a, &mut twos);
        csa128(ones, block!(12), block!(13), &mut twos_a, &mut ones);
        csa128(ones, block!(14), block!(15), &mut twos_b, &mut ones);
        csa128(twos, twos_a, twos_b, &mut fours_b, &mut twos);
        csa128(fours, fours_a, fours_b, &mut eights_b, &mut fours);
        csa128(eights, eights_a, eights_b, &mut sixteens, &mut eights);

        cnt += popcount128(sixteens);
        i += 16;
    }

    cnt <<= 4;
    cnt += popcount128(eights) << 3;
    cnt += popcount128(fours) << 2;
    cnt += popcount128(twos) << 1;
    cnt += popcount128(ones);

    while (i as usize) < n_registers {
        cnt += popcount128(block!(0));
        i += 1;
    }

    for k in (n_registers * WORDS_PER_REGISTER)..len {
        cnt += popcnt64(a[k] & b[k]) as u64;
    }

    cnt
}

#[inline]
#[target_feature(enable = "sse4.1")]
unsafe fn popcount128(v: __m128i) -> u64 {
    popcnt64(_mm_extract_epi64(v, 0) as u64) as u64 + popcnt64(_mm_extract_epi64(v, 1) as u64) as u64
}

/// Carry-save adder: `l = a⊕b⊕c`, `h = maj(a,b,c)`.
#[inline]
#[target_feature(enable = "sse4.1")]
unsafe fn csa128(a: __m128i, b: __m128i, c: __m128i, h: &mut __m128i, l: &mut __m128i) {
    let u = _mm_xor_si128(a, b);
    *h = _mm_or_si128(_mm_and_si128(a, b), _mm_and_si128(u, c));
    *l = _mm_xor_si128(u, c);
}
