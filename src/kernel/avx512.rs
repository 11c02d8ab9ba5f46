//! AVX-512BW Harley-Seal AND-popcount kernel (spec §4.4, lane width 512).
//!
//! The carry-save adder collapses to a single three-input ternary-logic
//! instruction here (truth tables `0x96` for the sum bit, `0xE8` for the
//! majority/carry bit), and lane popcount uses a Wegner-style bit-parallel
//! reduction followed by a sum-of-absolute-differences, since AVX-512BW
//! alone (without VPOPCNTDQ) has no native byte popcount instruction.

use std::arch::x86_64::*;

const WORDS_PER_REGISTER: usize = 8;

/// Minimum word count for which the AVX-512BW kernel is worthwhile.
pub const MIN_WORDS: usize = 16 * WORDS_PER_REGISTER;

pub fn intersect_simd_avx512(a: &[u64], b: &[u64]) -> u64 {
    debug_assert_eq!(a.len(), b.len());
    unsafe { intersect_avx512_inner(a, b) }
}

#[target_feature(enable = "avx512bw")]
unsafe fn intersect_avx512_inner(a: &[u64], b: &[u64]) -> u64 {
    let len = a.len();
    let n_registers = len / WORDS_PER_REGISTER;
    let ra = a.as_ptr() as *const __m512i;
    let rb = b.as_ptr() as *const __m512i;

    let mut cnt = _mm512_setzero_si512();
    let mut ones = _mm512_setzero_si512();
    let mut twos = _mm512_setzero_si512();
    let mut fours = _mm512_setzero_si512();
    let mut eights = _mm512_setzero_si512();
    let mut sixteens = _mm512_setzero_si512();
    let mut twos_a = _mm512_setzero_si512();
    let mut twos_b = _mm512_setzero_si512();
    let mut fours_a = _mm512_setzero_si512();
    let mut fours_b = _mm512_setzero_si512();
    let mut eights_a = _mm512_setzero_si512();
    let mut eights_b = _mm512_setzero_si512();

    let limit = n_registers - n_registers % 16;
    let mut i = 0isize;
    macro_rules! block {
        ($k:expr) => {
            _mm512_and_si512(
                _mm512_loadu_si512(ra.offset(i + $k) as *const i32),
                _mm512_loadu_si512(rb.offset(i + $k) as *const i32),
            )
        };
    }

    while (i as usize) < limit {
        csa512(ones, block!(0), block!(1), &mut twos_a, &mut ones);
        csa512(ones, block!(2), block!(3), &mut twos_b, &mut ones);
        csa512(twos, twos_a, twos_b, &mut fours_a, &mut twos);
        csa512(ones, block!(4), block!(5), &mut twos_a, &mut ones);
        csa512(ones, block!(6), block!(7), &mut twos_b, &mut ones);
        csa512(twos, twos_a, twos_b, &mut fours_b, &mut twos);
        csa512(fours, fours_a, fours_b, &mut eights_a, &mut fours);
        csa512(ones, block!(8), block!(9), &mut twos_a, &mut ones);
        csa512(ones, block!(10), block!(11), &mut twos_b, &mut ones);
        csa512(twos, twos_a, twos_b, &mut fours_a, &mut twos);
        csa512(ones, block!(12), block!(13), &mut twos_a, &mut ones);
        csa512(ones, block!(14), block!(15), &mut twos_b, &mut ones);
        csa512(twos, twos_a, twos_b, &mut fours_b, &mut twos);
        csa512(fours, fours_a, fours_b, &mut eights_b, &mut fours);
        csa512(eights, eights_a, eights_b, &mut sixteens, &mut eights);

        cnt = _mm512_add_epi64(cnt, popcount512(sixteens));
        i += 16;
    }

    cnt = _mm512_slli_epi64(cnt, 4);
    cnt = _mm512_add_epi64(cnt, _mm512_slli_epi64(popcount512(eights), 3));
    cnt = _mm512_add_epi64(cnt, _mm512_slli_epi64(popcount512(fours), 2));
    cnt = _mm512_add_epi64(cnt, _mm512_slli_epi64(popcount512(twos), 1));
    cnt = _mm512_add_epi64(cnt, popcount512(ones));

    let mut total = sum_lanes_512(cnt);

    while (i as usize) < n_registers {
        total += sum_lanes_512(popcount512(block!(0)));
        i += 1;
    }

    for k in (n_registers * WORDS_PER_REGISTER)..len {
        total += crate::popcount::popcnt64(a[k] & b[k]) as u64;
    }

    total
}

#[inline]
#[target_feature(enable = "avx512bw")]
unsafe fn sum_lanes_512(v: __m512i) -> u64 {
    let lanes: [u64; 8] = std::mem::transmute(v);
    lanes.iter().sum()
}

/// Carry-save adder via ternary logic: `l = a⊕b⊕c` (table `0x96`),
/// `h = maj(a,b,c)` (table `0xE8`).
#[inline]
#[target_feature(enable = "avx512bw")]
unsafe fn csa512(a: __m512i, b: __m512i, c: __m512i, h: &mut __m512i, l: &mut __m512i) {
    *l = _mm512_ternarylogic_epi64(a, b, c, 0x96);
    *h = _mm512_ternarylogic_epi64(a, b, c, 0xe8);
}

/// Wegner-style bit-parallel popcount of a 512-bit lane, folded down with
/// sum-of-absolute-differences into each 64-bit sub-lane.
#[inline]
#[target_feature(enable = "avx512bw")]
unsafe fn popcount512(v: __m512i) -> __m512i {
    let m1 = _mm512_set1_epi8(0x55);
    let m2 = _mm512_set1_epi8(0x33);
    let m4 = _mm512_set1_epi8(0x0f);

    let t1 = _mm512_sub_epi8(v, _mm512_and_si512(_mm512_srli_epi16(v, 1), m1));
    let t2 = _mm512_add_epi8(
        _mm512_and_si512(t1, m2),
        _mm512_and_si512(_mm512_srli_epi16(t1, 2), m2),
    );
    let t3 = _mm512_and_si512(_mm512_add_epi8(t2, _mm512_srli_epi16(t2, 4)), m4);

    _mm512_sad_epu8(t3, _mm512_setzero_si512())
}
