//! Runtime CPU-feature detection, cached process-wide.
//!
//! Mirrors the CPUID + XCR0 sequence of the original `FastIntersectCount`
//! `get_cpuid()` routine: POPCNT and SSE4.1/4.2 come straight from
//! `CPUID.01H:ECX`, while AVX2 and AVX-512BW additionally require the OS to
//! have opted YMM/ZMM state into `XCR0` (checked via `OSXSAVE` + `xgetbv`) —
//! a CPU can advertise AVX2 in CPUID while the OS still traps on YMM use.
//!
//! Detection runs at most once per process; the result is cached in a
//! [`OnceLock`] (first-use, race-safe, idempotent — see the concurrency
//! notes in the crate root docs).

use std::sync::OnceLock;

/// A snapshot of the SIMD-relevant CPU features this crate cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Features {
    popcnt: bool,
    sse41: bool,
    sse42: bool,
    avx2: bool,
    avx512bw: bool,
}

impl Features {
    pub const fn none() -> Self {
        Self {
            popcnt: false,
            sse41: false,
            sse42: false,
            avx2: false,
            avx512bw: false,
        }
    }

    #[inline]
    pub fn has_popcnt(&self) -> bool {
        self.popcnt
    }

    #[inline]
    pub fn has_sse41(&self) -> bool {
        self.sse41
    }

    #[inline]
    pub fn has_sse42(&self) -> bool {
        self.sse42
    }

    #[inline]
    pub fn has_avx2(&self) -> bool {
        self.avx2
    }

    #[inline]
    pub fn has_avx512bw(&self) -> bool {
        self.avx512bw
    }
}

static FEATURES: OnceLock<Features> = OnceLock::new();

/// Returns the cached CPU feature set, computing it on first call.
///
/// Racing callers each independently compute the (deterministic) result;
/// [`OnceLock`] guarantees exactly one of those results is published and all
/// readers observe it, so no lock is held on the common path.
pub fn detect() -> Features {
    *FEATURES.get_or_init(|| {
        let features = detect_uncached();
        log::debug!(
            "cpu feature detection: popcnt={} sse41={} sse42={} avx2={} avx512bw={}",
            features.popcnt,
            features.sse41,
            features.sse42,
            features.avx2,
            features.avx512bw
        );
        features
    })
}

#[cfg(target_arch = "x86_64")]
fn detect_uncached() -> Features {
    use std::arch::x86_64::{__cpuid_count, _xgetbv};

    // CPUID.01H: ECX carries POPCNT (bit 23), SSE4.1 (bit 19), SSE4.2 (bit 20),
    // OSXSAVE (bit 27).
    let leaf1 = unsafe { __cpuid_count(1, 0) };
    let popcnt = (leaf1.ecx & (1 << 23)) != 0;
    let sse41 = (leaf1.ecx & (1 << 19)) != 0;
    let sse42 = (leaf1.ecx & (1 << 20)) != 0;
    let osxsave = (leaf1.ecx & (1 << 27)) != 0;

    if !osxsave {
        // The OS has not enabled XSAVE state management: no wide kernel may
        // be selected regardless of what CPUID.07H reports.
        return Features {
            popcnt,
            sse41,
            sse42,
            avx2: false,
            avx512bw: false,
        };
    }

    // xgetbv(0): bit 1 = XMM state enabled, bit 2 = YMM state enabled,
    // bits 5..=7 = opmask/ZMM-hi/ZMM state enabled.
    let xcr0 = unsafe { _xgetbv(0) };
    let ymm_enabled = (xcr0 & 0b0000_0110) == 0b0000_0110;
    let zmm_enabled = (xcr0 & 0b1110_0110) == 0b1110_0110;

    let mut avx2 = false;
    let mut avx512bw = false;
    if ymm_enabled {
        // CPUID.(EAX=07H, ECX=0H): EBX carries AVX2 (bit 5), AVX-512BW (bit 30).
        let leaf7 = unsafe { __cpuid_count(7, 0) };
        avx2 = (leaf7.ebx & (1 << 5)) != 0;
        if zmm_enabled {
            avx512bw = (leaf7.ebx & (1 << 30)) != 0;
        }
    }

    Features {
        popcnt,
        sse41,
        sse42,
        avx2,
        avx512bw,
    }
}

#[cfg(not(target_arch = "x86_64"))]
fn detect_uncached() -> Features {
    Features::none()
}
