/// CPU feature detection: picks the widest lane configuration the running
/// processor supports, never exceeding what the caller asked for.
///
/// Tiers, most to least capable:
/// 1. AVX-512 (F, BW, DQ on top of the AVX2 tier): 16 lanes
/// 2. AVX2 (with FMA, BMI1/2, LZCNT, MOVBE, SSE4.1): 8 lanes
/// 3. SSE4.1: 4 lanes
/// 4. SSE2: 4 lanes, universal fallback (also used on non-x86 targets)

/// Instruction-set tier the culler is instantiated for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Implementation {
    Sse2,
    Sse41,
    Avx2,
    Avx512,
}

impl Implementation {
    /// Number of triangles per batch, also the tile height in pixels.
    pub const fn lanes(self) -> usize {
        match self {
            Implementation::Sse2 | Implementation::Sse41 => 4,
            Implementation::Avx2 => 8,
            Implementation::Avx512 => 16,
        }
    }

    /// Best tier supported by the running CPU.
    pub fn detect() -> Implementation {
        #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
        {
            if supports_avx512() {
                return Implementation::Avx512;
            }
            if supports_avx2() {
                return Implementation::Avx2;
            }
            if std::arch::is_x86_feature_detected!("sse4.1") {
                return Implementation::Sse41;
            }
        }
        Implementation::Sse2
    }

    /// Best supported tier that does not exceed `requested`.
    pub fn select(requested: Implementation) -> Implementation {
        let detected = Self::detect();
        let chosen = detected.min(requested);
        if chosen < requested {
            log::warn!("{requested:?} requested but the CPU only supports {chosen:?}");
        }
        chosen
    }
}

impl Default for Implementation {
    fn default() -> Self {
        Implementation::detect()
    }
}

#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
fn supports_avx2() -> bool {
    // OS support for YMM state is covered by the `avx` detection.
    std::arch::is_x86_feature_detected!("avx2")
        && std::arch::is_x86_feature_detected!("fma")
        && std::arch::is_x86_feature_detected!("bmi1")
        && std::arch::is_x86_feature_detected!("bmi2")
        && std::arch::is_x86_feature_detected!("lzcnt")
        && std::arch::is_x86_feature_detected!("movbe")
        && std::arch::is_x86_feature_detected!("sse4.1")
}

#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
fn supports_avx512() -> bool {
    supports_avx2()
        && std::arch::is_x86_feature_detected!("avx512f")
        && std::arch::is_x86_feature_detected!("avx512bw")
        && std::arch::is_x86_feature_detected!("avx512dq")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lane_widths() {
        assert_eq!(Implementation::Sse2.lanes(), 4);
        assert_eq!(Implementation::Sse41.lanes(), 4);
        assert_eq!(Implementation::Avx2.lanes(), 8);
        assert_eq!(Implementation::Avx512.lanes(), 16);
    }

    #[test]
    fn test_select_never_exceeds_request() {
        for requested in [
            Implementation::Sse2,
            Implementation::Sse41,
            Implementation::Avx2,
            Implementation::Avx512,
        ] {
            let chosen = Implementation::select(requested);
            assert!(chosen <= requested, "{chosen:?} exceeds requested {requested:?}");
            assert!(chosen <= Implementation::detect());
        }
    }

    #[test]
    fn test_sse2_is_always_available() {
        assert_eq!(Implementation::select(Implementation::Sse2), Implementation::Sse2);
    }
}
