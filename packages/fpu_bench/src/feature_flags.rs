use std::fmt::{self, Display, Formatter};

bitflags::bitflags! {
    /// Floating-point related capabilities reported by the platform, as a bit set.
    ///
    /// Displayed as a zero-padded hexadecimal number, e.g. `0x00000003`.
    #[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
    pub struct FeatureFlags: u32 {
        /// Each core has a hardware floating-point unit.
        const FPU = 1 << 0;

        /// The floating-point unit supports double precision in addition to single precision.
        const DOUBLE_PRECISION = 1 << 1;

        /// Vector floating-point instructions are available.
        const SIMD = 1 << 2;

        /// Fused multiply-add instructions are available.
        const FMA = 1 << 3;
    }
}

impl Display for FeatureFlags {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.bits())
    }
}
