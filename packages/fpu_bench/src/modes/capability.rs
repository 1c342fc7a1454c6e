use crate::FeatureFlags;
use crate::pal::Platform;

/// What the platform reports about its floating-point capabilities.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CapabilityReport {
    description: String,
    core_count: usize,
    feature_flags: FeatureFlags,
    cpu_frequency_mhz: Option<u32>,
}

impl CapabilityReport {
    /// Architecture and operating system of the platform.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Number of cores available to the benchmark.
    #[must_use]
    pub fn core_count(&self) -> usize {
        self.core_count
    }

    /// The raw feature flags.
    #[must_use]
    pub fn feature_flags(&self) -> FeatureFlags {
        self.feature_flags
    }

    /// Whether the cores have a hardware floating-point unit.
    #[must_use]
    pub fn fpu_present(&self) -> bool {
        self.feature_flags.contains(FeatureFlags::FPU)
    }

    /// Number of floating-point units, one per core when present.
    #[must_use]
    pub fn fpu_count(&self) -> usize {
        if self.fpu_present() { self.core_count } else { 0 }
    }

    /// Whether the floating-point units also handle double precision.
    #[must_use]
    pub fn double_precision(&self) -> bool {
        self.feature_flags.contains(FeatureFlags::DOUBLE_PRECISION)
    }

    /// Maximum CPU frequency, if the platform exposes it.
    #[must_use]
    pub fn cpu_frequency_mhz(&self) -> Option<u32> {
        self.cpu_frequency_mhz
    }
}

/// Collects the capability report. Takes no timings.
pub(crate) fn probe_capabilities(platform: &impl Platform) -> CapabilityReport {
    CapabilityReport {
        description: platform.description(),
        core_count: platform.core_count(),
        feature_flags: platform.feature_flags(),
        cpu_frequency_mhz: platform.cpu_frequency_mhz(),
    }
}
