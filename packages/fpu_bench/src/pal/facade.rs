use std::sync::Arc;
use std::time::Duration;

#[cfg(test)]
use crate::pal::FakePlatform;
use crate::pal::{Platform, TargetPlatform, TierBuffer, WorkerHandle};
use crate::{CoreIndex, FeatureFlags, MemoryTier, Micros, Result, TaskPriority};

/// Hides the real/fake choice of platform behind a single type that the benchmark modes use.
#[derive(Clone, Debug)]
pub(crate) enum PlatformFacade {
    Target(Arc<TargetPlatform>),

    #[cfg(test)]
    Fake(Arc<FakePlatform>),
}

impl PlatformFacade {
    pub(crate) fn target(auxiliary_tier_bytes: usize) -> Self {
        Self::Target(Arc::new(TargetPlatform::new(auxiliary_tier_bytes)))
    }

    #[cfg(test)]
    pub(crate) fn from_fake(fake: Arc<FakePlatform>) -> Self {
        Self::Fake(fake)
    }
}

impl Platform for PlatformFacade {
    fn description(&self) -> String {
        match self {
            Self::Target(p) => p.description(),
            #[cfg(test)]
            Self::Fake(p) => p.description(),
        }
    }

    fn core_count(&self) -> usize {
        match self {
            Self::Target(p) => p.core_count(),
            #[cfg(test)]
            Self::Fake(p) => p.core_count(),
        }
    }

    fn feature_flags(&self) -> FeatureFlags {
        match self {
            Self::Target(p) => p.feature_flags(),
            #[cfg(test)]
            Self::Fake(p) => p.feature_flags(),
        }
    }

    fn cpu_frequency_mhz(&self) -> Option<u32> {
        match self {
            Self::Target(p) => p.cpu_frequency_mhz(),
            #[cfg(test)]
            Self::Fake(p) => p.cpu_frequency_mhz(),
        }
    }

    fn enable_fpu(&self, core: CoreIndex) {
        match self {
            Self::Target(p) => p.enable_fpu(core),
            #[cfg(test)]
            Self::Fake(p) => p.enable_fpu(core),
        }
    }

    fn now_micros(&self) -> Micros {
        match self {
            Self::Target(p) => p.now_micros(),
            #[cfg(test)]
            Self::Fake(p) => p.now_micros(),
        }
    }

    fn sleep(&self, duration: Duration) {
        match self {
            Self::Target(p) => p.sleep(duration),
            #[cfg(test)]
            Self::Fake(p) => p.sleep(duration),
        }
    }

    fn pin_current_thread(&self, core: CoreIndex) -> Result<()> {
        match self {
            Self::Target(p) => p.pin_current_thread(core),
            #[cfg(test)]
            Self::Fake(p) => p.pin_current_thread(core),
        }
    }

    fn spawn_bound<F>(&self, core: CoreIndex, priority: TaskPriority, entry: F) -> Result<WorkerHandle>
    where
        F: FnOnce() + Send + 'static,
    {
        match self {
            Self::Target(p) => p.spawn_bound(core, priority, entry),
            #[cfg(test)]
            Self::Fake(p) => p.spawn_bound(core, priority, entry),
        }
    }

    fn tier_capacity(&self, tier: MemoryTier) -> usize {
        match self {
            Self::Target(p) => p.tier_capacity(tier),
            #[cfg(test)]
            Self::Fake(p) => p.tier_capacity(tier),
        }
    }

    fn allocate_in_tier(&self, len: usize, tier: MemoryTier) -> Option<TierBuffer> {
        match self {
            Self::Target(p) => p.allocate_in_tier(len, tier),
            #[cfg(test)]
            Self::Fake(p) => p.allocate_in_tier(len, tier),
        }
    }

    fn free(&self, buffer: TierBuffer) {
        match self {
            Self::Target(p) => p.free(buffer),
            #[cfg(test)]
            Self::Fake(p) => p.free(buffer),
        }
    }
}
