use tracing::debug;

use crate::modes::{prepare_primary_core, repeat_kernel};
use crate::pal::Platform;
use crate::{BenchmarkConfig, Error, MemoryTier, MemoryTierMetrics, Result, SingleCoreMetrics};

/// Measures how much a buffer in the auxiliary memory tier slows the kernel down, compared with
/// the same kernel without a buffer.
///
/// Nothing is allocated or timed if the tier is unavailable. The buffer is freed on every path
/// once it has been allocated.
pub(crate) fn run_memory_tier(
    platform: &impl Platform,
    config: &BenchmarkConfig,
) -> Result<MemoryTierMetrics> {
    let tier = MemoryTier::Auxiliary;

    let capacity = platform.tier_capacity(tier);
    if capacity == 0 {
        return Err(Error::MemoryTierUnavailable { tier });
    }

    prepare_primary_core(platform)?;

    let len = config.tier_buffer_len().get();
    let buffer = platform
        .allocate_in_tier(len, tier)
        .ok_or(Error::TierAllocationFailed {
            tier,
            bytes: len.saturating_mul(size_of::<f32>()),
        })?;

    debug!(%tier, capacity, bytes = buffer.size_bytes(), "tier buffer allocated");

    let mut buffer = scopeguard::guard(buffer, |buffer| platform.free(buffer));

    let with_buffer = repeat_kernel(
        platform,
        config.ops_per_run(),
        config.iterations(),
        Some(buffer.as_mut_slice()),
    );
    let without_buffer = repeat_kernel(platform, config.ops_per_run(), config.iterations(), None);

    Ok(MemoryTierMetrics::new(
        tier,
        capacity,
        len,
        SingleCoreMetrics::from_results(config.ops_per_run(), &with_buffer)?,
        SingleCoreMetrics::from_results(config.ops_per_run(), &without_buffer)?,
    ))
}
