use std::num::NonZero;

use tracing::debug;

use crate::pal::Platform;
use crate::worker::timed_run;
use crate::{BenchmarkConfig, PRIMARY_CORE, Result, SingleCoreMetrics, WorkloadResult};

/// Binds the calling thread to the primary core and makes its FPU usable.
pub(crate) fn prepare_primary_core(platform: &impl Platform) -> Result<()> {
    platform.pin_current_thread(PRIMARY_CORE)?;
    platform.enable_fpu(PRIMARY_CORE);
    Ok(())
}

/// Runs the kernel `iterations` times back to back, handing each run the same buffer.
pub(crate) fn repeat_kernel(
    platform: &impl Platform,
    ops_per_run: NonZero<u64>,
    iterations: NonZero<u32>,
    mut buffer: Option<&mut [f32]>,
) -> Vec<WorkloadResult> {
    (1..=iterations.get())
        .map(|iteration| {
            let result = timed_run(platform, ops_per_run, buffer.as_deref_mut());

            debug!(
                iteration,
                elapsed_us = result.elapsed_micros(),
                buffered = buffer.is_some(),
                "kernel run complete"
            );

            result
        })
        .collect()
}

/// Measures the throughput of one core running the kernel without a buffer.
pub(crate) fn run_single_core(
    platform: &impl Platform,
    config: &BenchmarkConfig,
) -> Result<SingleCoreMetrics> {
    prepare_primary_core(platform)?;

    let results = repeat_kernel(platform, config.ops_per_run(), config.iterations(), None);

    SingleCoreMetrics::from_results(config.ops_per_run(), &results)
}
