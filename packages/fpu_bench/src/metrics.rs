//! Performance figures derived from kernel timings.
//!
//! Throughput is expressed in MFLOPS, which for microsecond timings is simply FLOPs per
//! microsecond. A timing of zero microseconds means the clock could not resolve the run, which
//! makes throughput unmeasurable and is reported as an error rather than as an infinite figure.

use std::num::NonZero;

use crate::{
    CoreBinding, Error, MemoryTier, Micros, Result, WorkerRole, WorkloadResult, flops_per_run,
};

#[expect(
    clippy::cast_precision_loss,
    reason = "reported figures do not need more than 52 bits of precision"
)]
fn approximate(value: u64) -> f64 {
    value as f64
}

fn mflops(flops: u64, elapsed_micros: f64) -> f64 {
    approximate(flops) / elapsed_micros
}

/// Throughput of a kernel run repeated on a single core.
#[derive(Clone, Debug, PartialEq)]
pub struct SingleCoreMetrics {
    ops_per_run: NonZero<u64>,
    flops_per_run: u64,
    samples: Vec<Micros>,
    average_micros: f64,
    accumulated: f32,
}

impl SingleCoreMetrics {
    /// Derives the metrics from the results of consecutive runs of `ops_per_run` iterations.
    ///
    /// # Panics
    ///
    /// Panics if `results` is empty.
    pub(crate) fn from_results(ops_per_run: NonZero<u64>, results: &[WorkloadResult]) -> Result<Self> {
        let last = results
            .last()
            .expect("every mode runs the kernel at least once");

        let samples: Vec<Micros> = results.iter().map(WorkloadResult::elapsed_micros).collect();
        let total = samples.iter().fold(0_u64, |sum, sample| sum.saturating_add(*sample));

        if total == 0 {
            return Err(Error::UnmeasurableElapsed {
                what: "single-core kernel run",
            });
        }

        Ok(Self {
            ops_per_run,
            flops_per_run: flops_per_run(ops_per_run),
            average_micros: approximate(total)
                / approximate(u64::try_from(samples.len()).expect("usize fits in u64")),
            samples,
            accumulated: last.accumulated(),
        })
    }

    /// Elapsed time of every run, in the order they ran.
    #[must_use]
    pub fn samples(&self) -> &[Micros] {
        &self.samples
    }

    /// Mean elapsed time of one run.
    #[must_use]
    pub fn average_micros(&self) -> f64 {
        self.average_micros
    }

    /// Kernel iterations in one run.
    #[must_use]
    pub fn ops_per_run(&self) -> NonZero<u64> {
        self.ops_per_run
    }

    /// Floating-point operations performed by one run.
    #[must_use]
    pub fn flops_per_run(&self) -> u64 {
        self.flops_per_run
    }

    /// Throughput based on the mean elapsed time.
    #[must_use]
    pub fn mflops(&self) -> f64 {
        mflops(self.flops_per_run, self.average_micros)
    }

    /// Mean time spent per floating-point operation.
    #[must_use]
    pub fn nanos_per_flop(&self) -> f64 {
        self.average_micros * 1000.0 / approximate(self.flops_per_run)
    }

    /// The value the kernel returned.
    #[must_use]
    pub fn accumulated(&self) -> f32 {
        self.accumulated
    }
}

/// Timing of one worker of a dual-core run.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CoreMetrics {
    binding: CoreBinding,
    elapsed_micros: Micros,
    mflops: f64,
    accumulated: f32,
}

impl CoreMetrics {
    fn from_result(role: WorkerRole, flops: u64, result: &WorkloadResult) -> Result<Self> {
        let elapsed_micros = result.elapsed_micros();

        if elapsed_micros == 0 {
            return Err(Error::UnmeasurableElapsed {
                what: match role {
                    WorkerRole::Primary => "primary worker kernel run",
                    WorkerRole::Secondary => "secondary worker kernel run",
                },
            });
        }

        Ok(Self {
            binding: CoreBinding::of(role),
            elapsed_micros,
            mflops: mflops(flops, approximate(elapsed_micros)),
            accumulated: result.accumulated(),
        })
    }

    /// The core the worker ran on.
    #[must_use]
    pub fn binding(&self) -> CoreBinding {
        self.binding
    }

    /// Time the worker spent in the kernel.
    #[must_use]
    pub fn elapsed_micros(&self) -> Micros {
        self.elapsed_micros
    }

    /// Throughput of this worker alone.
    #[must_use]
    pub fn mflops(&self) -> f64 {
        self.mflops
    }

    /// The value the worker's kernel returned.
    #[must_use]
    pub fn accumulated(&self) -> f32 {
        self.accumulated
    }
}

/// Combined performance of the two workers of a dual-core run.
///
/// The union elapsed time is at least the longer of the two per-core times. It is at most their
/// sum whenever the two timing windows overlap, which the start gate of a dual-core run ensures.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AggregateMetrics {
    primary: CoreMetrics,
    secondary: CoreMetrics,
    union_elapsed_micros: Micros,
    combined_mflops: f64,
    speedup: f64,
}

impl AggregateMetrics {
    /// Combines the results of the two workers, each of which ran `ops_per_run` iterations.
    pub(crate) fn from_results(
        ops_per_run: NonZero<u64>,
        primary: &WorkloadResult,
        secondary: &WorkloadResult,
    ) -> Result<Self> {
        let flops = flops_per_run(ops_per_run);

        let primary_metrics = CoreMetrics::from_result(WorkerRole::Primary, flops, primary)?;
        let secondary_metrics = CoreMetrics::from_result(WorkerRole::Secondary, flops, secondary)?;

        let union_start = primary.start_micros().min(secondary.start_micros());
        let union_end = primary.end_micros().max(secondary.end_micros());
        let union_elapsed_micros = union_end
            .checked_sub(union_start)
            .expect("the latest end is never before the earliest start");

        let per_core_total = primary_metrics
            .elapsed_micros
            .saturating_add(secondary_metrics.elapsed_micros);

        Ok(Self {
            primary: primary_metrics,
            secondary: secondary_metrics,
            union_elapsed_micros,
            combined_mflops: mflops(flops.saturating_mul(2), approximate(union_elapsed_micros)),
            speedup: approximate(per_core_total) / approximate(union_elapsed_micros),
        })
    }

    /// The worker that ran inline on the orchestrator's core.
    #[must_use]
    pub fn primary(&self) -> &CoreMetrics {
        &self.primary
    }

    /// The worker that ran on the other core.
    #[must_use]
    pub fn secondary(&self) -> &CoreMetrics {
        &self.secondary
    }

    /// Wall-clock span from the earliest worker start to the latest worker end.
    #[must_use]
    pub fn union_elapsed_micros(&self) -> Micros {
        self.union_elapsed_micros
    }

    /// Throughput of both workers together over the union interval.
    #[must_use]
    pub fn combined_mflops(&self) -> f64 {
        self.combined_mflops
    }

    /// How much faster the two workloads ran concurrently than back to back: the sum of the
    /// per-core times divided by the union time. Between 1 and 2 when the windows overlap.
    #[must_use]
    pub fn speedup(&self) -> f64 {
        self.speedup
    }
}

/// Throughput with and without a buffer in a slower memory tier.
#[derive(Clone, Debug, PartialEq)]
pub struct MemoryTierMetrics {
    tier: MemoryTier,
    tier_capacity_bytes: usize,
    buffer_len: usize,
    with_buffer: SingleCoreMetrics,
    without_buffer: SingleCoreMetrics,
}

impl MemoryTierMetrics {
    pub(crate) fn new(
        tier: MemoryTier,
        tier_capacity_bytes: usize,
        buffer_len: usize,
        with_buffer: SingleCoreMetrics,
        without_buffer: SingleCoreMetrics,
    ) -> Self {
        Self {
            tier,
            tier_capacity_bytes,
            buffer_len,
            with_buffer,
            without_buffer,
        }
    }

    /// The tier the buffer was allocated in.
    #[must_use]
    pub fn tier(&self) -> MemoryTier {
        self.tier
    }

    /// Total size of the tier.
    #[must_use]
    pub fn tier_capacity_bytes(&self) -> usize {
        self.tier_capacity_bytes
    }

    /// Length of the buffer, in floats.
    #[must_use]
    pub fn buffer_len(&self) -> usize {
        self.buffer_len
    }

    /// Size of the buffer.
    #[must_use]
    pub fn buffer_bytes(&self) -> usize {
        self.buffer_len.saturating_mul(size_of::<f32>())
    }

    /// Runs that wrote into the buffer.
    #[must_use]
    pub fn with_buffer(&self) -> &SingleCoreMetrics {
        &self.with_buffer
    }

    /// Baseline runs without a buffer.
    #[must_use]
    pub fn without_buffer(&self) -> &SingleCoreMetrics {
        &self.without_buffer
    }

    /// Mean time with the buffer divided by mean time without it.
    #[must_use]
    pub fn slowdown(&self) -> f64 {
        self.with_buffer.average_micros() / self.without_buffer.average_micros()
    }

    /// The slowdown expressed as additional time, in percent of the baseline.
    #[must_use]
    pub fn overhead_percent(&self) -> f64 {
        (self.slowdown() - 1.0) * 100.0
    }
}
