//! Human-readable report blocks, one per benchmark mode.

use std::fmt::{self, Display, Formatter};

use crate::{
    AggregateMetrics, BenchmarkMode, CapabilityReport, CoreMetrics, MemoryTierMetrics, ModeOutcome,
    ModeReport, SingleCoreMetrics,
};

const RULE: &str = "========================================";

/// Writes a title framed by horizontal rules.
///
/// # Errors
///
/// Returns an error if the formatter fails.
pub fn write_banner(f: &mut impl fmt::Write, title: &str) -> fmt::Result {
    writeln!(f, "{RULE}")?;
    writeln!(f, "{title}")?;
    writeln!(f, "{RULE}")
}

fn title(mode: BenchmarkMode) -> &'static str {
    match mode {
        BenchmarkMode::Capability => "FPU CAPABILITIES",
        BenchmarkMode::SingleCore => "SINGLE-CORE FPU THROUGHPUT",
        BenchmarkMode::DualCore => "DUAL-CORE FPU THROUGHPUT",
        BenchmarkMode::MemoryTier => "FPU THROUGHPUT WITH AUXILIARY MEMORY TIER",
    }
}

impl Display for ModeReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write_banner(f, title(self.mode()))?;

        match self.outcome() {
            Ok(outcome) => write!(f, "{outcome}"),
            Err(error) if error.is_precondition() => writeln!(f, "SKIPPED: {error}"),
            Err(error) => writeln!(f, "ERROR: {error}"),
        }
    }
}

impl Display for ModeOutcome {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Capability(report) => write!(f, "{report}"),
            Self::SingleCore(metrics) => write!(f, "{metrics}"),
            Self::DualCore(metrics) => write!(f, "{metrics}"),
            Self::MemoryTier(metrics) => write!(f, "{metrics}"),
        }
    }
}

impl Display for CapabilityReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        writeln!(f, "Platform: {}", self.description())?;
        writeln!(f, "Cores: {}", self.core_count())?;
        writeln!(f, "Features: {}", self.feature_flags())?;

        match self.cpu_frequency_mhz() {
            Some(mhz) => writeln!(f, "CPU frequency: {mhz} MHz")?,
            None => writeln!(f, "CPU frequency: unknown")?,
        }

        if !self.fpu_present() {
            return writeln!(f, "FPU support: NO");
        }

        writeln!(f, "FPU support: YES")?;
        writeln!(f, "  Total FPUs: {} (one per core)", self.fpu_count())?;

        let precision = if self.double_precision() {
            "single and double precision"
        } else {
            "single precision"
        };

        writeln!(f, "  Precision: {precision}")
    }
}

fn write_averages(f: &mut Formatter<'_>, metrics: &SingleCoreMetrics) -> fmt::Result {
    writeln!(f, "  Average time: {:.2} us", metrics.average_micros())?;
    writeln!(
        f,
        "  Operations: {} x 4 = {} FLOPs",
        metrics.ops_per_run(),
        metrics.flops_per_run()
    )?;
    writeln!(f, "  Performance: {:.2} MFLOPS", metrics.mflops())?;
    writeln!(f, "  Time per operation: {:.2} ns", metrics.nanos_per_flop())?;
    writeln!(f, "  Result (to prevent optimization): {}", metrics.accumulated())
}

fn write_samples(f: &mut Formatter<'_>, metrics: &SingleCoreMetrics) -> fmt::Result {
    writeln!(
        f,
        "Ran {} iterations of {} kernel operations each",
        metrics.samples().len(),
        metrics.ops_per_run()
    )?;

    for (index, sample) in metrics.samples().iter().enumerate() {
        writeln!(f, "  Iteration {}: {sample} us", index.saturating_add(1))?;
    }

    Ok(())
}

impl Display for SingleCoreMetrics {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write_samples(f, self)?;
        writeln!(f)?;
        writeln!(f, "Results:")?;
        write_averages(f, self)
    }
}

fn write_core(f: &mut Formatter<'_>, core: &CoreMetrics) -> fmt::Result {
    let binding = core.binding();

    writeln!(
        f,
        "  Core {} ({}) time: {} us ({:.2} MFLOPS)",
        binding.core(),
        binding.role(),
        core.elapsed_micros(),
        core.mflops()
    )
}

impl Display for AggregateMetrics {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        writeln!(f, "Results:")?;
        write_core(f, self.primary())?;
        write_core(f, self.secondary())?;
        writeln!(f, "  Total time: {} us", self.union_elapsed_micros())?;
        writeln!(f, "  Combined performance: {:.2} MFLOPS", self.combined_mflops())?;
        writeln!(f, "  Speedup: {:.2}x", self.speedup())
    }
}

impl Display for MemoryTierMetrics {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} tier capacity: {} bytes",
            self.tier(),
            self.tier_capacity_bytes()
        )?;
        writeln!(
            f,
            "Buffer: {} floats ({} bytes)",
            self.buffer_len(),
            self.buffer_bytes()
        )?;
        writeln!(f)?;

        write_samples(f, self.with_buffer())?;
        writeln!(f)?;
        writeln!(f, "Results (with {} tier access):", self.tier())?;
        write_averages(f, self.with_buffer())?;
        writeln!(f)?;

        writeln!(f, "Results (without {} tier access):", self.tier())?;
        writeln!(
            f,
            "  Average time: {:.2} us",
            self.without_buffer().average_micros()
        )?;
        writeln!(f, "  Performance: {:.2} MFLOPS", self.without_buffer().mflops())?;
        writeln!(f)?;

        writeln!(f, "Memory tier impact:")?;
        writeln!(f, "  Slowdown factor: {:.2}x", self.slowdown())?;
        writeln!(f, "  Performance loss: {:.2}%", self.overhead_percent())
    }
}
