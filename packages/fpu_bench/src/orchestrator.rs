use std::str::FromStr;
use std::sync::Arc;

use derive_more::Display;
use tracing::{debug, warn};

use crate::modes::{probe_capabilities, run_dual_core, run_memory_tier, run_single_core};
use crate::pal::{Platform, PlatformFacade};
use crate::{
    AggregateMetrics, BenchmarkConfig, BenchmarkContext, CapabilityReport, Error,
    MemoryTierMetrics, Result, SingleCoreMetrics,
};

/// One of the independently runnable benchmark modes.
#[derive(Clone, Copy, Debug, Display, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum BenchmarkMode {
    /// Reports core count and floating-point capabilities. Takes no timings.
    #[display("capability")]
    Capability,

    /// Measures kernel throughput on one core.
    #[display("single-core")]
    SingleCore,

    /// Measures kernel throughput on two cores running at the same time.
    #[display("dual-core")]
    DualCore,

    /// Measures the slowdown caused by a buffer in the auxiliary memory tier.
    #[display("memory-tier")]
    MemoryTier,
}

impl BenchmarkMode {
    /// Every mode, in the order [`Orchestrator::run_all()`] runs them.
    pub const ALL: [Self; 4] = [
        Self::Capability,
        Self::SingleCore,
        Self::DualCore,
        Self::MemoryTier,
    ];

    fn index(self) -> usize {
        match self {
            Self::Capability => 0,
            Self::SingleCore => 1,
            Self::DualCore => 2,
            Self::MemoryTier => 3,
        }
    }
}

impl FromStr for BenchmarkMode {
    type Err = String;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|mode| mode.to_string() == value)
            .ok_or_else(|| {
                format!(
                    "unknown benchmark mode '{value}', expected one of: capability, single-core, dual-core, memory-tier"
                )
            })
    }
}

/// Lifecycle of a benchmark mode within an [`Orchestrator`].
#[derive(Clone, Copy, Debug, Default, Display, Eq, Hash, PartialEq)]
pub enum ModeState {
    /// The mode has not run yet.
    #[default]
    #[display("idle")]
    Idle,

    /// The mode is running.
    #[display("running")]
    Running,

    /// The mode has finished, successfully or not.
    #[display("completed")]
    Completed,
}

/// The figures produced by a successful benchmark mode.
#[derive(Clone, Debug, PartialEq)]
pub enum ModeOutcome {
    /// Result of [`BenchmarkMode::Capability`].
    Capability(CapabilityReport),

    /// Result of [`BenchmarkMode::SingleCore`].
    SingleCore(SingleCoreMetrics),

    /// Result of [`BenchmarkMode::DualCore`].
    DualCore(AggregateMetrics),

    /// Result of [`BenchmarkMode::MemoryTier`].
    MemoryTier(MemoryTierMetrics),
}

/// What one benchmark mode produced: its figures, or the error that stopped it. A failed mode
/// never carries partial figures.
#[derive(Debug)]
pub struct ModeReport {
    mode: BenchmarkMode,
    outcome: Result<ModeOutcome>,
}

impl ModeReport {
    /// The mode this report is about.
    #[must_use]
    pub fn mode(&self) -> BenchmarkMode {
        self.mode
    }

    /// The figures, or the error that stopped the mode.
    #[must_use]
    pub fn outcome(&self) -> &Result<ModeOutcome> {
        &self.outcome
    }

    /// Whether the mode produced figures.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    /// Consumes the report, returning the figures or the error.
    ///
    /// # Errors
    ///
    /// Returns the error that stopped the mode.
    pub fn into_outcome(self) -> Result<ModeOutcome> {
        self.outcome
    }
}

/// Runs benchmark modes on the current platform and collects their reports.
///
/// Modes are independent: a mode that fails is reported and the next mode runs as if nothing
/// happened. The calling thread becomes the primary worker and is bound to the primary core.
///
/// # Example
///
/// ```no_run
/// use fpu_bench::{BenchmarkConfig, BenchmarkMode, Orchestrator};
///
/// let mut orchestrator = Orchestrator::new(BenchmarkConfig::new()).unwrap();
///
/// let report = orchestrator.run_mode(BenchmarkMode::SingleCore);
/// println!("{report}");
/// ```
#[derive(Debug)]
pub struct Orchestrator {
    platform: PlatformFacade,
    config: BenchmarkConfig,
    states: [ModeState; 4],

    // Reused by consecutive dual-core runs unless a detached worker still holds it.
    context: Option<Arc<BenchmarkContext>>,
}

impl Orchestrator {
    /// Creates an orchestrator for the build target platform.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if the configuration fails
    /// [`BenchmarkConfig::validate()`].
    pub fn new(config: BenchmarkConfig) -> Result<Self> {
        config.validate()?;

        let platform = PlatformFacade::target(config.auxiliary_tier_bytes());
        Ok(Self::with_platform(platform, config))
    }

    pub(crate) fn with_platform(platform: PlatformFacade, config: BenchmarkConfig) -> Self {
        Self {
            platform,
            config,
            states: [ModeState::Idle; 4],
            context: None,
        }
    }

    /// The configuration the modes run with.
    #[must_use]
    pub fn config(&self) -> &BenchmarkConfig {
        &self.config
    }

    /// The current lifecycle state of a mode.
    #[must_use]
    pub fn state(&self, mode: BenchmarkMode) -> ModeState {
        *self
            .states
            .get(mode.index())
            .expect("every mode has a state slot")
    }

    fn set_state(&mut self, mode: BenchmarkMode, state: ModeState) {
        *self
            .states
            .get_mut(mode.index())
            .expect("every mode has a state slot") = state;

        debug!(%mode, %state, "mode state changed");
    }

    /// Runs one mode and reports its outcome.
    pub fn run_mode(&mut self, mode: BenchmarkMode) -> ModeReport {
        self.set_state(mode, ModeState::Running);

        let outcome = match mode {
            BenchmarkMode::Capability => Ok(ModeOutcome::Capability(probe_capabilities(
                &self.platform,
            ))),
            BenchmarkMode::SingleCore => {
                run_single_core(&self.platform, &self.config).map(ModeOutcome::SingleCore)
            }
            BenchmarkMode::DualCore => {
                let context = self.take_context();
                let outcome = run_dual_core(&self.platform, &self.config, &context);
                self.context = Some(context);

                outcome.map(ModeOutcome::DualCore)
            }
            BenchmarkMode::MemoryTier => {
                run_memory_tier(&self.platform, &self.config).map(ModeOutcome::MemoryTier)
            }
        };

        if let Err(error) = &outcome {
            if error.is_precondition() {
                warn!(%mode, %error, "mode skipped");
            } else {
                warn!(%mode, %error, "mode failed");
            }
        }

        self.set_state(mode, ModeState::Completed);

        ModeReport { mode, outcome }
    }

    /// Runs the given modes in order, pausing for the configured inter-mode delay between
    /// consecutive modes.
    pub fn run(&mut self, modes: &[BenchmarkMode]) -> Vec<ModeReport> {
        let mut reports = Vec::with_capacity(modes.len());

        for (index, mode) in modes.iter().enumerate() {
            if index > 0 && !self.config.inter_mode_delay().is_zero() {
                self.platform.sleep(self.config.inter_mode_delay());
            }

            reports.push(self.run_mode(*mode));
        }

        reports
    }

    /// Runs every mode, in the order of [`BenchmarkMode::ALL`].
    pub fn run_all(&mut self) -> Vec<ModeReport> {
        self.run(&BenchmarkMode::ALL)
    }

    /// Returns a context with no results and a closed gate, reusing the previous one when no
    /// worker holds it any more.
    fn take_context(&mut self) -> Arc<BenchmarkContext> {
        if let Some(mut context) = self.context.take() {
            if let Some(exclusive) = Arc::get_mut(&mut context) {
                exclusive.reset();
                return context;
            }

            debug!("previous context is still held by a detached worker, retiring it");
        }

        Arc::new(BenchmarkContext::new())
    }
}
