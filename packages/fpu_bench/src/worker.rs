use std::num::NonZero;
use std::thread;

use derive_more::Display;
use tracing::debug;

use crate::pal::Platform;
use crate::{
    BenchmarkContext, CoreIndex, GateState, PRIMARY_CORE, SECONDARY_CORE, WorkerPhase,
    WorkerSlot, WorkloadResult, run_kernel,
};

/// Which of the two workers of a dual-core run a worker is.
#[derive(Clone, Copy, Debug, Display, Eq, Hash, PartialEq)]
pub enum WorkerRole {
    /// Runs inline on the orchestrator's core.
    #[display("primary")]
    Primary,

    /// Runs on the other core.
    #[display("secondary")]
    Secondary,
}

/// The fixed affinity of a worker to a core.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct CoreBinding {
    core: CoreIndex,
    role: WorkerRole,
}

impl CoreBinding {
    /// The binding of the worker with the given role.
    #[must_use]
    pub fn of(role: WorkerRole) -> Self {
        let core = match role {
            WorkerRole::Primary => PRIMARY_CORE,
            WorkerRole::Secondary => SECONDARY_CORE,
        };

        Self { core, role }
    }

    /// The core the worker runs on.
    #[must_use]
    pub fn core(&self) -> CoreIndex {
        self.core
    }

    /// The role of the worker.
    #[must_use]
    pub fn role(&self) -> WorkerRole {
        self.role
    }
}

/// Runs the kernel once between two clock readings.
pub(crate) fn timed_run(
    platform: &impl Platform,
    iterations: NonZero<u64>,
    buffer: Option<&mut [f32]>,
) -> WorkloadResult {
    let start_micros = platform.now_micros();
    let accumulated = run_kernel(iterations, buffer);
    let end_micros = platform.now_micros();

    WorkloadResult::new(accumulated, start_micros, end_micros)
}

/// One instrumented kernel execution of a dual-core run. Runs once and is discarded.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Worker {
    binding: CoreBinding,
    iterations: NonZero<u64>,
}

impl Worker {
    pub(crate) fn new(role: WorkerRole, iterations: NonZero<u64>) -> Self {
        Self {
            binding: CoreBinding::of(role),
            iterations,
        }
    }

    fn slot(self, context: &BenchmarkContext) -> &WorkerSlot {
        match self.binding.role {
            WorkerRole::Primary => context.primary(),
            WorkerRole::Secondary => context.secondary(),
        }
    }

    /// Runs the kernel on the calling thread, which must already be bound to the worker's core,
    /// and publishes the result into the worker's slot.
    pub(crate) fn run_inline(self, platform: &impl Platform, context: &BenchmarkContext) -> WorkloadResult {
        let slot = self.slot(context);

        slot.enter_phase(WorkerPhase::Running);
        let result = timed_run(platform, self.iterations, None);
        slot.publish(&result);

        debug!(
            core = self.binding.core,
            role = %self.binding.role,
            elapsed_us = result.elapsed_micros(),
            "worker done"
        );

        result
    }

    /// Entry point of a spawned worker: prepares the core, reports itself bound and waits for
    /// the start gate. Runs and publishes if the gate opens, exits without publishing if it is
    /// cancelled.
    pub(crate) fn run_when_released(self, platform: &impl Platform, context: &BenchmarkContext) {
        let slot = self.slot(context);

        platform.enable_fpu(self.binding.core);
        slot.enter_phase(WorkerPhase::Bound);

        debug!(core = self.binding.core, role = %self.binding.role, "worker waiting at start gate");

        loop {
            match context.start_gate().state() {
                GateState::Closed => thread::yield_now(),
                GateState::Open => break,
                GateState::Cancelled => {
                    debug!(core = self.binding.core, "start gate cancelled, worker exiting");
                    return;
                }
            }
        }

        self.run_inline(platform, context);
    }
}
