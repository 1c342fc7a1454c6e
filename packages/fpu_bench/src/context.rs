//! State shared between the orchestrator and the workers of one dual-core benchmark run.
//!
//! The only ordering contract that matters for correctness lives here: a worker stores its
//! result fields before it sets its completion flag (release), and a reader only reads the result
//! fields after it has observed the flag set (acquire). Nothing else in the context needs to be
//! ordered with respect to the results.

use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU32, AtomicU64, Ordering};

use crate::{CoreIndex, Micros, PRIMARY_CORE, SECONDARY_CORE};

/// Outcome of one workload kernel run.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WorkloadResult {
    accumulated: f32,
    start_micros: Micros,
    end_micros: Micros,
}

impl WorkloadResult {
    /// # Panics
    ///
    /// Panics if `end_micros` is earlier than `start_micros`, which a monotonic clock
    /// cannot produce.
    #[must_use]
    pub(crate) fn new(accumulated: f32, start_micros: Micros, end_micros: Micros) -> Self {
        assert!(
            end_micros >= start_micros,
            "monotonic clock went backwards: start {start_micros} us, end {end_micros} us"
        );

        Self {
            accumulated,
            start_micros,
            end_micros,
        }
    }

    /// The value returned by the workload kernel.
    #[must_use]
    pub fn accumulated(&self) -> f32 {
        self.accumulated
    }

    /// Clock reading taken immediately before the kernel started.
    #[must_use]
    pub fn start_micros(&self) -> Micros {
        self.start_micros
    }

    /// Clock reading taken immediately after the kernel returned.
    #[must_use]
    pub fn end_micros(&self) -> Micros {
        self.end_micros
    }

    /// Time spent in the kernel.
    #[must_use]
    pub fn elapsed_micros(&self) -> Micros {
        self.end_micros
            .checked_sub(self.start_micros)
            .expect("guarded by the ordering check in the constructor")
    }
}

/// Cross-core signal that a worker has published its result.
///
/// Transitions from unset to set exactly once per run.
#[derive(Debug, Default)]
pub struct CompletionFlag {
    set: AtomicBool,
}

impl CompletionFlag {
    /// Whether the owning worker has published its result.
    ///
    /// Observing `true` makes every result field the worker stored before setting the flag
    /// visible to the caller.
    #[must_use]
    pub fn is_set(&self) -> bool {
        self.set.load(Ordering::Acquire)
    }

    /// # Panics
    ///
    /// Panics if the flag is already set. Each worker runs exactly once per context.
    fn set(&self) {
        // Release pairs with the Acquire in `is_set()`, publishing the result fields.
        let previous = self.set.swap(true, Ordering::Release);

        assert!(
            !previous,
            "completion flag set twice; a worker slot accepts one result per run"
        );
    }

    fn reset(&mut self) {
        *self.set.get_mut() = false;
    }
}

/// Lifecycle of one worker within a run.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum WorkerPhase {
    /// The worker has not yet started executing on its core.
    NotStarted = 0,

    /// The worker is executing on its core and waiting for the start signal.
    Bound = 1,

    /// The worker is running the workload kernel.
    Running = 2,

    /// The worker has published its result.
    Done = 3,
}

impl WorkerPhase {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::NotStarted,
            1 => Self::Bound,
            2 => Self::Running,
            3 => Self::Done,
            _ => unreachable!("only WorkerPhase discriminants are ever stored"),
        }
    }
}

/// The result slot and completion flag owned by one worker.
///
/// Only the owning worker writes to the slot. Anyone may read it, but the result is only
/// handed out after the completion flag has been observed set.
#[derive(Debug)]
pub struct WorkerSlot {
    core: CoreIndex,
    phase: AtomicU8,
    accumulated_bits: AtomicU32,
    start_micros: AtomicU64,
    end_micros: AtomicU64,
    completion: CompletionFlag,
}

impl WorkerSlot {
    fn new(core: CoreIndex) -> Self {
        Self {
            core,
            phase: AtomicU8::new(WorkerPhase::NotStarted as u8),
            accumulated_bits: AtomicU32::new(0),
            start_micros: AtomicU64::new(0),
            end_micros: AtomicU64::new(0),
            completion: CompletionFlag::default(),
        }
    }

    /// The core the owning worker is bound to.
    #[must_use]
    pub fn core(&self) -> CoreIndex {
        self.core
    }

    /// The most recent lifecycle phase reported by the owning worker.
    #[must_use]
    pub fn phase(&self) -> WorkerPhase {
        WorkerPhase::from_u8(self.phase.load(Ordering::Acquire))
    }

    pub(crate) fn enter_phase(&self, phase: WorkerPhase) {
        self.phase.store(phase as u8, Ordering::Release);
    }

    /// The worker's completion flag.
    #[must_use]
    pub fn completion(&self) -> &CompletionFlag {
        &self.completion
    }

    /// Stores the result and then sets the completion flag. This must be the last thing the
    /// worker does with the context.
    ///
    /// # Panics
    ///
    /// Panics if a result has already been published into this slot.
    pub(crate) fn publish(&self, result: &WorkloadResult) {
        // Relaxed is enough for the fields: the Release in `CompletionFlag::set()` orders them.
        self.accumulated_bits
            .store(result.accumulated.to_bits(), Ordering::Relaxed);
        self.start_micros
            .store(result.start_micros, Ordering::Relaxed);
        self.end_micros.store(result.end_micros, Ordering::Relaxed);
        self.phase.store(WorkerPhase::Done as u8, Ordering::Relaxed);

        self.completion.set();
    }

    /// Returns the published result, or `None` if the completion flag is not yet set.
    #[must_use]
    pub fn try_result(&self) -> Option<WorkloadResult> {
        if !self.completion.is_set() {
            return None;
        }

        Some(WorkloadResult::new(
            f32::from_bits(self.accumulated_bits.load(Ordering::Relaxed)),
            self.start_micros.load(Ordering::Relaxed),
            self.end_micros.load(Ordering::Relaxed),
        ))
    }

    fn reset(&mut self) {
        *self.phase.get_mut() = WorkerPhase::NotStarted as u8;
        *self.accumulated_bits.get_mut() = 0;
        *self.start_micros.get_mut() = 0;
        *self.end_micros.get_mut() = 0;
        self.completion.reset();
    }
}

/// What a secondary worker waiting at the start gate should do.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum GateState {
    /// Keep waiting.
    Closed = 0,

    /// Start the kernel.
    Open = 1,

    /// Exit without running the kernel or publishing a result.
    Cancelled = 2,
}

/// Signal from the orchestrator that lets a bound secondary worker start its kernel, so that
/// both kernels run at the same time.
#[derive(Debug)]
pub struct StartGate {
    state: AtomicU8,
}

impl StartGate {
    fn new() -> Self {
        Self {
            state: AtomicU8::new(GateState::Closed as u8),
        }
    }

    /// The current state of the gate.
    #[must_use]
    pub fn state(&self) -> GateState {
        match self.state.load(Ordering::Acquire) {
            0 => GateState::Closed,
            1 => GateState::Open,
            2 => GateState::Cancelled,
            _ => unreachable!("only GateState discriminants are ever stored"),
        }
    }

    pub(crate) fn open(&self) {
        self.close_with(GateState::Open);
    }

    pub(crate) fn cancel(&self) {
        self.close_with(GateState::Cancelled);
    }

    // A gate leaves the closed state at most once. Later transitions are ignored.
    fn close_with(&self, target: GateState) {
        _ = self.state.compare_exchange(
            GateState::Closed as u8,
            target as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }

    fn reset(&mut self) {
        *self.state.get_mut() = GateState::Closed as u8;
    }
}

/// All state shared between the orchestrator and the workers of one dual-core run.
///
/// Created before the secondary worker is spawned and retired once the run has completed.
/// A context may be reused for another run via [`reset()`][Self::reset], which requires that
/// no worker holds it any more.
#[derive(Debug)]
pub struct BenchmarkContext {
    primary: WorkerSlot,
    secondary: WorkerSlot,
    start_gate: StartGate,
}

impl BenchmarkContext {
    /// Creates a context with both completion flags unset and the start gate closed.
    #[must_use]
    pub fn new() -> Self {
        Self {
            primary: WorkerSlot::new(PRIMARY_CORE),
            secondary: WorkerSlot::new(SECONDARY_CORE),
            start_gate: StartGate::new(),
        }
    }

    /// The slot of the worker that runs inline on the orchestrator's core.
    #[must_use]
    pub fn primary(&self) -> &WorkerSlot {
        &self.primary
    }

    /// The slot of the worker that runs on the other core.
    #[must_use]
    pub fn secondary(&self) -> &WorkerSlot {
        &self.secondary
    }

    /// The gate the secondary worker waits at before starting its kernel.
    #[must_use]
    pub fn start_gate(&self) -> &StartGate {
        &self.start_gate
    }

    /// Clears both completion flags, both result slots and the start gate.
    pub fn reset(&mut self) {
        self.primary.reset();
        self.secondary.reset();
        self.start_gate.reset();
    }
}

impl Default for BenchmarkContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use static_assertions::assert_impl_all;

    use super::*;

    assert_impl_all!(BenchmarkContext: Send, Sync);
    assert_impl_all!(WorkloadResult: Send, Sync, Copy);

    #[test]
    fn new_context_has_nothing_published() {
        let context = BenchmarkContext::new();

        assert!(!context.primary().completion().is_set());
        assert!(!context.secondary().completion().is_set());
        assert!(context.primary().try_result().is_none());
        assert!(context.secondary().try_result().is_none());
        assert_eq!(context.secondary().phase(), WorkerPhase::NotStarted);
        assert_eq!(context.start_gate().state(), GateState::Closed);

        assert_eq!(context.primary().core(), PRIMARY_CORE);
        assert_eq!(context.secondary().core(), SECONDARY_CORE);
    }

    #[test]
    fn published_result_is_returned_exactly() {
        let context = BenchmarkContext::new();
        let result = WorkloadResult::new(123.5, 1_000, 4_500);

        context.secondary().publish(&result);

        assert!(context.secondary().completion().is_set());
        assert_eq!(context.secondary().phase(), WorkerPhase::Done);
        assert_eq!(context.secondary().try_result(), Some(result));

        // The other slot is untouched.
        assert!(context.primary().try_result().is_none());
    }

    #[test]
    #[should_panic]
    fn second_publish_panics() {
        let context = BenchmarkContext::new();
        let result = WorkloadResult::new(1.0, 10, 20);

        context.primary().publish(&result);
        context.primary().publish(&result);
    }

    #[test]
    #[should_panic]
    fn result_rejects_backwards_clock() {
        _ = WorkloadResult::new(1.0, 20, 10);
    }

    #[test]
    fn elapsed_is_end_minus_start() {
        let result = WorkloadResult::new(0.0, 250, 1_250);

        assert_eq!(result.elapsed_micros(), 1_000);
        assert_eq!(WorkloadResult::new(0.0, 7, 7).elapsed_micros(), 0);
    }

    #[test]
    fn reset_clears_everything() {
        let mut context = BenchmarkContext::new();

        context.primary().publish(&WorkloadResult::new(1.0, 1, 2));
        context.secondary().enter_phase(WorkerPhase::Running);
        context.secondary().publish(&WorkloadResult::new(2.0, 3, 4));
        context.start_gate().open();

        context.reset();

        assert!(context.primary().try_result().is_none());
        assert!(context.secondary().try_result().is_none());
        assert_eq!(context.secondary().phase(), WorkerPhase::NotStarted);
        assert_eq!(context.start_gate().state(), GateState::Closed);

        // A reset slot accepts a new result.
        context.secondary().publish(&WorkloadResult::new(3.0, 5, 6));
        assert!(context.secondary().completion().is_set());
    }

    #[test]
    fn gate_leaves_closed_state_once() {
        let context = BenchmarkContext::new();

        context.start_gate().open();
        context.start_gate().cancel();
        assert_eq!(context.start_gate().state(), GateState::Open);

        let context = BenchmarkContext::new();

        context.start_gate().cancel();
        context.start_gate().open();
        assert_eq!(context.start_gate().state(), GateState::Cancelled);
    }

    #[test]
    #[cfg_attr(miri, ignore)] // Slow under Miri and adds nothing over the single-thread tests.
    fn result_published_on_other_thread_is_visible_after_flag() {
        testing::with_watchdog(|| {
            let context = Arc::new(BenchmarkContext::new());

            let writer = thread::spawn({
                let context = Arc::clone(&context);

                move || {
                    context
                        .secondary()
                        .publish(&WorkloadResult::new(42.25, 100, 900));
                }
            });

            let observed = loop {
                if let Some(result) = context.secondary().try_result() {
                    break result;
                }

                thread::yield_now();
            };

            writer.join().unwrap();

            assert_eq!(observed.accumulated().to_bits(), 42.25_f32.to_bits());
            assert_eq!(observed.start_micros(), 100);
            assert_eq!(observed.end_micros(), 900);
        });
    }
}
