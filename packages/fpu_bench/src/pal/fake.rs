use std::cell::Cell;
use std::fmt;
use std::sync::{Condvar, Mutex};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use crate::pal::{Platform, TierBuffer, WorkerHandle};
use crate::{CoreIndex, Error, FeatureFlags, MemoryTier, Micros, Result, TaskPriority};

/// What the fake platform does with a worker handed to `spawn_bound()`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum SecondaryBehavior {
    /// Runs the entry point on a new thread.
    Run,

    /// Accepts the worker but never executes its entry point.
    NeverScheduled,

    /// Starts a thread that ends without executing the entry point.
    ExitWithoutRunning,

    /// Runs the entry point on a new thread that blocks on its first clock read until
    /// [`FakePlatform::release_stalled_workers()`] is called.
    StallOnClock,
}

thread_local! {
    static STALLS_ON_CLOCK: Cell<bool> = const { Cell::new(false) };
}

type ParkedEntry = Box<dyn FnOnce() + Send>;

/// A platform for unit tests, with a manual clock and call counters.
///
/// The clock advances by `clock_step` microseconds on every read and by the full duration on
/// every sleep, so poll loops complete without real waiting.
pub(crate) struct FakePlatform {
    core_count: usize,
    feature_flags: FeatureFlags,
    frequency_mhz: Option<u32>,
    clock_step: Micros,
    secondary: SecondaryBehavior,
    auxiliary_capacity: usize,
    failing_allocations: bool,

    clock: AtomicU64,
    auxiliary_used: AtomicUsize,

    // Entry points of never scheduled workers, kept alive like a real stuck worker would be.
    parked: Mutex<Vec<ParkedEntry>>,

    stall_released: Mutex<bool>,
    stall_changed: Condvar,

    clock_reads: AtomicUsize,
    sleeps: AtomicUsize,
    spawns: AtomicUsize,
    pins: AtomicUsize,
    fpu_enables: AtomicUsize,
    allocations: AtomicUsize,
    frees: AtomicUsize,
}

impl FakePlatform {
    /// Two cores with an FPU, a 1 µs clock step, secondaries that run and no auxiliary tier.
    pub(crate) fn new() -> Self {
        Self {
            core_count: 2,
            feature_flags: FeatureFlags::FPU | FeatureFlags::DOUBLE_PRECISION,
            frequency_mhz: None,
            clock_step: 1,
            secondary: SecondaryBehavior::Run,
            auxiliary_capacity: 0,
            failing_allocations: false,
            clock: AtomicU64::new(0),
            auxiliary_used: AtomicUsize::new(0),
            parked: Mutex::new(Vec::new()),
            stall_released: Mutex::new(false),
            stall_changed: Condvar::new(),
            clock_reads: AtomicUsize::new(0),
            sleeps: AtomicUsize::new(0),
            spawns: AtomicUsize::new(0),
            pins: AtomicUsize::new(0),
            fpu_enables: AtomicUsize::new(0),
            allocations: AtomicUsize::new(0),
            frees: AtomicUsize::new(0),
        }
    }

    #[must_use]
    pub(crate) fn cores(mut self, count: usize) -> Self {
        self.core_count = count;
        self
    }

    #[must_use]
    pub(crate) fn clock_step(mut self, step: Micros) -> Self {
        self.clock_step = step;
        self
    }

    #[must_use]
    pub(crate) fn auxiliary_tier_bytes(mut self, bytes: usize) -> Self {
        self.auxiliary_capacity = bytes;
        self
    }

    #[must_use]
    pub(crate) fn failing_allocations(mut self) -> Self {
        self.failing_allocations = true;
        self
    }

    #[must_use]
    pub(crate) fn secondary(mut self, behavior: SecondaryBehavior) -> Self {
        self.secondary = behavior;
        self
    }

    #[must_use]
    pub(crate) fn frequency(mut self, mhz: u32) -> Self {
        self.frequency_mhz = Some(mhz);
        self
    }

    #[must_use]
    pub(crate) fn with_feature_flags(mut self, flags: FeatureFlags) -> Self {
        self.feature_flags = flags;
        self
    }

    pub(crate) fn clock_reads(&self) -> usize {
        self.clock_reads.load(Ordering::Relaxed)
    }

    pub(crate) fn sleeps(&self) -> usize {
        self.sleeps.load(Ordering::Relaxed)
    }

    pub(crate) fn spawns(&self) -> usize {
        self.spawns.load(Ordering::Relaxed)
    }

    pub(crate) fn pins(&self) -> usize {
        self.pins.load(Ordering::Relaxed)
    }

    pub(crate) fn fpu_enables(&self) -> usize {
        self.fpu_enables.load(Ordering::Relaxed)
    }

    pub(crate) fn allocations(&self) -> usize {
        self.allocations.load(Ordering::Relaxed)
    }

    pub(crate) fn frees(&self) -> usize {
        self.frees.load(Ordering::Relaxed)
    }

    /// Bytes of the auxiliary tier currently handed out.
    pub(crate) fn auxiliary_in_use(&self) -> usize {
        self.auxiliary_used.load(Ordering::Relaxed)
    }

    /// Entry points accepted but never executed.
    pub(crate) fn parked_workers(&self) -> usize {
        self.parked
            .lock()
            .expect("poisoned lock means a test already failed")
            .len()
    }

    /// Lets workers blocked by [`SecondaryBehavior::StallOnClock`] continue.
    pub(crate) fn release_stalled_workers(&self) {
        *self
            .stall_released
            .lock()
            .expect("poisoned lock means a test already failed") = true;

        self.stall_changed.notify_all();
    }

    fn wait_for_release(&self) {
        let mut released = self
            .stall_released
            .lock()
            .expect("poisoned lock means a test already failed");

        while !*released {
            released = self
                .stall_changed
                .wait(released)
                .expect("poisoned lock means a test already failed");
        }
    }

    fn check_core(&self, core: CoreIndex) -> Result<()> {
        let exists = usize::try_from(core).is_ok_and(|index| index < self.core_count);

        if exists {
            Ok(())
        } else {
            Err(Error::CoreUnavailable {
                core,
                core_count: self.core_count,
            })
        }
    }
}

impl fmt::Debug for FakePlatform {
    #[cfg_attr(test, mutants::skip)] // No API contract to test.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FakePlatform")
            .field("core_count", &self.core_count)
            .field("clock", &self.clock)
            .field("secondary", &self.secondary)
            .field("auxiliary_capacity", &self.auxiliary_capacity)
            .finish_non_exhaustive()
    }
}

impl Platform for FakePlatform {
    fn description(&self) -> String {
        "fake platform".to_string()
    }

    fn core_count(&self) -> usize {
        self.core_count
    }

    fn feature_flags(&self) -> FeatureFlags {
        self.feature_flags
    }

    fn cpu_frequency_mhz(&self) -> Option<u32> {
        self.frequency_mhz
    }

    fn enable_fpu(&self, _core: CoreIndex) {
        self.fpu_enables.fetch_add(1, Ordering::Relaxed);
    }

    fn now_micros(&self) -> Micros {
        if STALLS_ON_CLOCK.get() {
            self.wait_for_release();
        }

        self.clock_reads.fetch_add(1, Ordering::Relaxed);

        self.clock
            .fetch_add(self.clock_step, Ordering::Relaxed)
            .wrapping_add(self.clock_step)
    }

    fn sleep(&self, duration: Duration) {
        self.sleeps.fetch_add(1, Ordering::Relaxed);

        let micros = Micros::try_from(duration.as_micros()).unwrap_or(Micros::MAX);
        self.clock.fetch_add(micros, Ordering::Relaxed);

        // Give real worker threads a chance to make progress.
        thread::yield_now();
    }

    fn pin_current_thread(&self, core: CoreIndex) -> Result<()> {
        self.check_core(core)?;
        self.pins.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn spawn_bound<F>(&self, core: CoreIndex, _priority: TaskPriority, entry: F) -> Result<WorkerHandle>
    where
        F: FnOnce() + Send + 'static,
    {
        self.check_core(core)?;
        self.spawns.fetch_add(1, Ordering::Relaxed);

        match self.secondary {
            SecondaryBehavior::Run => {
                let thread = thread::Builder::new()
                    .name(format!("fake-core{core}"))
                    .spawn(entry)
                    .map_err(Error::WorkerSpawn)?;

                Ok(WorkerHandle::new(core, thread))
            }
            SecondaryBehavior::NeverScheduled => {
                self.parked
                    .lock()
                    .expect("poisoned lock means a test already failed")
                    .push(Box::new(entry));

                Ok(WorkerHandle::never_scheduled(core))
            }
            SecondaryBehavior::ExitWithoutRunning => {
                let thread = thread::Builder::new()
                    .name(format!("fake-core{core}"))
                    .spawn(move || drop(entry))
                    .map_err(Error::WorkerSpawn)?;

                Ok(WorkerHandle::new(core, thread))
            }
            SecondaryBehavior::StallOnClock => {
                let thread = thread::Builder::new()
                    .name(format!("fake-core{core}"))
                    .spawn(move || {
                        STALLS_ON_CLOCK.set(true);
                        entry();
                    })
                    .map_err(Error::WorkerSpawn)?;

                Ok(WorkerHandle::new(core, thread))
            }
        }
    }

    fn tier_capacity(&self, tier: MemoryTier) -> usize {
        match tier {
            MemoryTier::Primary => usize::MAX,
            MemoryTier::Auxiliary => self.auxiliary_capacity,
        }
    }

    fn allocate_in_tier(&self, len: usize, tier: MemoryTier) -> Option<TierBuffer> {
        self.allocations.fetch_add(1, Ordering::Relaxed);

        if self.failing_allocations {
            return None;
        }

        let bytes = len.checked_mul(size_of::<f32>())?;

        if tier == MemoryTier::Auxiliary {
            let used = self.auxiliary_used.load(Ordering::Relaxed);

            if used.checked_add(bytes)? > self.auxiliary_capacity {
                return None;
            }

            self.auxiliary_used.fetch_add(bytes, Ordering::Relaxed);
        }

        TierBuffer::try_zeroed(len, tier)
    }

    fn free(&self, buffer: TierBuffer) {
        self.frees.fetch_add(1, Ordering::Relaxed);

        if buffer.tier() == MemoryTier::Auxiliary {
            self.auxiliary_used
                .fetch_sub(buffer.size_bytes(), Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::AtomicBool;

    use super::*;

    #[test]
    fn clock_steps_on_read_and_jumps_on_sleep() {
        let platform = FakePlatform::new().clock_step(5);

        assert_eq!(platform.now_micros(), 5);
        assert_eq!(platform.now_micros(), 10);

        platform.sleep(Duration::from_millis(10));

        assert_eq!(platform.now_micros(), 10_015);
        assert_eq!(platform.clock_reads(), 3);
        assert_eq!(platform.sleeps(), 1);
    }

    #[test]
    fn never_scheduled_worker_keeps_its_entry_point() {
        let platform = FakePlatform::new().secondary(SecondaryBehavior::NeverScheduled);
        let ran = Arc::new(AtomicBool::new(false));

        let handle = platform
            .spawn_bound(1, TaskPriority(5), {
                let ran = Arc::clone(&ran);
                move || ran.store(true, Ordering::Relaxed)
            })
            .unwrap();

        assert!(!handle.is_finished());
        assert_eq!(platform.parked_workers(), 1);
        assert_eq!(platform.spawns(), 1);
        assert!(!ran.load(Ordering::Relaxed));
    }

    #[test]
    #[cfg_attr(miri, ignore)] // Miri is too slow for thread tests to be worth it here.
    fn exiting_worker_never_runs_entry_point() {
        testing::with_watchdog(|| {
            let platform = FakePlatform::new().secondary(SecondaryBehavior::ExitWithoutRunning);
            let ran = Arc::new(AtomicBool::new(false));

            let handle = platform
                .spawn_bound(1, TaskPriority(5), {
                    let ran = Arc::clone(&ran);
                    move || ran.store(true, Ordering::Relaxed)
                })
                .unwrap();

            handle.join().unwrap();
            assert!(!ran.load(Ordering::Relaxed));
        });
    }

    #[test]
    #[cfg_attr(miri, ignore)] // Miri is too slow for thread tests to be worth it here.
    fn stalled_worker_reads_clock_only_after_release() {
        testing::with_watchdog(|| {
            let platform = Arc::new(FakePlatform::new().secondary(SecondaryBehavior::StallOnClock));
            let (reached_tx, reached_rx) = oneshot::channel();

            let handle = platform
                .spawn_bound(1, TaskPriority(5), {
                    let platform = Arc::clone(&platform);
                    move || {
                        reached_tx.send(()).unwrap();
                        platform.now_micros();
                    }
                })
                .unwrap();

            reached_rx.recv().unwrap();

            // The calling thread is not stalled.
            assert_eq!(platform.now_micros(), 1);
            assert!(!handle.is_finished());

            platform.release_stalled_workers();
            handle.join().unwrap();

            assert_eq!(platform.clock_reads(), 2);
        });
    }

    #[test]
    fn spawn_on_absent_core_fails() {
        let platform = FakePlatform::new().cores(1);

        let result = platform.spawn_bound(1, TaskPriority(5), || {});

        assert!(matches!(
            result,
            Err(Error::CoreUnavailable {
                core: 1,
                core_count: 1
            })
        ));
        assert_eq!(platform.spawns(), 0);
    }

    #[test]
    fn auxiliary_tier_tracks_usage() {
        let platform = FakePlatform::new().auxiliary_tier_bytes(4096);

        let buffer = platform
            .allocate_in_tier(1024, MemoryTier::Auxiliary)
            .unwrap();
        assert_eq!(platform.auxiliary_in_use(), 4096);
        assert!(platform.allocate_in_tier(1, MemoryTier::Auxiliary).is_none());

        platform.free(buffer);
        assert_eq!(platform.auxiliary_in_use(), 0);
        assert_eq!(platform.allocations(), 2);
        assert_eq!(platform.frees(), 1);
    }

    #[test]
    fn failing_allocations_fail() {
        let platform = FakePlatform::new()
            .auxiliary_tier_bytes(4096)
            .failing_allocations();

        assert!(platform.allocate_in_tier(16, MemoryTier::Auxiliary).is_none());
        assert_eq!(platform.allocations(), 1);
        assert_eq!(platform.auxiliary_in_use(), 0);
    }
}
