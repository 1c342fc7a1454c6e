use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

#[cfg(target_os = "linux")]
use crate::pal::linux::{self, BindingsFacade, ProcessorId};
use crate::pal::{Platform, TierBuffer, WorkerHandle};
use crate::{CoreIndex, Error, FeatureFlags, MemoryTier, Micros, Result, TaskPriority};

#[cfg(not(target_os = "linux"))]
type ProcessorId = u32;

/// The platform the benchmark was built for.
///
/// Core indexes map onto the processors the process was allowed to use when the platform was
/// created, in ascending order. The auxiliary memory tier is a capacity-bounded pool backed by
/// the global heap.
#[derive(Debug)]
pub(crate) struct TargetPlatform {
    processors: Vec<ProcessorId>,

    #[cfg(target_os = "linux")]
    bindings: BindingsFacade,

    epoch: Instant,

    // One entry per core; records whether the FPU has been enabled there.
    fpu_enabled: Vec<AtomicBool>,

    auxiliary_capacity: usize,
    auxiliary_used: AtomicUsize,
}

impl TargetPlatform {
    pub(crate) fn new(auxiliary_tier_bytes: usize) -> Self {
        #[cfg(target_os = "linux")]
        {
            Self::with_bindings(BindingsFacade::target(), auxiliary_tier_bytes)
        }

        #[cfg(not(target_os = "linux"))]
        {
            Self::from_processors(fallback_processors(), auxiliary_tier_bytes)
        }
    }

    #[cfg(target_os = "linux")]
    pub(crate) fn with_bindings(bindings: BindingsFacade, auxiliary_tier_bytes: usize) -> Self {
        let processors = match linux::allowed_processors(&bindings) {
            Ok(processors) if !processors.is_empty() => processors,
            Ok(_) => fallback_processors(),
            Err(error) => {
                warn!(%error, "cannot read processor affinity, assuming all processors are usable");
                fallback_processors()
            }
        };

        Self {
            bindings,
            ..Self::from_processors(processors, auxiliary_tier_bytes)
        }
    }

    fn from_processors(processors: Vec<ProcessorId>, auxiliary_tier_bytes: usize) -> Self {
        let fpu_enabled = processors.iter().map(|_| AtomicBool::new(false)).collect();

        Self {
            processors,
            #[cfg(target_os = "linux")]
            bindings: BindingsFacade::target(),
            epoch: Instant::now(),
            fpu_enabled,
            auxiliary_capacity: auxiliary_tier_bytes,
            auxiliary_used: AtomicUsize::new(0),
        }
    }

    fn processor_for(&self, core: CoreIndex) -> Result<ProcessorId> {
        usize::try_from(core)
            .ok()
            .and_then(|index| self.processors.get(index))
            .copied()
            .ok_or(Error::CoreUnavailable {
                core,
                core_count: self.processors.len(),
            })
    }

    #[cfg(target_os = "linux")]
    fn pinner(&self) -> impl Fn(ProcessorId) -> std::io::Result<()> + Send + 'static {
        let bindings = self.bindings.clone();
        move |processor| linux::pin_current_thread_to(&bindings, processor)
    }

    // Other operating systems leave placement to the scheduler.
    #[cfg(not(target_os = "linux"))]
    #[expect(clippy::unused_self, reason = "mirrors the Linux signature")]
    fn pinner(&self) -> impl Fn(ProcessorId) -> std::io::Result<()> + Send + 'static {
        |_processor| Ok(())
    }
}

fn fallback_processors() -> Vec<ProcessorId> {
    let count = thread::available_parallelism().map_or(1, std::num::NonZero::get);

    (0..count)
        .map(|index| ProcessorId::try_from(index).expect("processor count fits in a processor ID"))
        .collect()
}

fn detect_feature_flags() -> FeatureFlags {
    #[cfg(target_arch = "x86_64")]
    {
        let mut flags = FeatureFlags::FPU | FeatureFlags::DOUBLE_PRECISION;

        if std::arch::is_x86_feature_detected!("avx") {
            flags |= FeatureFlags::SIMD;
        }

        if std::arch::is_x86_feature_detected!("fma") {
            flags |= FeatureFlags::FMA;
        }

        flags
    }

    #[cfg(target_arch = "aarch64")]
    {
        let mut flags = FeatureFlags::FPU | FeatureFlags::DOUBLE_PRECISION | FeatureFlags::FMA;

        if std::arch::is_aarch64_feature_detected!("neon") {
            flags |= FeatureFlags::SIMD;
        }

        flags
    }

    #[cfg(any(target_arch = "riscv32", target_arch = "riscv64"))]
    {
        let mut flags = FeatureFlags::empty();

        if cfg!(target_feature = "f") {
            flags |= FeatureFlags::FPU | FeatureFlags::FMA;
        }

        if cfg!(target_feature = "d") {
            flags |= FeatureFlags::DOUBLE_PRECISION;
        }

        flags
    }

    #[cfg(not(any(
        target_arch = "x86_64",
        target_arch = "aarch64",
        target_arch = "riscv32",
        target_arch = "riscv64"
    )))]
    {
        FeatureFlags::empty()
    }
}

impl Platform for TargetPlatform {
    fn description(&self) -> String {
        format!("{} ({})", std::env::consts::ARCH, std::env::consts::OS)
    }

    fn core_count(&self) -> usize {
        self.processors.len()
    }

    fn feature_flags(&self) -> FeatureFlags {
        detect_feature_flags()
    }

    #[cfg_attr(test, mutants::skip)] // Depends on host frequency reporting.
    fn cpu_frequency_mhz(&self) -> Option<u32> {
        #[cfg(target_os = "linux")]
        {
            linux::max_frequency_mhz(*self.processors.first()?)
        }

        #[cfg(not(target_os = "linux"))]
        {
            None
        }
    }

    fn enable_fpu(&self, core: CoreIndex) {
        let Some(enabled) = usize::try_from(core)
            .ok()
            .and_then(|index| self.fpu_enabled.get(index))
        else {
            return;
        };

        // Hosted targets keep the FPU permanently enabled for user code, so all that is left
        // to do is remember that the core is ready.
        if !enabled.swap(true, Ordering::Relaxed) {
            debug!(core, "floating-point unit enabled");
        }
    }

    fn now_micros(&self) -> Micros {
        Micros::try_from(self.epoch.elapsed().as_micros())
            .expect("a u64 of microseconds covers over half a million years of uptime")
    }

    fn sleep(&self, duration: Duration) {
        thread::sleep(duration);
    }

    fn pin_current_thread(&self, core: CoreIndex) -> Result<()> {
        let processor = self.processor_for(core)?;

        (self.pinner())(processor).map_err(|source| Error::Affinity { core, source })?;

        debug!(core, processor, "thread bound to core");
        Ok(())
    }

    fn spawn_bound<F>(&self, core: CoreIndex, priority: TaskPriority, entry: F) -> Result<WorkerHandle>
    where
        F: FnOnce() + Send + 'static,
    {
        let processor = self.processor_for(core)?;
        let pin = self.pinner();

        // The new thread binds itself and reports back before it runs the entry point, so that
        // a core we cannot use is reported here instead of surfacing as a silent stall.
        let (pinned_tx, pinned_rx) = oneshot::channel();

        let thread = thread::Builder::new()
            .name(format!("fpu-bench-core{core}"))
            .spawn(move || {
                let pinned = pin(processor);
                let can_run = pinned.is_ok();

                // If the spawner is gone there is nobody to run for.
                if pinned_tx.send(pinned).is_ok() && can_run {
                    entry();
                }
            })
            .map_err(Error::WorkerSpawn)?;

        // Hosted operating systems run every benchmark thread at the default priority.
        debug!(core, processor, %priority, "worker thread started");

        match pinned_rx.recv() {
            Ok(Ok(())) => Ok(WorkerHandle::new(core, thread)),
            Ok(Err(source)) => {
                // The thread ends without running the entry point; nothing else to clean up.
                drop(thread.join());
                Err(Error::Affinity { core, source })
            }
            Err(_) => Err(Error::WorkerExited { core }),
        }
    }

    fn tier_capacity(&self, tier: MemoryTier) -> usize {
        match tier {
            MemoryTier::Primary => usize::MAX,
            MemoryTier::Auxiliary => self.auxiliary_capacity,
        }
    }

    fn allocate_in_tier(&self, len: usize, tier: MemoryTier) -> Option<TierBuffer> {
        let bytes = len.checked_mul(size_of::<f32>())?;

        if tier == MemoryTier::Auxiliary {
            // Reserve capacity first so concurrent allocations cannot overcommit the pool.
            self.auxiliary_used
                .fetch_update(Ordering::AcqRel, Ordering::Acquire, |used| {
                    used.checked_add(bytes)
                        .filter(|total| *total <= self.auxiliary_capacity)
                })
                .ok()?;
        }

        let buffer = TierBuffer::try_zeroed(len, tier);

        if buffer.is_none() && tier == MemoryTier::Auxiliary {
            self.auxiliary_used.fetch_sub(bytes, Ordering::AcqRel);
        }

        buffer
    }

    fn free(&self, buffer: TierBuffer) {
        if buffer.tier() == MemoryTier::Auxiliary {
            self.auxiliary_used
                .fetch_sub(buffer.size_bytes(), Ordering::AcqRel);
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::AtomicU32;

    use super::*;

    #[test]
    fn auxiliary_tier_is_bounded_by_capacity() {
        let platform = TargetPlatform::new(4096);

        assert_eq!(platform.tier_capacity(MemoryTier::Auxiliary), 4096);

        let first = platform
            .allocate_in_tier(1024, MemoryTier::Auxiliary)
            .unwrap();

        // The pool is now exhausted.
        assert!(platform.allocate_in_tier(1, MemoryTier::Auxiliary).is_none());

        platform.free(first);

        // Freeing returns the capacity.
        let second = platform
            .allocate_in_tier(1024, MemoryTier::Auxiliary)
            .unwrap();
        platform.free(second);
    }

    #[test]
    fn disabled_auxiliary_tier_allocates_nothing() {
        let platform = TargetPlatform::new(0);

        assert_eq!(platform.tier_capacity(MemoryTier::Auxiliary), 0);
        assert!(platform.allocate_in_tier(1, MemoryTier::Auxiliary).is_none());
    }

    #[test]
    fn clock_is_monotonic() {
        let platform = TargetPlatform::new(0);

        let first = platform.now_micros();
        platform.sleep(Duration::from_millis(2));
        let second = platform.now_micros();

        assert!(second >= first.saturating_add(1_000));
    }

    #[test]
    fn has_at_least_one_core() {
        let platform = TargetPlatform::new(0);

        assert!(platform.core_count() >= 1);
        assert!(!platform.description().is_empty());
    }

    #[test]
    fn enable_fpu_is_idempotent() {
        let platform = TargetPlatform::new(0);

        platform.enable_fpu(0);
        platform.enable_fpu(0);

        // Unknown cores are ignored rather than panicking.
        platform.enable_fpu(CoreIndex::MAX);
    }

    #[test]
    fn spawn_on_missing_core_fails_without_running() {
        let platform = TargetPlatform::new(0);
        let missing = CoreIndex::try_from(platform.core_count()).unwrap();

        let ran = Arc::new(AtomicU32::new(0));

        let result = platform.spawn_bound(missing, TaskPriority(5), {
            let ran = Arc::clone(&ran);
            move || {
                ran.fetch_add(1, Ordering::Relaxed);
            }
        });

        assert!(matches!(result, Err(Error::CoreUnavailable { .. })));
        assert_eq!(ran.load(Ordering::Relaxed), 0);
    }

    #[test]
    #[cfg_attr(miri, ignore)] // Miri cannot call platform APIs.
    fn spawned_worker_runs_entry_point() {
        testing::with_watchdog(|| {
            let platform = TargetPlatform::new(0);
            let ran = Arc::new(AtomicU32::new(0));

            let handle = platform
                .spawn_bound(0, TaskPriority(5), {
                    let ran = Arc::clone(&ran);
                    move || {
                        ran.fetch_add(1, Ordering::Relaxed);
                    }
                })
                .unwrap();

            handle.join().unwrap();
            assert_eq!(ran.load(Ordering::Relaxed), 1);
        });
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn failed_pin_is_reported_and_entry_skipped() {
        use std::io;

        use crate::pal::linux::MockBindings;

        testing::with_watchdog(|| {
            let mut mock = MockBindings::new();
            mock.expect_sched_getaffinity_current().returning(|| {
                // SAFETY: All zeroes is a valid cpu_set_t.
                let mut cpu_set: libc::cpu_set_t = unsafe { std::mem::zeroed() };

                // SAFETY: 0 and 1 are below CPU_SETSIZE.
                unsafe {
                    libc::CPU_SET(0, &mut cpu_set);
                    libc::CPU_SET(1, &mut cpu_set);
                }

                Ok(cpu_set)
            });
            mock.expect_sched_setaffinity_current()
                .returning(|_| Err(io::Error::from_raw_os_error(libc::EPERM)));

            let platform = TargetPlatform::with_bindings(BindingsFacade::from_mock(mock), 0);
            assert_eq!(platform.core_count(), 2);

            let ran = Arc::new(AtomicU32::new(0));

            let result = platform.spawn_bound(1, TaskPriority(5), {
                let ran = Arc::clone(&ran);
                move || {
                    ran.fetch_add(1, Ordering::Relaxed);
                }
            });

            assert!(matches!(result, Err(Error::Affinity { core: 1, .. })));
            assert_eq!(ran.load(Ordering::Relaxed), 0);

            assert!(matches!(
                platform.pin_current_thread(0),
                Err(Error::Affinity { core: 0, .. })
            ));
        });
    }
}
