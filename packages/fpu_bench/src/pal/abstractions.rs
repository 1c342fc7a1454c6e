use std::fmt::Debug;
use std::thread::JoinHandle;
use std::time::Duration;

use crate::{CoreIndex, Error, FeatureFlags, MemoryTier, Micros, Result, TaskPriority};

pub(crate) trait Platform: Debug + Send + Sync + 'static {
    /// Human-readable description of the platform, for reports.
    fn description(&self) -> String;

    fn core_count(&self) -> usize;

    fn feature_flags(&self) -> FeatureFlags;

    fn cpu_frequency_mhz(&self) -> Option<u32>;

    /// Makes floating-point instructions usable on the given core. Must be called on that core
    /// before its first kernel run. Calling it again is harmless.
    fn enable_fpu(&self, core: CoreIndex);

    /// Monotonic clock, safe to read from any thread.
    fn now_micros(&self) -> Micros;

    fn sleep(&self, duration: Duration);

    /// Binds the current thread to a core.
    fn pin_current_thread(&self, core: CoreIndex) -> Result<()>;

    /// Starts `entry` on a new thread bound to `core`. The entry point runs to completion and
    /// the thread ends with it.
    ///
    /// Returns an error if the core does not exist or the thread could not be bound to it, in
    /// which case `entry` is never executed.
    fn spawn_bound<F>(&self, core: CoreIndex, priority: TaskPriority, entry: F) -> Result<WorkerHandle>
    where
        F: FnOnce() + Send + 'static;

    /// Total size in bytes of the given memory tier. Zero means the tier is not available.
    fn tier_capacity(&self, tier: MemoryTier) -> usize;

    /// Allocates a zero-initialized buffer of `len` floats in the given tier.
    fn allocate_in_tier(&self, len: usize, tier: MemoryTier) -> Option<TierBuffer>;

    fn free(&self, buffer: TierBuffer);
}

/// A worker thread started by [`Platform::spawn_bound()`].
#[derive(Debug)]
pub(crate) struct WorkerHandle {
    core: CoreIndex,

    // None if the platform accepted the worker but never started a thread for it.
    thread: Option<JoinHandle<()>>,
}

impl WorkerHandle {
    pub(crate) fn new(core: CoreIndex, thread: JoinHandle<()>) -> Self {
        Self {
            core,
            thread: Some(thread),
        }
    }

    #[cfg(test)]
    pub(crate) fn never_scheduled(core: CoreIndex) -> Self {
        Self { core, thread: None }
    }

    /// Whether the worker's thread has ended.
    pub(crate) fn is_finished(&self) -> bool {
        self.thread.as_ref().is_some_and(JoinHandle::is_finished)
    }

    /// Waits for the worker's thread to end.
    pub(crate) fn join(self) -> Result<()> {
        match self.thread {
            Some(thread) => thread
                .join()
                .map_err(|_panic| Error::WorkerExited { core: self.core }),
            None => Ok(()),
        }
    }
}

/// A buffer allocated in a specific memory tier.
#[derive(Debug)]
pub(crate) struct TierBuffer {
    tier: MemoryTier,
    data: Box<[f32]>,
}

impl TierBuffer {
    /// Allocates a zeroed buffer from the global heap, or returns `None` if the heap cannot
    /// satisfy the request.
    pub(crate) fn try_zeroed(len: usize, tier: MemoryTier) -> Option<Self> {
        let mut data = Vec::new();
        data.try_reserve_exact(len).ok()?;
        data.resize(len, 0.0_f32);

        Some(Self {
            tier,
            data: data.into_boxed_slice(),
        })
    }

    pub(crate) fn tier(&self) -> MemoryTier {
        self.tier
    }

    pub(crate) fn len(&self) -> usize {
        self.data.len()
    }

    pub(crate) fn size_bytes(&self) -> usize {
        size_of_val(&*self.data)
    }

    pub(crate) fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.data
    }
}
