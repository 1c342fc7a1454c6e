use derive_more::Display;

/// Identifies one of the cores the benchmark may use.
///
/// This is an index into the cores made available to the benchmark, not an operating system
/// processor ID. Index 0 is always the core the orchestrator runs on.
pub type CoreIndex = u32;

/// The core that runs the orchestrator and, in dual-core mode, the primary worker.
pub const PRIMARY_CORE: CoreIndex = 0;

/// The core that runs the secondary worker in dual-core mode.
pub const SECONDARY_CORE: CoreIndex = 1;

/// A timestamp or duration in microseconds, as read from the platform's monotonic clock.
pub type Micros = u64;

/// Scheduling priority requested for a spawned worker.
///
/// Higher values request more urgent scheduling. Platforms that cannot honor the request
/// still spawn the worker, at their default priority.
#[derive(Clone, Copy, Debug, Display, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[display("{_0}")]
pub struct TaskPriority(pub u8);

/// Memory tiers a buffer can be allocated in.
#[derive(Clone, Copy, Debug, Display, Eq, Hash, PartialEq)]
#[non_exhaustive]
pub enum MemoryTier {
    /// The core's regular working memory.
    #[display("primary")]
    Primary,

    /// An auxiliary memory region with higher access latency than primary memory.
    #[display("auxiliary")]
    Auxiliary,
}
