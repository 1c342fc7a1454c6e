use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::{CoreIndex, MemoryTier};

/// Errors that can occur when running a benchmark mode or preparing its configuration.
///
/// Every failure is local to the mode that detects it. No metrics are ever reported alongside
/// an error.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Dual-core mode was requested but the platform has fewer than two usable cores.
    #[error("dual-core mode requires two cores but {core_count} core(s) are available")]
    DualCoreUnavailable {
        /// How many cores the benchmark can use.
        core_count: usize,
    },

    /// Dual-core mode was requested but the configuration restricts the benchmark to one core.
    #[error("dual-core mode is disabled by configuration")]
    DualCoreDisabled,

    /// The memory tier needed by the mode is disabled or has no capacity.
    #[error("the {tier} memory tier is not available")]
    MemoryTierUnavailable {
        /// The tier that was requested.
        tier: MemoryTier,
    },

    /// The memory tier exists but could not provide a buffer of the requested size.
    #[error("failed to allocate {bytes} bytes in the {tier} memory tier")]
    TierAllocationFailed {
        /// The tier that was requested.
        tier: MemoryTier,

        /// The size of the requested buffer.
        bytes: usize,
    },

    /// A worker was requested on a core that does not exist.
    #[error("core {core} does not exist, only {core_count} core(s) are available")]
    CoreUnavailable {
        /// The requested core.
        core: CoreIndex,

        /// How many cores are available.
        core_count: usize,
    },

    /// The operating system refused to bind a thread to its core.
    #[error("failed to bind thread to core {core}: {source}")]
    Affinity {
        /// The core the thread was to be bound to.
        core: CoreIndex,

        /// The underlying operating system error.
        source: io::Error,
    },

    /// The operating system refused to create a worker thread.
    #[error("failed to spawn worker thread: {0}")]
    WorkerSpawn(#[source] io::Error),

    /// The secondary worker did not become ready to start within the settle timeout.
    #[error("worker on core {core} was not scheduled within {waited:?}")]
    SettleTimeout {
        /// The core the worker was bound to.
        core: CoreIndex,

        /// How long the orchestrator waited.
        waited: Duration,
    },

    /// The secondary worker did not signal completion within the completion timeout.
    #[error("worker on core {core} did not complete within {waited:?}")]
    WorkerTimeout {
        /// The core the worker was bound to.
        core: CoreIndex,

        /// How long the orchestrator waited after its own kernel returned.
        waited: Duration,
    },

    /// The secondary worker's thread ended without publishing a result.
    #[error("worker on core {core} exited without publishing a result")]
    WorkerExited {
        /// The core the worker was bound to.
        core: CoreIndex,
    },

    /// A timed section completed in less time than the clock can resolve, so no throughput
    /// can be derived from it.
    #[error("{what} completed in zero measurable time; increase the operation count")]
    UnmeasurableElapsed {
        /// Which measurement was affected.
        what: &'static str,
    },

    /// The configuration file could not be read.
    #[error("failed to read configuration file {}: {source}", path.display())]
    ConfigRead {
        /// The file that was being read.
        path: PathBuf,

        /// The underlying I/O error.
        source: io::Error,
    },

    /// The configuration file is not valid TOML or does not match the expected schema.
    #[error("invalid configuration file: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// The configuration values are inconsistent.
    #[error("invalid configuration: {problem}")]
    InvalidConfig {
        /// A human-readable description of the problem.
        problem: String,
    },
}

impl Error {
    /// Whether this error means the mode's preconditions were not met (as opposed to the mode
    /// failing while it was running).
    #[must_use]
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::DualCoreUnavailable { .. }
                | Self::DualCoreDisabled
                | Self::MemoryTierUnavailable { .. }
        )
    }
}

/// A specialized `Result` type for benchmark operations, returning the crate's [`Error`] type
/// as the error value.
pub type Result<T> = std::result::Result<T, Error>;
