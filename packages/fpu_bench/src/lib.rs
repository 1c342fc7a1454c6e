#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Measures floating-point throughput of one and two cores, and how much a buffer in a slower
//! memory tier costs.
//!
//! Every measurement runs the same workload kernel: a fixed number of iterations of a dependent
//! multiply-add chain over four `f32` accumulators (see [`run_kernel()`]). Four benchmark modes
//! build on it:
//!
//! 1. **Capability** reports the core count and floating-point features of the platform.
//! 1. **Single-core** repeats the kernel on one core and derives throughput from the mean time.
//! 1. **Dual-core** runs the kernel on two cores at the same time. The calling thread is the
//!    primary worker; a secondary worker runs on a thread bound to the other core. The two
//!    timing windows are combined over their union, so overlapping execution is not
//!    double-counted.
//! 1. **Memory tier** repeats the kernel with and without a buffer allocated in an auxiliary
//!    memory tier and reports the slowdown.
//!
//! # Synchronization
//!
//! The workers of a dual-core run share a [`BenchmarkContext`]. Each worker owns one result slot
//! and completion flag in it. A worker stores its result before it sets its flag with release
//! ordering, and the orchestrator reads a result only after observing the flag with acquire
//! ordering. The orchestrator waits for the secondary worker with a poll loop that sleeps between
//! checks, bounded by a configurable timeout. A worker that misses the deadline is reported as an
//! error and its context is never reused.
//!
//! # Example
//!
//! ```no_run
//! use fpu_bench::{BenchmarkConfig, Orchestrator};
//!
//! let mut orchestrator = Orchestrator::new(BenchmarkConfig::new()).unwrap();
//!
//! for report in orchestrator.run_all() {
//!     println!("{report}");
//! }
//! ```
//!
//! # Platform support
//!
//! Threads are bound to cores on Linux. On other operating systems the benchmark runs with the
//! threads placed by the operating system scheduler.

mod config;
mod context;
mod error;
mod feature_flags;
mod kernel;
mod metrics;
mod modes;
mod orchestrator;
mod pal;
mod poll;
mod primitive_types;
mod report;
mod worker;

pub use config::*;
pub use context::*;
pub use error::*;
pub use feature_flags::*;
pub use kernel::*;
pub use metrics::*;
pub use modes::CapabilityReport;
pub use orchestrator::*;
pub use primitive_types::*;
pub use report::*;
pub use worker::{CoreBinding, WorkerRole};
