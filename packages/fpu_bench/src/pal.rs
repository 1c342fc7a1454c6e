//! Platform Abstraction Layer (PAL). Everything the benchmark needs from the platform it runs on
//! (cores, clocks, thread placement and memory tiers) goes through the [`Platform`] trait, so the
//! orchestration logic can be exercised against a fake platform in unit tests.

mod abstractions;
pub(crate) use abstractions::*;

mod facade;
pub(crate) use facade::*;

mod target;
pub(crate) use target::*;

#[cfg(target_os = "linux")]
mod linux;
#[cfg(target_os = "linux")]
pub(crate) use linux::*;

#[cfg(test)]
mod fake;
#[cfg(test)]
pub(crate) use fake::*;
