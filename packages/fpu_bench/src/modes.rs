//! The four benchmark modes. Each mode is independent of the others: it prepares everything it
//! needs, measures, and returns either its figures or the error that stopped it.

mod capability;
pub use capability::*;

mod dual_core;
pub(crate) use dual_core::*;

mod memory_tier;
pub(crate) use memory_tier::*;

mod single_core;
pub(crate) use single_core::*;
