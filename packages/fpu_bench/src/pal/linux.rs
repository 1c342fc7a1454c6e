mod bindings;
pub(crate) use bindings::*;

mod affinity;
pub(crate) use affinity::*;
