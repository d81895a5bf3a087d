//! Memory regions and MemSSA construction (C4): partitions address-
//! taken objects into regions (§4.4), then builds an SSA form over
//! those regions (mu = use, chi = clobber + redefinition) via the
//! standard three-pass Cytron-et-al construction.

mod builder;
mod dom;
mod region;
mod ver;

pub use builder::{FunctionMemSsa, MemSsa, MemSsaBuilder, PhiNode};
pub use dom::Dominance;
pub use region::{MemRegion, RegionPartition};
pub use ver::{MRDef, MRVer};
