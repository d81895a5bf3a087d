//! Mod/ref summary port consumed by MemSSA's `createMUCHI` (§4.4) for
//! call sites: which base objects a call may read (`ref_objects`,
//! drives `CALLMU`) or write (`mod_objects`, drives `CALLCHI`).
//!
//! Computing this from a call graph (direct edges plus Andersen's
//! on-the-fly resolved indirect edges) and each callee's own
//! used-region set is an inter-procedural, bottom-up-over-the-call-graph
//! computation that belongs to the driver wiring `callgraph.rs`
//! together with MemSSA construction, not to MemSSA itself — mirrors
//! how `ProgramAssignmentGraph`/`Icfg`/`ClassHierarchyGraph` already
//! push PAG/CHG construction out of this crate's scope.

use crate::bitset::PointsTo;
use crate::ids::CsId;

pub trait ModRefAnalysis {
    /// Base objects a call may write through any pointer parameter or
    /// global effect, transitively through its resolved callees.
    fn mod_objects(&self, cs: CsId) -> PointsTo;
    /// Base objects a call may read, same transitive closure.
    fn ref_objects(&self, cs: CsId) -> PointsTo;
}
