//! Traits consumed from the front-end (PAG/SVFIR construction) and
//! the class-hierarchy graph (CHG/DCHG), per spec.md §6. Both are out
//! of scope for this crate — only the capabilities the core actually
//! calls are modeled here, as trait objects the core is handed at
//! construction time (never a concrete dependency on a parser).
//!
//! These are one-time-translation seams (constraint-graph build,
//! MemSSA build, on-the-fly call-graph refinement), not hot inner
//! loops, so `dyn Trait` dispatch here does not conflict with the
//! §9 design note about avoiding virtual dispatch in the SVFG
//! worklist itself.

use crate::bitset::PointsTo;
use crate::ids::{CsId, NodeID, Offset};

/// Kind of a GEP edge (§3): `Normal` carries a known constant offset,
/// `Variant` means the offset is not statically known (e.g. an
/// array index), which forces field-insensitivity on the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GepKind {
    Normal(Offset),
    Variant,
}

/// A single PAG statement edge, one-to-one with what the constraint
/// graph (C2) translates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PagEdgeKind {
    Addr,
    Copy,
    Gep(GepKind),
    Load,
    Store,
    Call(CsId),
    Ret(CsId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PagEdge {
    pub src: NodeID,
    pub dst: NodeID,
    pub kind: PagEdgeKind,
}

/// The program-assignment graph surface the core depends on.
///
/// GEP/field-insensitive object materialization methods take `&mut
/// self` because the spec requires the front-end to create missing
/// derived nodes on demand during solving (§6: "the reader must
/// create any missing GEP object nodes ... with exactly the same id
/// as recorded").
pub trait ProgramAssignmentGraph {
    fn nodes(&self) -> Vec<NodeID>;
    fn edges(&self) -> Vec<PagEdge>;

    fn get_base_obj(&self, n: NodeID) -> NodeID;
    fn get_all_fields_obj_vars(&self, base: NodeID) -> PointsTo;
    fn is_field_insensitive(&self, n: NodeID) -> bool;
    fn is_heap_mem_obj(&self, n: NodeID) -> bool;
    fn is_blk_obj_or_constant_obj(&self, n: NodeID) -> bool;
    fn is_non_pointer_obj(&self, n: NodeID) -> bool;
    fn is_local_var_in_recursive_fun(&self, n: NodeID) -> bool;

    /// Get (creating if necessary) the GEP-derived object node for
    /// `(base, offset)`.
    fn get_gep_obj_var(&mut self, base: NodeID, offset: Offset) -> NodeID;
    /// Get (creating if necessary) the field-insensitive object node
    /// standing in for all of `base`'s fields.
    fn get_fi_obj_var(&mut self, base: NodeID) -> NodeID;

    /// Mark a node (and its derived fields, via `get_all_fields_obj_vars`)
    /// field-insensitive from now on.
    fn set_field_insensitive(&mut self, base: NodeID);

    /// All callsites whose callee is not statically resolved.
    fn indirect_callsites(&self) -> Vec<CsId>;

    /// Resolve an indirect call given the points-to set of the
    /// function-pointer operand. Appends `(cs, callee)` pairs.
    fn resolve_ind_calls(&self, cs: CsId, fp_pts: &PointsTo, new_edges: &mut Vec<(CsId, NodeID)>);

    /// Resolve a C++ virtual call given the points-to set of the
    /// vtable operand (delegates to the CHG). Appends `(cs, callee)`
    /// pairs.
    fn resolve_cpp_ind_calls(
        &self,
        cs: CsId,
        vtbl_pts: &PointsTo,
        new_edges: &mut Vec<(CsId, NodeID)>,
    );

    fn icfg(&self) -> &dyn Icfg;
}

/// What a statement id returned by `Icfg::statements` represents, for
/// the memory-relevant ones MemSSA (C4) must place mu/chi at. `res`/
/// `val` name the PAG node the mu/chi attaches its MRVer use/def to
/// in diagnostics; the region itself is computed from `ptr`'s
/// Andersen points-to set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StmtKind {
    Load { ptr: NodeID, res: NodeID },
    Store { ptr: NodeID, val: NodeID },
    Call(CsId),
    /// Not memory-relevant (arithmetic, branch, ...); no mu/chi.
    Other,
}

/// Minimal ICFG surface the core needs: basic-block successor/
/// predecessor edges (for dominance, used by MemSSA phi insertion)
/// and per-function statement ordering (used for mu/chi emission and
/// SVFG location assignment).
pub trait Icfg {
    fn functions(&self) -> Vec<NodeID>;
    fn entry_block(&self, func: NodeID) -> NodeID;
    fn blocks(&self, func: NodeID) -> Vec<NodeID>;
    fn successors(&self, block: NodeID) -> Vec<NodeID>;
    fn predecessors(&self, block: NodeID) -> Vec<NodeID>;
    fn has_reachable_return(&self, func: NodeID) -> bool;
    /// Statements in program order within a block, as PAG node ids
    /// that may carry a pta-relevant edge (loads/stores/calls).
    fn statements(&self, block: NodeID) -> Vec<NodeID>;
    /// What kind of memory-relevant operation a statement id is, so
    /// MemSSA/SVFG construction can place mu/chi without re-deriving
    /// it from the raw PAG edge list.
    fn stmt_kind(&self, stmt: NodeID) -> StmtKind;
    /// Function containing a given node, if any (used to scope
    /// per-function SSA version ranges).
    fn function_of(&self, node: NodeID) -> Option<NodeID>;
}

/// The class-hierarchy graph surface the core needs for resolving
/// C++-style virtual calls, per spec.md §6.
pub trait ClassHierarchyGraph {
    fn cs_has_vtbls_based_on_cha(&self, cs: CsId) -> bool;
    fn get_cs_vtbls_based_on_cha(&self, cs: CsId) -> Vec<NodeID>;
    fn get_vfns_from_vtbls(&self, cs: CsId, vtbls: &[NodeID], out_vfns: &mut Vec<NodeID>);
}
