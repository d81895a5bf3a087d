//! Shared PAG/ICFG fixtures for the end-to-end scenario tests in
//! `pipeline_scenarios.rs`: literal node/edge lists wrapped in
//! `ports::frontend::ProgramAssignmentGraph`/`Icfg` impls, good enough
//! to drive the whole `Analyzer` pipeline without a real front end.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::HashMap;

use svf_core::ids::{CsId, NodeID, Offset};
use svf_core::ports::frontend::{Icfg, PagEdge, PagEdgeKind, ProgramAssignmentGraph, StmtKind};
use svf_core::PointsTo;

pub const ENTRY: u32 = 9_000;

/// A flat, single-function, single-block ICFG: the statement list is
/// whatever memory ops a scenario names, in program order, with every
/// other node falling through `StmtKind::Other`.
pub struct FlatIcfg {
    pub stmts: Vec<(NodeID, StmtKind)>,
}

impl Icfg for FlatIcfg {
    fn functions(&self) -> Vec<NodeID> {
        vec![NodeID::new(ENTRY)]
    }
    fn entry_block(&self, _func: NodeID) -> NodeID {
        NodeID::new(ENTRY)
    }
    fn blocks(&self, _func: NodeID) -> Vec<NodeID> {
        vec![NodeID::new(ENTRY)]
    }
    fn successors(&self, _block: NodeID) -> Vec<NodeID> {
        vec![]
    }
    fn predecessors(&self, _block: NodeID) -> Vec<NodeID> {
        vec![]
    }
    fn has_reachable_return(&self, _func: NodeID) -> bool {
        true
    }
    fn statements(&self, _block: NodeID) -> Vec<NodeID> {
        self.stmts.iter().map(|(id, _)| *id).collect()
    }
    fn stmt_kind(&self, stmt: NodeID) -> StmtKind {
        self.stmts
            .iter()
            .find(|(id, _)| *id == stmt)
            .map(|(_, kind)| *kind)
            .unwrap_or(StmtKind::Other)
    }
    fn function_of(&self, _node: NodeID) -> Option<NodeID> {
        Some(NodeID::new(ENTRY))
    }
}

/// A flat PAG over a literal edge list. GEP-derived objects are
/// materialized on demand the same way `andersen::rules::MockPag` does
/// it (interior-mutable maps, since the trait's derived-node methods
/// take `&mut self` but `Analyzer` only ever hands out `&mut dyn
/// ProgramAssignmentGraph` through borrows the solver already holds
/// mutably). Indirect calls resolve by scanning `candidates` for
/// whichever function-object ids appear in the function-pointer
/// operand's points-to set.
pub struct FlatPag {
    pub edges: Vec<PagEdge>,
    pub icfg: FlatIcfg,
    /// `(callsite, function-object id, callee node)` — a candidate
    /// resolution `resolve_ind_calls` reports once `function-object id`
    /// shows up in the callsite's function-pointer points-to set.
    pub indirect_candidates: Vec<(CsId, u32, NodeID)>,
    next_derived: RefCell<u32>,
    gep_objs: RefCell<HashMap<(NodeID, Offset), NodeID>>,
    fi_objs: RefCell<HashMap<NodeID, NodeID>>,
    field_insensitive: RefCell<std::collections::HashSet<NodeID>>,
}

impl FlatPag {
    pub fn new(edges: Vec<PagEdge>, stmts: Vec<(NodeID, StmtKind)>) -> Self {
        Self {
            edges,
            icfg: FlatIcfg { stmts },
            indirect_candidates: vec![],
            next_derived: RefCell::new(50_000),
            gep_objs: RefCell::new(HashMap::new()),
            fi_objs: RefCell::new(HashMap::new()),
            field_insensitive: RefCell::new(std::collections::HashSet::new()),
        }
    }

    pub fn with_indirect_candidates(mut self, candidates: Vec<(CsId, u32, NodeID)>) -> Self {
        self.indirect_candidates = candidates;
        self
    }

    fn fresh(&self) -> NodeID {
        let mut next = self.next_derived.borrow_mut();
        let id = NodeID::new(*next);
        *next += 1;
        id
    }
}

impl ProgramAssignmentGraph for FlatPag {
    fn nodes(&self) -> Vec<NodeID> {
        let mut ids: Vec<u32> = self.edges.iter().flat_map(|e| [e.src.raw(), e.dst.raw()]).collect();
        ids.sort_unstable();
        ids.dedup();
        ids.into_iter().map(NodeID::new).collect()
    }
    fn edges(&self) -> Vec<PagEdge> {
        self.edges.clone()
    }
    fn get_base_obj(&self, n: NodeID) -> NodeID {
        n
    }
    fn get_all_fields_obj_vars(&self, _base: NodeID) -> PointsTo {
        PointsTo::new()
    }
    fn is_field_insensitive(&self, n: NodeID) -> bool {
        self.field_insensitive.borrow().contains(&n)
    }
    fn is_heap_mem_obj(&self, _n: NodeID) -> bool {
        false
    }
    fn is_blk_obj_or_constant_obj(&self, _n: NodeID) -> bool {
        false
    }
    fn is_non_pointer_obj(&self, _n: NodeID) -> bool {
        false
    }
    fn is_local_var_in_recursive_fun(&self, _n: NodeID) -> bool {
        false
    }
    fn get_gep_obj_var(&mut self, base: NodeID, offset: Offset) -> NodeID {
        if let Some(&existing) = self.gep_objs.borrow().get(&(base, offset)) {
            return existing;
        }
        let id = self.fresh();
        self.gep_objs.borrow_mut().insert((base, offset), id);
        id
    }
    fn get_fi_obj_var(&mut self, base: NodeID) -> NodeID {
        if let Some(&existing) = self.fi_objs.borrow().get(&base) {
            return existing;
        }
        let id = self.fresh();
        self.fi_objs.borrow_mut().insert(base, id);
        id
    }
    fn set_field_insensitive(&mut self, base: NodeID) {
        self.field_insensitive.borrow_mut().insert(base);
    }
    fn indirect_callsites(&self) -> Vec<CsId> {
        let mut css: Vec<CsId> = self.indirect_candidates.iter().map(|(cs, _, _)| *cs).collect();
        css.sort_by_key(|cs| cs.raw());
        css.dedup();
        css
    }
    fn resolve_ind_calls(&self, cs: CsId, fp_pts: &PointsTo, new_edges: &mut Vec<(CsId, NodeID)>) {
        for &(cand_cs, fn_obj, callee) in &self.indirect_candidates {
            if cand_cs == cs && fp_pts.contains(fn_obj) {
                new_edges.push((cs, callee));
            }
        }
    }
    fn resolve_cpp_ind_calls(&self, _cs: CsId, _vtbl_pts: &PointsTo, _new_edges: &mut Vec<(CsId, NodeID)>) {}
    fn icfg(&self) -> &dyn Icfg {
        &self.icfg
    }
}

pub fn edge(src: u32, dst: u32, kind: PagEdgeKind) -> PagEdge {
    PagEdge { src: NodeID::new(src), dst: NodeID::new(dst), kind }
}
