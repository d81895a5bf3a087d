//! Shared on-the-fly call-graph resolution used by the flow-sensitive
//! solver (C6) and its versioned variant (C7): turning a newly
//! resolved `(cs, callee)` pair into new SVFG edges
//! (`connectCallerAndCallee`), and the indirect-callsite/virtual-call
//! resolution loop that feeds it (§4.6 "on-the-fly call graph").
//!
//! Andersen (C3) resolves indirect calls too, but at the constraint-
//! graph level through its own `update_call_graph` closure parameter
//! (`andersen::solver::Andersen::solve`) — that resolution is scoped
//! to constraint-graph copy edges the front end already knows how to
//! add, and predates this module. This one operates one level up, on
//! an already-built `Svfg`.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::bitset::PointsTo;
use crate::ids::{CsId, MemRegionId, NodeID};
use crate::memssa::MemSsa;
use crate::ports::frontend::{ClassHierarchyGraph, ProgramAssignmentGraph};
use crate::svfg::{DirectVfKind, IndirectVfKind, Svfg, SvfgEdge, SvfgNodeKind, VfEdgeKind};

/// Tracks `(cs, callee)` pairs already wired into the SVFG, so repeated
/// outer iterations don't re-add the same edge as a callsite's
/// points-to set keeps growing monotonically.
#[derive(Debug, Default)]
pub struct CallGraphCache {
    resolved: FxHashMap<CsId, FxHashSet<NodeID>>,
}

impl CallGraphCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn mark(&mut self, cs: CsId, callee: NodeID) -> bool {
        self.resolved.entry(cs).or_default().insert(callee)
    }

    pub fn resolved_callees(&self, cs: CsId) -> FxHashSet<NodeID> {
        self.resolved.get(&cs).cloned().unwrap_or_default()
    }
}

/// Runs `pag`'s indirect-call and C++ virtual-call resolution for
/// every indirect callsite, wires any newly discovered `(cs, callee)`
/// pair into `svfg` via [`connect_caller_and_callee`], and returns how
/// many were new.
pub fn update_call_graph(
    svfg: &mut Svfg,
    mem_ssa: &MemSsa,
    pag: &dyn ProgramAssignmentGraph,
    chg: Option<&dyn ClassHierarchyGraph>,
    cache: &mut CallGraphCache,
    mut fp_pts_of: impl FnMut(CsId) -> PointsTo,
    mut vtbl_pts_of: impl FnMut(CsId) -> PointsTo,
) -> usize {
    let mut new_pairs: Vec<(CsId, NodeID)> = Vec::new();
    for cs in pag.indirect_callsites() {
        let fp_pts = fp_pts_of(cs);
        pag.resolve_ind_calls(cs, &fp_pts, &mut new_pairs);

        if let Some(chg) = chg {
            if chg.cs_has_vtbls_based_on_cha(cs) {
                let reachable = chg.get_cs_vtbls_based_on_cha(cs);
                let reachable_set = PointsTo::from_iter(reachable.iter().map(|n| n.raw()));
                let mut vtbl_pts = vtbl_pts_of(cs);
                vtbl_pts.intersect_with(&reachable_set);
                pag.resolve_cpp_ind_calls(cs, &vtbl_pts, &mut new_pairs);
            }
        }
    }

    let mut added = 0;
    for (cs, callee) in new_pairs {
        if cache.mark(cs, callee) {
            connect_caller_and_callee(svfg, mem_ssa, cs, callee);
            added += 1;
        }
    }
    if added > 0 {
        tracing::debug!(added, "call graph refinement resolved new indirect edges");
    }
    added
}

/// Wires one newly resolved `(cs, callee)` pair into an already-built
/// SVFG: direct parameter/return edges by positional order (the
/// port's `SvfgNodeKind::ActualParm`/`FormalParm` carry no explicit
/// ordinal, so ascending node-id order — the order the builder
/// allocated them in, which follows argument order for a front end
/// emitting PAG edges argument by argument — stands in for it), and
/// indirect actual-in/formal-in, formal-out/actual-out edges per
/// matching memory region (§4.5 rules 3/4, run here instead of at
/// build time since the callee wasn't known yet).
pub fn connect_caller_and_callee(svfg: &mut Svfg, mem_ssa: &MemSsa, cs: CsId, callee: NodeID) {
    let actual_parms = nodes_for(svfg, |k| matches!(k, SvfgNodeKind::ActualParm { cs: c } if *c == cs));
    let formal_parms = nodes_for(svfg, |k| matches!(k, SvfgNodeKind::FormalParm { func } if *func == callee));
    let mut new_edges = Vec::new();
    for (&a, &f) in actual_parms.iter().zip(formal_parms.iter()) {
        new_edges.push(SvfgEdge {
            src: a,
            dst: f,
            kind: VfEdgeKind::Direct(DirectVfKind::CallDirect(cs)),
            label: PointsTo::new(),
        });
    }

    let formal_rets = nodes_for(svfg, |k| matches!(k, SvfgNodeKind::FormalRet { func } if *func == callee));
    let actual_rets = nodes_for(svfg, |k| matches!(k, SvfgNodeKind::ActualRet { cs: c } if *c == cs));
    for (&fr, &ar) in formal_rets.iter().zip(actual_rets.iter()) {
        new_edges.push(SvfgEdge {
            src: fr,
            dst: ar,
            kind: VfEdgeKind::Direct(DirectVfKind::RetDirect(cs)),
            label: PointsTo::new(),
        });
    }

    let actual_ins = regioned_nodes(svfg, mem_ssa, |k| match k {
        SvfgNodeKind::ActualIn { cs: c, mrver } if *c == cs => Some(*mrver),
        _ => None,
    });
    let formal_ins = regioned_nodes(svfg, mem_ssa, |k| match k {
        SvfgNodeKind::FormalIn { func, mrver } if *func == callee => Some(*mrver),
        _ => None,
    });
    for &(region, actual_in) in &actual_ins {
        if let Some(&(_, formal_in)) = formal_ins.iter().find(|(r, _)| *r == region) {
            let label = mem_ssa.regions.region(region).objects.clone();
            new_edges.push(SvfgEdge {
                src: actual_in,
                dst: formal_in,
                kind: VfEdgeKind::Indirect(IndirectVfKind::CallIndirect(cs)),
                label,
            });
        }
    }

    let formal_outs = regioned_nodes(svfg, mem_ssa, |k| match k {
        SvfgNodeKind::FormalOut { func, mrver } if *func == callee => Some(*mrver),
        _ => None,
    });
    let actual_outs = regioned_nodes(svfg, mem_ssa, |k| match k {
        SvfgNodeKind::ActualOut { cs: c, mrver } if *c == cs => Some(*mrver),
        _ => None,
    });
    for &(region, formal_out) in &formal_outs {
        if let Some(&(_, actual_out)) = actual_outs.iter().find(|(r, _)| *r == region) {
            let label = mem_ssa.regions.region(region).objects.clone();
            new_edges.push(SvfgEdge {
                src: formal_out,
                dst: actual_out,
                kind: VfEdgeKind::Indirect(IndirectVfKind::RetIndirect(cs)),
                label,
            });
        }
    }

    svfg.edges.extend(new_edges);
}

fn nodes_for(svfg: &Svfg, pred: impl Fn(&SvfgNodeKind) -> bool) -> Vec<NodeID> {
    let mut out: Vec<NodeID> = svfg.nodes.iter().filter(|n| pred(&n.kind)).map(|n| n.id).collect();
    out.sort_by_key(|n| n.raw());
    out
}

fn regioned_nodes(
    svfg: &Svfg,
    mem_ssa: &MemSsa,
    pred: impl Fn(&SvfgNodeKind) -> Option<crate::ids::MRVerId>,
) -> Vec<(MemRegionId, NodeID)> {
    svfg.nodes
        .iter()
        .filter_map(|n| pred(&n.kind).map(|mrver| (mem_ssa.mrver(mrver).region, n.id)))
        .collect()
}
