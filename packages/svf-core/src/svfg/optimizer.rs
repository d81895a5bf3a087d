//! SVFG optimizer (§4.5 "Optimizer"): coalesces `FormalParm`/`ActualRet`
//! into PHI nodes, optionally removes `ActualIn`/`FormalOut` nodes by
//! rewiring around them, bypasses `MSSAPHI` nodes with no semantic
//! role left, and sweeps away nodes rule 6 calls removable.
//!
//! Works over an adjacency-indexed mutable copy of the raw graph
//! (`edges`/`by_src`/`by_dst`, with `None` standing in for a removed
//! slot) since the raw `Svfg`'s flat edge `Vec` has no fast per-node
//! lookup; the optimized graph is compacted back to dense ids at the
//! end, same two-phase shape as `cg::graph::ConstraintGraph::collapse`.

use rustc_hash::FxHashMap;

use super::builder::Svfg;
use super::node::{IndirectVfKind, SvfgEdge, SvfgNode, SvfgNodeKind, VfEdgeKind};
use crate::config::{AnalysisConfig, SelfCyclePolicy};
use crate::errors::{Result, SvfError};
use crate::ids::NodeID;

struct MutSvfg {
    nodes: Vec<Option<SvfgNode>>,
    edges: Vec<Option<SvfgEdge>>,
    by_src: FxHashMap<NodeID, Vec<usize>>,
    by_dst: FxHashMap<NodeID, Vec<usize>>,
}

impl MutSvfg {
    fn from_raw(svfg: Svfg) -> Self {
        let mut by_src: FxHashMap<NodeID, Vec<usize>> = FxHashMap::default();
        let mut by_dst: FxHashMap<NodeID, Vec<usize>> = FxHashMap::default();
        for (i, e) in svfg.edges.iter().enumerate() {
            by_src.entry(e.src).or_default().push(i);
            by_dst.entry(e.dst).or_default().push(i);
        }
        MutSvfg {
            nodes: svfg.nodes.into_iter().map(Some).collect(),
            edges: svfg.edges.into_iter().map(Some).collect(),
            by_src,
            by_dst,
        }
    }

    fn alloc_node(&mut self, icfg_loc: NodeID, kind: SvfgNodeKind) -> NodeID {
        let id = NodeID::new(self.nodes.len() as u32);
        self.nodes.push(Some(SvfgNode { id, icfg_loc, kind }));
        id
    }

    fn add_edge(&mut self, src: NodeID, dst: NodeID, kind: VfEdgeKind, label: crate::bitset::PointsTo) {
        let idx = self.edges.len();
        self.edges.push(Some(SvfgEdge { src, dst, kind, label }));
        self.by_src.entry(src).or_default().push(idx);
        self.by_dst.entry(dst).or_default().push(idx);
    }

    fn in_edges(&self, n: NodeID) -> Vec<usize> {
        self.by_dst
            .get(&n)
            .into_iter()
            .flatten()
            .copied()
            .filter(|&i| self.edges[i].is_some())
            .collect()
    }

    fn out_edges(&self, n: NodeID) -> Vec<usize> {
        self.by_src
            .get(&n)
            .into_iter()
            .flatten()
            .copied()
            .filter(|&i| self.edges[i].is_some())
            .collect()
    }

    fn retarget_dst(&mut self, edge_idx: usize, new_dst: NodeID) {
        if let Some(e) = &mut self.edges[edge_idx] {
            e.dst = new_dst;
            self.by_dst.entry(new_dst).or_default().push(edge_idx);
        }
    }

    fn retarget_src(&mut self, edge_idx: usize, new_src: NodeID) {
        if let Some(e) = &mut self.edges[edge_idx] {
            e.src = new_src;
            self.by_src.entry(new_src).or_default().push(edge_idx);
        }
    }

    fn remove_node(&mut self, n: NodeID) {
        self.nodes[n.index()] = None;
    }

    fn remove_edge(&mut self, idx: usize) {
        self.edges[idx] = None;
    }

    fn is_removed(&self, n: NodeID) -> bool {
        self.nodes[n.index()].is_none()
    }

    /// Compacts to dense ids, dropping removed nodes/edges and any
    /// edge whose endpoint no longer exists.
    fn compact(self) -> Svfg {
        let mut remap: FxHashMap<NodeID, NodeID> = FxHashMap::default();
        let mut nodes = Vec::new();
        for n in self.nodes.into_iter().flatten() {
            let new_id = NodeID::new(nodes.len() as u32);
            remap.insert(n.id, new_id);
            nodes.push(SvfgNode { id: new_id, ..n });
        }
        let mut edges = Vec::new();
        for e in self.edges.into_iter().flatten() {
            if let (Some(&src), Some(&dst)) = (remap.get(&e.src), remap.get(&e.dst)) {
                edges.push(SvfgEdge { src, dst, ..e });
            }
        }
        let direct_edges = edges.iter().filter(|e| matches!(e.kind, VfEdgeKind::Direct(_))).count();
        let indirect_edges = edges.len() - direct_edges;
        Svfg {
            nodes,
            edges,
            stats: crate::stats::SvfgStats {
                nodes: 0, // overwritten by caller with before/after deltas
                direct_edges,
                indirect_edges,
                nodes_removed_by_optimizer: 0,
                mssa_phis_bypassed: 0,
            },
        }
    }
}

pub struct SvfgOptimizer<'a> {
    config: &'a AnalysisConfig,
}

impl<'a> SvfgOptimizer<'a> {
    pub fn new(config: &'a AnalysisConfig) -> Self {
        Self { config }
    }

    pub fn optimize(&self, svfg: Svfg) -> Result<Svfg> {
        if !self.config.optimize_svfg {
            return Ok(svfg);
        }
        let nodes_before = svfg.nodes.len();
        let mut g = MutSvfg::from_raw(svfg);

        self.coalesce_formal_parms(&mut g);
        self.coalesce_actual_rets(&mut g);
        if !self.config.keep_actual_out_formal_in {
            self.remove_actual_in_formal_out(&mut g)?;
        }
        let mut mssa_phis_bypassed = 0usize;
        self.bypass_mssa_phis(&mut g, &mut mssa_phis_bypassed)?;
        self.sweep_removable(&mut g);

        let nodes_after_live = g.nodes.iter().filter(|n| n.is_some()).count();
        let mut out = g.compact();
        out.stats.nodes = nodes_after_live;
        out.stats.nodes_removed_by_optimizer = nodes_before.saturating_sub(nodes_after_live);
        out.stats.mssa_phis_bypassed = mssa_phis_bypassed;
        Ok(out)
    }

    /// Rule 1: a `FormalParm` becomes a PHI over its `ActualParm`
    /// sources; every pre-existing edge (in or out) is rewired to the
    /// PHI's id, keeping its own kind.
    fn coalesce_formal_parms(&self, g: &mut MutSvfg) {
        let targets: Vec<NodeID> = g
            .nodes
            .iter()
            .flatten()
            .filter(|n| matches!(n.kind, SvfgNodeKind::FormalParm { .. }))
            .map(|n| n.id)
            .collect();
        for formal in targets {
            let icfg_loc = g.nodes[formal.index()].as_ref().unwrap().icfg_loc;
            let phi = g.alloc_node(icfg_loc, SvfgNodeKind::InterPhi);
            for idx in g.in_edges(formal) {
                g.retarget_dst(idx, phi);
            }
            for idx in g.out_edges(formal) {
                g.retarget_src(idx, phi);
            }
            g.remove_node(formal);
        }
    }

    /// Rule 2: symmetric, `ActualRet` becomes a PHI fed by `FormalRet`s.
    fn coalesce_actual_rets(&self, g: &mut MutSvfg) {
        let targets: Vec<NodeID> = g
            .nodes
            .iter()
            .flatten()
            .filter(|n| matches!(n.kind, SvfgNodeKind::ActualRet { .. }))
            .map(|n| n.id)
            .collect();
        for actual in targets {
            let icfg_loc = g.nodes[actual.index()].as_ref().unwrap().icfg_loc;
            let phi = g.alloc_node(icfg_loc, SvfgNodeKind::InterPhi);
            for idx in g.in_edges(actual) {
                g.retarget_dst(idx, phi);
            }
            for idx in g.out_edges(actual) {
                g.retarget_src(idx, phi);
            }
            g.remove_node(actual);
        }
    }

    /// Rule 3: when `keepActualOutFormalIn` is false, an `ActualIn`/
    /// `FormalOut` is removed after recording its sole incoming def and
    /// retargeting every successor directly to it; intersecting labels
    /// get a fresh call/ret-indirect edge carrying the intersection.
    fn remove_actual_in_formal_out(&self, g: &mut MutSvfg) -> Result<()> {
        let targets: Vec<NodeID> = g
            .nodes
            .iter()
            .flatten()
            .filter(|n| matches!(n.kind, SvfgNodeKind::ActualIn { .. } | SvfgNodeKind::FormalOut { .. }))
            .map(|n| n.id)
            .collect();
        for node in targets {
            let in_idxs = g.in_edges(node);
            let out_idxs = g.out_edges(node);
            let Some(&def_idx) = in_idxs.first() else { continue };
            let def_src = g.edges[def_idx].as_ref().unwrap().src;

            for &out_idx in &out_idxs {
                let out_edge = g.edges[out_idx].as_ref().unwrap().clone();
                let def_edge = g.edges[def_idx].as_ref().unwrap().clone();
                if !def_edge.label.intersects(&out_edge.label) {
                    continue;
                }
                let label = def_edge.label.intersection(&out_edge.label);
                let kind = rewired_inter_kind(&def_edge.kind, &out_edge.kind)?;
                g.add_edge(def_src, out_edge.dst, kind, label);
            }
            for idx in in_idxs.into_iter().chain(out_idxs) {
                g.remove_edge(idx);
            }
            g.remove_node(node);
        }
        Ok(())
    }

    /// Rules 4/5: bypass an `MSSAPHI` with both incoming and outgoing
    /// edges, honoring the tri-state self-cycle policy first.
    fn bypass_mssa_phis(&self, g: &mut MutSvfg, bypassed: &mut usize) -> Result<()> {
        let targets: Vec<NodeID> = g
            .nodes
            .iter()
            .flatten()
            .filter(|n| matches!(n.kind, SvfgNodeKind::MSSAPhi { .. }))
            .map(|n| n.id)
            .collect();
        for phi in targets {
            let mut in_idxs = g.in_edges(phi);
            let mut out_idxs = g.out_edges(phi);

            // Self-loops: both endpoints are this node.
            let (self_in, real_in): (Vec<usize>, Vec<usize>) =
                in_idxs.drain(..).partition(|&i| g.edges[i].as_ref().unwrap().src == phi);
            let (self_out, real_out): (Vec<usize>, Vec<usize>) =
                out_idxs.drain(..).partition(|&i| g.edges[i].as_ref().unwrap().dst == phi);
            in_idxs = real_in;
            out_idxs = real_out;

            let keep_self = match self.config.self_cycle_policy {
                SelfCyclePolicy::All => true,
                SelfCyclePolicy::None => false,
                SelfCyclePolicy::Context => false, // re-checked per-edge below
            };
            for idx in self_in.into_iter().chain(self_out) {
                let is_context = g.edges[idx].as_ref().unwrap().kind.is_inter();
                let keep = match self.config.self_cycle_policy {
                    SelfCyclePolicy::All => true,
                    SelfCyclePolicy::None => false,
                    SelfCyclePolicy::Context => is_context,
                };
                if !(keep_self || keep) {
                    g.remove_edge(idx);
                }
            }

            if in_idxs.is_empty() || out_idxs.is_empty() {
                continue; // no semantic role left to bypass — leave as-is
            }

            for &pi in &in_idxs {
                let pred = g.edges[pi].as_ref().unwrap().clone();
                for &si in &out_idxs {
                    let succ = g.edges[si].as_ref().unwrap().clone();
                    if !pred.label.intersects(&succ.label) {
                        continue;
                    }
                    let label = pred.label.intersection(&succ.label);
                    let kind = rewired_inter_kind(&pred.kind, &succ.kind)?;
                    g.add_edge(pred.src, succ.dst, kind, label);
                }
            }
            for idx in in_idxs.into_iter().chain(out_idxs) {
                g.remove_edge(idx);
            }
            g.remove_node(phi);
            *bypassed += 1;
        }
        Ok(())
    }

    /// Rule 6: drop any eligible node left with no remaining edges.
    /// `ActualParm`/`FormalParm`/`ActualRet`/`FormalRet` are always
    /// eligible (rules 1/2 should have orphaned every one of them);
    /// `ActualIn`/`FormalOut` are eligible only when
    /// `keepActualOutFormalIn` is false (rule 3 already removed the
    /// ones it touched, this just catches leftovers with no edges at
    /// all, e.g. an unreferenced `ActualIn` at a direct call).
    fn sweep_removable(&self, g: &mut MutSvfg) {
        let candidates: Vec<NodeID> = g
            .nodes
            .iter()
            .flatten()
            .filter(|n| {
                let eligible = match n.kind {
                    SvfgNodeKind::ActualParm { .. }
                    | SvfgNodeKind::FormalParm { .. }
                    | SvfgNodeKind::ActualRet { .. }
                    | SvfgNodeKind::FormalRet { .. } => true,
                    SvfgNodeKind::ActualIn { .. } | SvfgNodeKind::FormalOut { .. } => {
                        !self.config.keep_actual_out_formal_in
                    }
                    _ => false,
                };
                eligible
            })
            .map(|n| n.id)
            .collect();
        for n in candidates {
            if g.is_removed(n) {
                continue;
            }
            if g.in_edges(n).is_empty() && g.out_edges(n).is_empty() {
                g.remove_node(n);
            }
        }
    }
}

/// Rule 4's call-site id for a rewired bypass/removal edge comes from
/// whichever of the two surviving edges is inter-procedural — the
/// optimizer rejects a pair where both are (ambiguous which call site
/// the new edge should carry).
fn rewired_inter_kind(a: &VfEdgeKind, b: &VfEdgeKind) -> Result<VfEdgeKind> {
    match (a.is_inter(), b.is_inter()) {
        (true, true) => Err(SvfError::invariant(
            "svfg optimizer bypass: both edges of a rewired pair are inter-procedural",
        )),
        (true, false) => Ok(*a),
        (false, true) => Ok(*b),
        (false, false) => Ok(VfEdgeKind::Indirect(IndirectVfKind::IntraIndirect)),
    }
}
