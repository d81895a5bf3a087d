//! `AndersenBase` builds the constraint graph and runs the plain
//! worklist; `Andersen` layers SCC collapsing and wave-diff
//! propagation on top, matching the class split in
//! `original_source/include/WPA/Andersen.h`.

use std::collections::VecDeque;
use std::time::Instant;

use rustc_hash::FxHashSet;

use crate::bitset::PointsTo;
use crate::cg::{ConstraintGraph, DirectKind, SccEdgeFlag};
use crate::ids::NodeID;
use crate::ports::frontend::{PagEdgeKind, ProgramAssignmentGraph};
use crate::pts_store::PointsToStore;
use crate::stats::AndersenStats;

use super::rules::{apply_gep_rules, apply_load_store_rules, init_addr_edges, propagate_copy};
use super::PtsBackend;

pub struct AndersenResult {
    pub graph: ConstraintGraph,
    pub pts: PtsBackend,
    pub stats: AndersenStats,
}

impl AndersenResult {
    /// Points-to set of `n`, resolved through its current SCC rep.
    pub fn pts_of(&mut self, n: NodeID) -> PointsTo {
        let rep = self.graph.rep(n);
        self.pts.get_pts(rep)
    }
}

/// Builds the constraint graph from PAG edges and exposes the plain
/// (non-wave) worklist solve.
pub struct AndersenBase {
    graph: ConstraintGraph,
    pts: PtsBackend,
    stats: AndersenStats,
}

impl AndersenBase {
    pub fn new(pag: &mut dyn ProgramAssignmentGraph, diff_pts: bool) -> Self {
        let mut graph = ConstraintGraph::new();
        for edge in pag.edges() {
            match edge.kind {
                PagEdgeKind::Addr => {
                    graph.add_addr_edge(edge.src, edge.dst);
                }
                PagEdgeKind::Copy => {
                    graph.add_direct_edge(edge.src, edge.dst, DirectKind::Copy);
                }
                PagEdgeKind::Gep(g) => {
                    graph.add_direct_edge(edge.src, edge.dst, DirectKind::Gep(g));
                }
                PagEdgeKind::Load => {
                    graph.add_load_edge(edge.src, edge.dst);
                }
                PagEdgeKind::Store => {
                    graph.add_store_edge(edge.src, edge.dst);
                }
                // Call/Ret PAG edges are resolved on the fly by the
                // shared call-graph module, not translated directly.
                PagEdgeKind::Call(_) | PagEdgeKind::Ret(_) => {}
            }
        }
        Self {
            graph,
            pts: PtsBackend::new(diff_pts),
            stats: AndersenStats::default(),
        }
    }

    pub fn graph(&self) -> &ConstraintGraph {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut ConstraintGraph {
        &mut self.graph
    }

    pub fn pts(&self) -> &PtsBackend {
        &self.pts
    }

    /// Plain FIFO worklist: no SCC collapsing, full points-to sets
    /// re-examined on each pop. Used when `diff_pts` is disabled or a
    /// caller just wants one non-wave pass (e.g. unit tests).
    pub fn solve_once(mut self, pag: &mut dyn ProgramAssignmentGraph) -> AndersenResult {
        init_addr_edges(&self.graph, &mut self.pts, &mut self.stats);

        let mut worklist: VecDeque<NodeID> = self
            .graph
            .nodes()
            .map(|n| n.id)
            .collect();
        let mut queued: FxHashSet<NodeID> = worklist.iter().copied().collect();

        while let Some(n) = worklist.pop_front() {
            queued.remove(&n);
            let rep = self.graph.rep(n);
            let curr = self.pts.get_pts(rep);

            let t0 = Instant::now();
            let gep_changed = apply_gep_rules(
                &mut self.graph,
                &mut self.pts,
                pag,
                rep,
                &curr,
                &mut self.stats,
            );
            self.stats.time_copy_gep += t0.elapsed();

            let t1 = Instant::now();
            let ls_changed =
                apply_load_store_rules(&mut self.graph, rep, &curr, &mut self.stats);
            self.stats.time_load_store += t1.elapsed();

            let t2 = Instant::now();
            let copy_changed =
                propagate_copy(&self.graph, &mut self.pts, rep, &curr, &mut self.stats);
            self.stats.time_copy_gep += t2.elapsed();

            if gep_changed || ls_changed || copy_changed {
                let dsts: Vec<NodeID> = self
                    .graph
                    .node(rep)
                    .map(|node| node.out_direct.iter().map(|(d, _)| *d).collect())
                    .unwrap_or_default();
                for dst in dsts.into_iter().chain(std::iter::once(rep)) {
                    if queued.insert(dst) {
                        worklist.push_back(dst);
                    }
                }
            }
            self.stats.outer_iterations += 1;
        }

        AndersenResult {
            graph: self.graph,
            pts: self.pts,
            stats: self.stats,
        }
    }
}

/// Wave-diff solver: SCC-collapses over copy edges each outer round,
/// processes reps in (reverse-)topological order, propagates
/// `diff(rep)` along copy edges.
pub struct Andersen {
    base: AndersenBase,
}

impl Andersen {
    pub fn new(pag: &mut dyn ProgramAssignmentGraph, diff_pts: bool) -> Self {
        Self {
            base: AndersenBase::new(pag, diff_pts),
        }
    }

    /// `update_call_graph` is invoked once per outer iteration to
    /// resolve indirect calls on the fly; it returns the number of new
    /// callee edges it added to `graph`/`pag`. Passed as a closure so
    /// the shared call-graph module has no dependency back onto this
    /// one (§4.6).
    pub fn solve(
        mut self,
        pag: &mut dyn ProgramAssignmentGraph,
        max_field_limit: u32,
        mut update_call_graph: impl FnMut(&mut ConstraintGraph, &mut PtsBackend, &mut dyn ProgramAssignmentGraph) -> usize,
    ) -> AndersenResult {
        init_addr_edges(&self.base.graph, &mut self.base.pts, &mut self.base.stats);

        loop {
            let t_scc = Instant::now();
            let sccs = self.base.graph.detect_and_collapse(SccEdgeFlag::Copy);
            self.base.stats.scc_detections += 1;
            self.base.stats.time_scc += t_scc.elapsed();

            for scc in &sccs {
                if scc.members.len() < 2 {
                    continue;
                }
                let rep = *scc.members.iter().min_by_key(|n| n.raw()).unwrap();
                for &member in &scc.members {
                    if member == rep {
                        continue;
                    }
                    let member_pts = self.base.pts.get_pts(member);
                    self.base.pts.union_pts(rep, &member_pts);
                    if let Some(diff_store) = self.base.pts.as_differential_mut() {
                        diff_store.update_propa_pts_map(member, rep);
                    }
                    self.base.pts.clear_pts(member);
                }
            }

            let mut changed_any = false;
            let order = self.processing_order();
            for rep in order {
                // Collapsing: a rep whose points-to set crosses the
                // configured field limit is folded field-insensitive
                // regardless of whether it sits on a PWC.
                if max_field_limit > 0
                    && !self.base.graph.is_field_insensitive(rep)
                    && self.base.pts.get_pts(rep).len() as u32 > max_field_limit
                {
                    self.base.graph.set_field_insensitive(rep);
                    pag.set_field_insensitive(rep);
                    self.base.stats.field_insensitive_widenings += 1;
                }

                let t_ls = Instant::now();
                let src_pts = self.base.pts.get_pts(rep);
                changed_any |= apply_load_store_rules(
                    &mut self.base.graph,
                    rep,
                    &src_pts,
                    &mut self.base.stats,
                );
                self.base.stats.time_load_store += t_ls.elapsed();

                let t_cg = Instant::now();
                changed_any |= apply_gep_rules(
                    &mut self.base.graph,
                    &mut self.base.pts,
                    pag,
                    rep,
                    &src_pts,
                    &mut self.base.stats,
                );

                let wave_src = match self.base.pts.as_differential_mut() {
                    Some(diff_store) => {
                        diff_store.compute_diff_pts(rep, &src_pts);
                        diff_store.get_diff_pts(rep)
                    }
                    None => src_pts.clone(),
                };
                changed_any |= propagate_copy(
                    &self.base.graph,
                    &mut self.base.pts,
                    rep,
                    &wave_src,
                    &mut self.base.stats,
                );
                self.base.stats.time_copy_gep += t_cg.elapsed();
            }

            let t_cg_update = Instant::now();
            let new_edges = update_call_graph(&mut self.base.graph, &mut self.base.pts, pag);
            self.base.stats.time_update_call_graph += t_cg_update.elapsed();

            self.base.stats.outer_iterations += 1;
            tracing::debug!(
                iteration = self.base.stats.outer_iterations,
                sccs = sccs.len(),
                new_edges,
                "wave-diff round"
            );
            if !changed_any && new_edges == 0 {
                break;
            }
        }

        AndersenResult {
            graph: self.base.graph,
            pts: self.base.pts,
            stats: self.base.stats,
        }
    }

    /// Reverse topological order over the current SCC reps, following
    /// copy edges: a DFS postorder naturally lists sinks (nodes with
    /// no unvisited successors left) before their ancestors, which is
    /// exactly reverse-topological under the source-before-sink
    /// convention.
    fn processing_order(&mut self) -> Vec<NodeID> {
        let reps: Vec<NodeID> = {
            let mut seen = FxHashSet::default();
            let mut out = Vec::new();
            for node in self.base.graph.nodes() {
                let rep = self.base.graph.rep_readonly(node.id);
                if seen.insert(rep) {
                    out.push(rep);
                }
            }
            out
        };

        let mut visited: FxHashSet<NodeID> = FxHashSet::default();
        let mut order = Vec::with_capacity(reps.len());
        let mut stack: Vec<(NodeID, usize)> = Vec::new();

        for &start in &reps {
            if visited.contains(&start) {
                continue;
            }
            stack.push((start, 0));
            visited.insert(start);
            while let Some(&mut (node, ref mut idx)) = stack.last_mut() {
                let succs: Vec<NodeID> = self
                    .base
                    .graph
                    .node(node)
                    .map(|n| {
                        n.out_direct
                            .iter()
                            .filter(|(_, k)| !k.is_gep())
                            .map(|(d, _)| *d)
                            .collect()
                    })
                    .unwrap_or_default();
                if *idx < succs.len() {
                    let next = succs[*idx];
                    *idx += 1;
                    if visited.insert(next) {
                        stack.push((next, 0));
                    }
                } else {
                    order.push(node);
                    stack.pop();
                }
            }
        }
        order
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitset::PointsTo as Pts;
    use crate::ids::{CsId, Offset};
    use crate::ports::frontend::{Icfg, PagEdge};
    use rustc_hash::FxHashSet as HSet;

    /// Minimal in-memory PAG for unit tests: `x = &o; y = x; z = *y`.
    struct TestPag {
        edges: Vec<PagEdge>,
        field_insensitive: HSet<NodeID>,
        next_id: u32,
    }

    impl TestPag {
        fn new(edges: Vec<PagEdge>, next_id: u32) -> Self {
            Self {
                edges,
                field_insensitive: HSet::default(),
                next_id,
            }
        }
    }

    struct NoIcfg;
    impl Icfg for NoIcfg {
        fn functions(&self) -> Vec<NodeID> {
            Vec::new()
        }
        fn entry_block(&self, func: NodeID) -> NodeID {
            func
        }
        fn blocks(&self, _func: NodeID) -> Vec<NodeID> {
            Vec::new()
        }
        fn successors(&self, _block: NodeID) -> Vec<NodeID> {
            Vec::new()
        }
        fn predecessors(&self, _block: NodeID) -> Vec<NodeID> {
            Vec::new()
        }
        fn has_reachable_return(&self, _func: NodeID) -> bool {
            false
        }
        fn statements(&self, _block: NodeID) -> Vec<NodeID> {
            Vec::new()
        }
        fn stmt_kind(&self, _stmt: NodeID) -> crate::ports::frontend::StmtKind {
            crate::ports::frontend::StmtKind::Other
        }
        fn function_of(&self, _node: NodeID) -> Option<NodeID> {
            None
        }
    }

    impl ProgramAssignmentGraph for TestPag {
        fn nodes(&self) -> Vec<NodeID> {
            let mut s = HSet::default();
            for e in &self.edges {
                s.insert(e.src);
                s.insert(e.dst);
            }
            s.into_iter().collect()
        }
        fn edges(&self) -> Vec<PagEdge> {
            self.edges.clone()
        }
        fn get_base_obj(&self, n: NodeID) -> NodeID {
            n
        }
        fn get_all_fields_obj_vars(&self, _base: NodeID) -> Pts {
            Pts::new()
        }
        fn is_field_insensitive(&self, n: NodeID) -> bool {
            self.field_insensitive.contains(&n)
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
        fn get_gep_obj_var(&mut self, base: NodeID, off: Offset) -> NodeID {
            NodeID::new(self.next_id + base.raw() * 100 + off)
        }
        fn get_fi_obj_var(&mut self, base: NodeID) -> NodeID {
            base
        }
        fn set_field_insensitive(&mut self, base: NodeID) {
            self.field_insensitive.insert(base);
        }
        fn indirect_callsites(&self) -> Vec<CsId> {
            Vec::new()
        }
        fn resolve_ind_calls(&self, _cs: CsId, _fp_pts: &Pts, _new_edges: &mut Vec<(CsId, NodeID)>) {}
        fn resolve_cpp_ind_calls(
            &self,
            _cs: CsId,
            _vtbl_pts: &Pts,
            _new_edges: &mut Vec<(CsId, NodeID)>,
        ) {
        }
        fn icfg(&self) -> &dyn Icfg {
            &NoIcfg
        }
    }

    fn n(id: u32) -> NodeID {
        NodeID::new(id)
    }

    #[test]
    fn solve_once_propagates_copy_and_load() {
        // o = object 0; x (1) = &o; y (2) = x; z (3) = *y
        let edges = vec![
            PagEdge {
                src: n(0),
                dst: n(1),
                kind: PagEdgeKind::Addr,
            },
            PagEdge {
                src: n(1),
                dst: n(2),
                kind: PagEdgeKind::Copy,
            },
            PagEdge {
                src: n(2),
                dst: n(3),
                kind: PagEdgeKind::Load,
            },
        ];
        let mut pag = TestPag::new(edges, 100);
        let base = AndersenBase::new(&mut pag, false);
        let mut result = base.solve_once(&mut pag);

        assert_eq!(result.pts_of(n(1)).iter().collect::<Vec<_>>(), vec![0]);
        assert_eq!(result.pts_of(n(2)).iter().collect::<Vec<_>>(), vec![0]);
    }

    #[test]
    fn wave_diff_solve_matches_plain_worklist() {
        let build_edges = || {
            vec![
                PagEdge {
                    src: n(0),
                    dst: n(1),
                    kind: PagEdgeKind::Addr,
                },
                PagEdge {
                    src: n(1),
                    dst: n(2),
                    kind: PagEdgeKind::Copy,
                },
                PagEdge {
                    src: n(2),
                    dst: n(3),
                    kind: PagEdgeKind::Load,
                },
            ]
        };

        let mut pag_a = TestPag::new(build_edges(), 100);
        let base = AndersenBase::new(&mut pag_a, false);
        let mut plain = base.solve_once(&mut pag_a);

        let mut pag_b = TestPag::new(build_edges(), 100);
        let andersen = Andersen::new(&mut pag_b, true);
        let mut wave = andersen.solve(&mut pag_b, 512, |_, _, _| 0);

        assert_eq!(
            plain.pts_of(n(2)).iter().collect::<Vec<_>>(),
            wave.pts_of(n(2)).iter().collect::<Vec<_>>()
        );
        assert_eq!(
            plain.pts_of(n(3)).iter().collect::<Vec<_>>(),
            wave.pts_of(n(3)).iter().collect::<Vec<_>>()
        );
    }

    #[test]
    fn copy_cycle_collapses_to_single_rep_with_shared_pts() {
        let edges = vec![
            PagEdge {
                src: n(0),
                dst: n(1),
                kind: PagEdgeKind::Addr,
            },
            PagEdge {
                src: n(1),
                dst: n(2),
                kind: PagEdgeKind::Copy,
            },
            PagEdge {
                src: n(2),
                dst: n(1),
                kind: PagEdgeKind::Copy,
            },
        ];
        let mut pag = TestPag::new(edges, 100);
        let andersen = Andersen::new(&mut pag, true);
        let mut result = andersen.solve(&mut pag, 512, |_, _, _| 0);

        assert_eq!(result.graph.rep(n(1)), result.graph.rep(n(2)));
        assert_eq!(result.pts_of(n(2)).iter().collect::<Vec<_>>(), vec![0]);
    }
}
