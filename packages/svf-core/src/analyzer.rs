//! Top-level driver bundle (§2 "SYSTEM OVERVIEW"): wires C3 (Andersen)
//! into C4 (MemSSA) into C5 (SVFG) into whichever of C6/C7 the config
//! selects, and owns every intermediate result so none of it has to
//! live behind a global. Teardown order follows the data's own
//! dependency chain in reverse (SVFG -> MemSSA -> Andersen -> PAG),
//! which falls out for free from field declaration order: Rust drops
//! struct fields top to bottom, so the SVFG-dependent fields are
//! listed first.

use std::fs::File;
use std::io::{BufReader, BufWriter};

use rustc_hash::{FxHashMap, FxHashSet};

use crate::alarm::AnalysisAlarm;
use crate::andersen::{Andersen, AndersenResult, PtsBackend};
use crate::bitset::PointsTo;
use crate::cg::ConstraintGraph;
use crate::config::AnalysisConfig;
use crate::errors::Result;
use crate::fs::{FlowSensitiveResult, FlowSensitiveSolver};
use crate::ids::{CsId, NodeID};
use crate::io::svfg_format;
use crate::memssa::{MemSsa, MemSsaBuilder, RegionPartition};
use crate::ports::frontend::{ClassHierarchyGraph, Icfg, PagEdgeKind, ProgramAssignmentGraph};
use crate::ports::ModRefAnalysis;
use crate::pts_store::PointsToStore;
use crate::stats::RunStats;
use crate::svfg::{Svfg, SvfgBuilder, SvfgOptimizer};
use crate::vfs::{VersionedFlowResult, VersionedFlowSolver};

/// Stand-in `ModRefAnalysis` used until a front end supplies a precise
/// one. Precise mod/ref is a bottom-up summary over the resolved call
/// graph, which doesn't exist yet when MemSSA needs it (MemSSA's own
/// construction is part of what establishes call reachability via the
/// on-the-fly resolution loop) — per `ports::modref`'s own doc comment,
/// that's the driver's job, not MemSSA's. This implementation is sound
/// but coarse: every call site is treated as reading and writing
/// everything Andersen ever pointed anything at.
struct ConservativeModRef {
    everything: PointsTo,
}

impl ModRefAnalysis for ConservativeModRef {
    fn mod_objects(&self, _cs: CsId) -> PointsTo {
        self.everything.clone()
    }
    fn ref_objects(&self, _cs: CsId) -> PointsTo {
        self.everything.clone()
    }
}

/// Analysis pipeline state. Every phase method requires the previous
/// phase to have run (panics with a named `.expect()` otherwise, since
/// running phases out of order is a driver bug, not a recoverable
/// condition); [`Analyzer::run`] drives the usual order for callers
/// who don't need to inspect intermediate results.
pub struct Analyzer {
    svfg: Option<Svfg>,
    mem_ssa: Option<MemSsa>,
    andersen: Option<AndersenResult>,
    pag: Box<dyn ProgramAssignmentGraph>,
    icfg: Box<dyn Icfg>,
    chg: Option<Box<dyn ClassHierarchyGraph>>,

    config: AnalysisConfig,
    alarm: AnalysisAlarm,

    /// Snapshot of every node's Andersen points-to set, taken once
    /// `run_andersen` finishes. `AndersenResult::pts_of` needs `&mut
    /// self` (union-find path compression in `rep`), but MemSSA/SVFG/
    /// C6/C7 each want their own independent read access via `FnMut`
    /// closures; the snapshot is immutable from here on; since it's
    /// read through `rep`-resolved output, further collapsing after
    /// this point would require invalidating it too, but nothing past
    /// this phase still ands/mutates the constraint graph.
    andersen_pts: FxHashMap<NodeID, PointsTo>,
    /// `PagEdgeKind::Call(cs)` edges name their function-pointer
    /// operand as `edge.src` (no dedicated accessor exists on
    /// `ProgramAssignmentGraph` for this); built once at construction.
    fp_operand_of: FxHashMap<CsId, NodeID>,
    /// Same convention for `PagEdgeKind::Ret(cs)` edges' vtable-pointer
    /// operand.
    vtbl_operand_of: FxHashMap<CsId, NodeID>,
    /// `(cs, callee)` pairs Andersen's own on-the-fly resolution has
    /// already counted, so repeated outer iterations don't recount a
    /// pair as new just because the callsite's points-to set grew
    /// again.
    resolved_callees: FxHashMap<CsId, FxHashSet<NodeID>>,

    fs_result: Option<FlowSensitiveResult>,
    vfs_result: Option<VersionedFlowResult>,

    run_stats: RunStats,
}

impl Analyzer {
    pub fn new(
        pag: Box<dyn ProgramAssignmentGraph>,
        icfg: Box<dyn Icfg>,
        chg: Option<Box<dyn ClassHierarchyGraph>>,
        config: AnalysisConfig,
    ) -> Result<Self> {
        config.validate()?;
        let (fp_operand_of, vtbl_operand_of) = operand_maps(pag.as_ref());
        let alarm = AnalysisAlarm::from_secs(config.fs_time_limit_secs);
        Ok(Self {
            svfg: None,
            mem_ssa: None,
            andersen: None,
            pag,
            icfg,
            chg,
            config,
            alarm,
            andersen_pts: FxHashMap::default(),
            fp_operand_of,
            vtbl_operand_of,
            resolved_callees: FxHashMap::default(),
            fs_result: None,
            vfs_result: None,
            run_stats: RunStats::default(),
        })
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn andersen_result(&self) -> Option<&AndersenResult> {
        self.andersen.as_ref()
    }

    pub fn mem_ssa(&self) -> Option<&MemSsa> {
        self.mem_ssa.as_ref()
    }

    pub fn svfg(&self) -> Option<&Svfg> {
        self.svfg.as_ref()
    }

    pub fn fs_result(&self) -> Option<&FlowSensitiveResult> {
        self.fs_result.as_ref()
    }

    pub fn vfs_result(&self) -> Option<&VersionedFlowResult> {
        self.vfs_result.as_ref()
    }

    /// Callees resolved for each indirect callsite during on-the-fly
    /// call-graph closure (§3.4): empty until `run_andersen` completes,
    /// and never shrinks afterward since resolution is monotone.
    pub fn resolved_callees(&self) -> &FxHashMap<CsId, FxHashSet<NodeID>> {
        &self.resolved_callees
    }

    /// Runs the whole pipeline in the usual order, picking C6 or C7
    /// per `config.use_versioned_flow`. Checked at each phase boundary
    /// against the analysis alarm (§5: no cancellation points inside a
    /// fixpoint loop itself — only between phases, same as each
    /// solver's own outer loop already does internally).
    pub fn run(&mut self) -> Result<()> {
        self.run_andersen();
        if self.alarm.fired() {
            self.run_stats.timed_out = true;
            return Ok(());
        }
        self.run_mem_ssa();
        if self.alarm.fired() {
            self.run_stats.timed_out = true;
            return Ok(());
        }
        self.run_svfg()?;
        if self.config.use_versioned_flow {
            self.run_versioned_flow_sensitive();
        } else {
            self.run_flow_sensitive();
        }
        Ok(())
    }

    /// Runs Andersen's solver (C3) to a fixpoint and materializes the
    /// points-to snapshot every later phase reads from.
    pub fn run_andersen(&mut self) -> &AndersenResult {
        let diff_pts = self.config.diff_pts;
        let max_field_limit = self.config.max_field_limit;

        let andersen = Andersen::new(self.pag.as_mut(), diff_pts);

        let fp_operand_of = &self.fp_operand_of;
        let vtbl_operand_of = &self.vtbl_operand_of;
        let chg = self.chg.as_deref();
        let resolved_callees = &mut self.resolved_callees;

        let mut result = andersen.solve(self.pag.as_mut(), max_field_limit, |graph, pts, pag| {
            resolve_on_the_fly(graph, pts, pag, fp_operand_of, vtbl_operand_of, chg, resolved_callees)
        });

        let node_ids: Vec<NodeID> = result.graph.nodes().map(|n| n.id).collect();
        let mut snapshot = FxHashMap::default();
        for n in node_ids {
            snapshot.insert(n, result.pts_of(n));
        }

        self.run_stats.andersen = result.stats.clone();
        self.andersen_pts = snapshot;
        self.andersen = Some(result);
        self.andersen.as_ref().unwrap()
    }

    /// Builds the region partition and MemSSA (C4) over the current
    /// Andersen snapshot, using a conservative mod/ref summary.
    pub fn run_mem_ssa(&mut self) -> &MemSsa {
        let mod_ref = ConservativeModRef {
            everything: union_all(&self.andersen_pts),
        };
        let icfg = self.icfg.as_ref();
        let regions = RegionPartition::build(
            self.config.mem_partition,
            icfg,
            &mod_ref,
            pts_closure(&self.andersen_pts),
        );
        let mem_ssa = MemSsaBuilder::new(icfg, &mod_ref, regions).build(pts_closure(&self.andersen_pts));

        self.run_stats.mem_ssa = mem_ssa.stats.clone();
        self.mem_ssa = Some(mem_ssa);
        self.mem_ssa.as_ref().unwrap()
    }

    /// Builds the SVFG (C5) over the PAG and the already-built MemSSA,
    /// or loads one from `read_svfg_path` instead of building it.
    /// Writes it back out to `write_svfg_path` afterward if set (§6).
    pub fn run_svfg(&mut self) -> Result<&Svfg> {
        let mem_ssa = self
            .mem_ssa
            .as_ref()
            .expect("run_mem_ssa must run before run_svfg");

        let svfg = match &self.config.read_svfg_path {
            Some(path) => {
                let file = File::open(path)?;
                let mut reader = BufReader::new(file);
                svfg_format::read_svfg(&mut reader)?
            }
            None => {
                let built = SvfgBuilder::new(self.pag.as_ref(), self.icfg.as_ref(), mem_ssa).build();
                if self.config.optimize_svfg {
                    SvfgOptimizer::new(&self.config).optimize(built)?
                } else {
                    built
                }
            }
        };

        if let Some(path) = &self.config.write_svfg_path {
            let file = File::create(path)?;
            let mut writer = BufWriter::new(file);
            svfg_format::write_svfg(&mut writer, &svfg, mem_ssa, self.icfg.as_ref())?;
        }

        self.run_stats.svfg = svfg.stats.clone();
        self.svfg = Some(svfg);
        Ok(self.svfg.as_ref().unwrap())
    }

    /// Runs the plain flow-sensitive solver (C6) over the built SVFG.
    /// Reachable directly (not just through [`Analyzer::run`]) for
    /// callers that specifically want the simpler reference engine
    /// rather than C7's versioned one.
    pub fn run_flow_sensitive(&mut self) -> &FlowSensitiveResult {
        let andersen_pts = pts_closure(&self.andersen_pts);
        let resolve_fp = fp_closure(&self.fp_operand_of, &self.andersen_pts);
        let resolve_vtbl = vtbl_closure(&self.vtbl_operand_of, &self.andersen_pts);
        let mem_ssa = self
            .mem_ssa
            .as_ref()
            .expect("run_mem_ssa must run before run_flow_sensitive");
        let icfg = self.icfg.as_ref();
        let chg = self.chg.as_deref();
        let config = &self.config;
        let svfg = self
            .svfg
            .as_mut()
            .expect("run_svfg must run before run_flow_sensitive");
        let pag = self.pag.as_mut();

        let solver = FlowSensitiveSolver::new(svfg, pag, icfg, mem_ssa, chg, config);
        let result = solver.solve(andersen_pts, resolve_fp, resolve_vtbl);

        self.run_stats.timed_out |= result.stats.timed_out;
        self.run_stats.flow_sensitive = Some(result.stats.clone());
        self.fs_result = Some(result);
        self.fs_result.as_ref().unwrap()
    }

    /// Runs the versioned flow-sensitive solver (C7): a drop-in
    /// replacement for C6 over the same SVFG, and the default engine
    /// `run` drives.
    pub fn run_versioned_flow_sensitive(&mut self) -> &VersionedFlowResult {
        let andersen_pts = pts_closure(&self.andersen_pts);
        let resolve_fp = fp_closure(&self.fp_operand_of, &self.andersen_pts);
        let resolve_vtbl = vtbl_closure(&self.vtbl_operand_of, &self.andersen_pts);
        let mem_ssa = self
            .mem_ssa
            .as_ref()
            .expect("run_mem_ssa must run before run_versioned_flow_sensitive");
        let icfg = self.icfg.as_ref();
        let chg = self.chg.as_deref();
        let config = &self.config;
        let svfg = self
            .svfg
            .as_mut()
            .expect("run_svfg must run before run_versioned_flow_sensitive");
        let pag = self.pag.as_mut();

        let solver = VersionedFlowSolver::new(svfg, pag, icfg, mem_ssa, chg, config);
        let result = solver.solve(andersen_pts, resolve_fp, resolve_vtbl);

        self.run_stats.timed_out |= result.stats.timed_out;
        self.run_stats.flow_sensitive = Some(result.stats.clone());
        self.vfs_result = Some(result);
        self.vfs_result.as_ref().unwrap()
    }

    /// Finalizes and returns the run's statistics. Consumes `self`: the
    /// SVFG, MemSSA, Andersen result, and PAG then drop in that order
    /// (§5), since they're declared on the struct in exactly that
    /// sequence.
    pub fn teardown(mut self) -> RunStats {
        if let Some(result) = &self.andersen {
            self.run_stats.andersen = result.stats.clone();
        }
        if let Some(svfg) = &self.svfg {
            self.run_stats.svfg = svfg.stats.clone();
        }
        if let Some(mem_ssa) = &self.mem_ssa {
            self.run_stats.mem_ssa = mem_ssa.stats.clone();
        }
        std::mem::take(&mut self.run_stats)
    }
}

fn operand_maps(pag: &dyn ProgramAssignmentGraph) -> (FxHashMap<CsId, NodeID>, FxHashMap<CsId, NodeID>) {
    let mut fp_operand_of = FxHashMap::default();
    let mut vtbl_operand_of = FxHashMap::default();
    for edge in pag.edges() {
        match edge.kind {
            PagEdgeKind::Call(cs) => {
                fp_operand_of.insert(cs, edge.src);
            }
            PagEdgeKind::Ret(cs) => {
                vtbl_operand_of.insert(cs, edge.src);
            }
            _ => {}
        }
    }
    (fp_operand_of, vtbl_operand_of)
}

fn union_all(snapshot: &FxHashMap<NodeID, PointsTo>) -> PointsTo {
    let mut all = PointsTo::new();
    for pts in snapshot.values() {
        all.union_with(pts);
    }
    all
}

fn pts_closure(snapshot: &FxHashMap<NodeID, PointsTo>) -> impl FnMut(NodeID) -> PointsTo + '_ {
    move |n| snapshot.get(&n).cloned().unwrap_or_default()
}

fn fp_closure<'a>(
    fp_operand_of: &'a FxHashMap<CsId, NodeID>,
    snapshot: &'a FxHashMap<NodeID, PointsTo>,
) -> impl FnMut(CsId) -> PointsTo + 'a {
    move |cs| fp_operand_of.get(&cs).and_then(|n| snapshot.get(n)).cloned().unwrap_or_default()
}

fn vtbl_closure<'a>(
    vtbl_operand_of: &'a FxHashMap<CsId, NodeID>,
    snapshot: &'a FxHashMap<NodeID, PointsTo>,
) -> impl FnMut(CsId) -> PointsTo + 'a {
    move |cs| vtbl_operand_of.get(&cs).and_then(|n| snapshot.get(n)).cloned().unwrap_or_default()
}

/// The closure `Andersen::solve` invokes once per outer iteration.
/// Resolves indirect-call/virtual-call candidates at the constraint-
/// graph level (the fp/vtbl operand's current rep's points-to set) and
/// caches which `(cs, callee)` pairs have already been counted;
/// returns how many were new, which is also Andersen's own fixpoint
/// condition for this closure's contribution. Unlike `callgraph::
/// update_call_graph`, this never mutates the constraint graph itself:
/// per `AndersenBase::new`'s own comment, Call/Ret PAG edges are never
/// translated into constraint-graph copy edges, so there is nothing
/// here for a newly resolved pair to wire up yet — that happens one
/// level up, once the SVFG exists (`callgraph.rs`, driven by C6/C7).
#[allow(clippy::too_many_arguments)]
fn resolve_on_the_fly(
    graph: &mut ConstraintGraph,
    pts: &mut PtsBackend,
    pag: &mut dyn ProgramAssignmentGraph,
    fp_operand_of: &FxHashMap<CsId, NodeID>,
    vtbl_operand_of: &FxHashMap<CsId, NodeID>,
    chg: Option<&dyn ClassHierarchyGraph>,
    resolved: &mut FxHashMap<CsId, FxHashSet<NodeID>>,
) -> usize {
    let mut new_pairs: Vec<(CsId, NodeID)> = Vec::new();

    for cs in pag.indirect_callsites() {
        if let Some(&fp) = fp_operand_of.get(&cs) {
            let rep = graph.rep(fp);
            let fp_pts = pts.get_pts(rep);
            pag.resolve_ind_calls(cs, &fp_pts, &mut new_pairs);
        }

        if let Some(chg) = chg {
            if chg.cs_has_vtbls_based_on_cha(cs) {
                if let Some(&vtbl) = vtbl_operand_of.get(&cs) {
                    let rep = graph.rep(vtbl);
                    let mut vtbl_pts = pts.get_pts(rep);
                    let reachable = chg.get_cs_vtbls_based_on_cha(cs);
                    let reachable_set = PointsTo::from_iter(reachable.iter().map(|n| n.raw()));
                    vtbl_pts.intersect_with(&reachable_set);
                    pag.resolve_cpp_ind_calls(cs, &vtbl_pts, &mut new_pairs);
                }
            }
        }
    }

    let mut added = 0;
    for (cs, callee) in new_pairs {
        if resolved.entry(cs).or_default().insert(callee) {
            added += 1;
        }
    }
    added
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::frontend::{PagEdge, StmtKind};
    use crate::svfg::SvfgNodeKind;

    const ENTRY: u32 = 0;
    const STORE_STMT: u32 = 10;
    const LOAD_STMT: u32 = 11;
    const OBJ: u32 = 20;
    const X: u32 = 21;
    const P: u32 = 22;
    const R: u32 = 23;

    struct StraightLineIcfg;
    impl Icfg for StraightLineIcfg {
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
            vec![NodeID::new(STORE_STMT), NodeID::new(LOAD_STMT)]
        }
        fn stmt_kind(&self, stmt: NodeID) -> StmtKind {
            match stmt.raw() {
                STORE_STMT => StmtKind::Store { ptr: NodeID::new(P), val: NodeID::new(X) },
                LOAD_STMT => StmtKind::Load { ptr: NodeID::new(P), res: NodeID::new(R) },
                _ => StmtKind::Other,
            }
        }
        fn function_of(&self, _node: NodeID) -> Option<NodeID> {
            Some(NodeID::new(ENTRY))
        }
    }

    struct StraightLinePag;
    impl ProgramAssignmentGraph for StraightLinePag {
        fn nodes(&self) -> Vec<NodeID> {
            [OBJ, X, P, R].into_iter().map(NodeID::new).collect()
        }
        fn edges(&self) -> Vec<PagEdge> {
            vec![
                PagEdge { src: NodeID::new(OBJ), dst: NodeID::new(X), kind: PagEdgeKind::Addr },
                PagEdge { src: NodeID::new(X), dst: NodeID::new(P), kind: PagEdgeKind::Copy },
            ]
        }
        fn get_base_obj(&self, n: NodeID) -> NodeID {
            n
        }
        fn get_all_fields_obj_vars(&self, _base: NodeID) -> PointsTo {
            PointsTo::new()
        }
        fn is_field_insensitive(&self, _n: NodeID) -> bool {
            false
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
        fn get_gep_obj_var(&mut self, base: NodeID, _offset: crate::ids::Offset) -> NodeID {
            base
        }
        fn get_fi_obj_var(&mut self, base: NodeID) -> NodeID {
            base
        }
        fn set_field_insensitive(&mut self, _base: NodeID) {}
        fn indirect_callsites(&self) -> Vec<CsId> {
            vec![]
        }
        fn resolve_ind_calls(&self, _cs: CsId, _fp_pts: &PointsTo, _new_edges: &mut Vec<(CsId, NodeID)>) {}
        fn resolve_cpp_ind_calls(&self, _cs: CsId, _vtbl_pts: &PointsTo, _new_edges: &mut Vec<(CsId, NodeID)>) {}
        fn icfg(&self) -> &dyn Icfg {
            &StraightLineIcfg
        }
    }

    #[test]
    fn default_pipeline_resolves_store_then_load_through_versioned_solver() {
        let config = AnalysisConfig { optimize_svfg: false, ..AnalysisConfig::default() };
        let mut analyzer =
            Analyzer::new(Box::new(StraightLinePag), Box::new(StraightLineIcfg), None, config).unwrap();

        analyzer.run().unwrap();

        let load_node = analyzer
            .svfg()
            .unwrap()
            .nodes
            .iter()
            .find(|n| matches!(n.kind, SvfgNodeKind::Load))
            .expect("load node")
            .id;
        let result = analyzer.vfs_result().expect("versioned flow-sensitive result");
        assert_eq!(result.store.get_tlv_pts(load_node).iter().collect::<Vec<_>>(), vec![OBJ]);

        let stats = analyzer.teardown();
        assert!(stats.andersen.outer_iterations >= 1);
        assert!(stats.flow_sensitive.is_some());
        assert!(!stats.timed_out);
    }

    #[test]
    fn plain_flow_sensitive_engine_is_directly_selectable() {
        let config = AnalysisConfig {
            optimize_svfg: false,
            use_versioned_flow: false,
            ..AnalysisConfig::default()
        };
        let mut analyzer =
            Analyzer::new(Box::new(StraightLinePag), Box::new(StraightLineIcfg), None, config).unwrap();

        analyzer.run_andersen();
        analyzer.run_mem_ssa();
        analyzer.run_svfg().unwrap();
        let result = analyzer.run_flow_sensitive();

        assert!(result.stats.strong_updates >= 1);
        assert!(analyzer.vfs_result().is_none());
    }

    #[test]
    fn rejects_invalid_config_before_building_anything() {
        let config = AnalysisConfig { max_field_limit: 0, detect_pwc: true, ..AnalysisConfig::default() };
        let err = Analyzer::new(Box::new(StraightLinePag), Box::new(StraightLineIcfg), None, config);
        assert!(err.is_err());
    }
}
