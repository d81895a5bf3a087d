//! Meld pre-labelling, meld-to-version mapping, version-reliance
//! construction, and the versioned load/store worklist itself (§4.7).
//!
//! Top-level (non-memory) value propagation — `Addr`/`Copy`/`Gep`/
//! `Phi`/parameter-passing nodes — is identical to the plain
//! flow-sensitive solver's; only `Load`/`Store` differ, reading and
//! writing `(object, version)` pairs instead of `(location, object)`
//! pairs. The two solvers are kept as separate types rather than
//! sharing a base: their memory models diverge enough (a location-
//! indexed `DataFlowPtsStore` vs. an object-indexed `VersionedPtsStore`
//! with a reliance graph on the side) that a shared trait would mostly
//! exist to paper over that difference.

use std::collections::VecDeque;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::alarm::AnalysisAlarm;
use crate::bitset::PointsTo;
use crate::callgraph::{self, CallGraphCache};
use crate::config::AnalysisConfig;
use crate::ids::{CsId, NodeID, Version, INVALID_VERSION};
use crate::memssa::MemSsa;
use crate::ports::frontend::{ClassHierarchyGraph, GepKind, Icfg, PagEdgeKind, ProgramAssignmentGraph, StmtKind};
use crate::pts_store::VersionedPtsStore;
use crate::stats::FlowSensitiveStats;
use crate::svfg::{IndirectVfKind, Svfg, SvfgNodeKind, VfEdgeKind};

pub struct VersionedFlowResult {
    pub store: VersionedPtsStore,
    pub stats: FlowSensitiveStats,
}

pub struct VersionedFlowSolver<'a> {
    svfg: &'a mut Svfg,
    pag: &'a mut dyn ProgramAssignmentGraph,
    icfg: &'a dyn Icfg,
    mem_ssa: &'a MemSsa,
    chg: Option<&'a dyn ClassHierarchyGraph>,
    alarm: AnalysisAlarm,

    store: VersionedPtsStore,
    stats: FlowSensitiveStats,
    cache: CallGraphCache,

    addr_src: FxHashMap<NodeID, NodeID>,
    gep_kind_of: FxHashMap<NodeID, GepKind>,
    value_def: FxHashMap<NodeID, NodeID>,

    /// `(store node, object) -> the fresh version that store yields`.
    yield_version: FxHashMap<(NodeID, NodeID), Version>,
    /// `(location, object) -> the version reaching that location`,
    /// covering every node touched by at least one indirect edge
    /// (delta nodes, loads, stores, and plain relay points alike).
    consume_version: FxHashMap<(NodeID, NodeID), Version>,
    /// `versionReliance[(o, v)] = { v' }`: when `(o, v)` grows, union
    /// the delta into every `(o, v')`.
    version_reliance: FxHashMap<(NodeID, Version), FxHashSet<Version>>,
    /// `stmtReliance[(o, v)] = { load/store node }`: when `(o, v)`
    /// grows, re-run these statements.
    stmt_reliance: FxHashMap<(NodeID, Version), FxHashSet<NodeID>>,
}

impl<'a> VersionedFlowSolver<'a> {
    pub fn new(
        svfg: &'a mut Svfg,
        pag: &'a mut dyn ProgramAssignmentGraph,
        icfg: &'a dyn Icfg,
        mem_ssa: &'a MemSsa,
        chg: Option<&'a dyn ClassHierarchyGraph>,
        config: &AnalysisConfig,
    ) -> Self {
        let mut addr_src = FxHashMap::default();
        let mut gep_kind_of = FxHashMap::default();
        for edge in pag.edges() {
            match edge.kind {
                PagEdgeKind::Addr => {
                    addr_src.insert(edge.dst, edge.src);
                }
                PagEdgeKind::Gep(g) => {
                    gep_kind_of.insert(edge.dst, g);
                }
                _ => {}
            }
        }

        let mut value_def = FxHashMap::default();
        for node in &svfg.nodes {
            match node.kind {
                SvfgNodeKind::Addr
                | SvfgNodeKind::Copy
                | SvfgNodeKind::Gep
                | SvfgNodeKind::ActualParm { .. }
                | SvfgNodeKind::FormalParm { .. }
                | SvfgNodeKind::ActualRet { .. }
                | SvfgNodeKind::FormalRet { .. } => {
                    value_def.insert(node.icfg_loc, node.id);
                }
                SvfgNodeKind::Load => {
                    if let StmtKind::Load { res, .. } = icfg.stmt_kind(node.icfg_loc) {
                        value_def.insert(res, node.id);
                    }
                }
                _ => {}
            }
        }

        Self {
            svfg,
            pag,
            icfg,
            mem_ssa,
            chg,
            alarm: AnalysisAlarm::from_secs(config.fs_time_limit_secs),
            store: VersionedPtsStore::new(),
            stats: FlowSensitiveStats::default(),
            cache: CallGraphCache::new(),
            addr_src,
            gep_kind_of,
            value_def,
            yield_version: FxHashMap::default(),
            consume_version: FxHashMap::default(),
            version_reliance: FxHashMap::default(),
            stmt_reliance: FxHashMap::default(),
        }
    }

    /// Runs to a fixpoint: (re-)labels versions over the current SVFG,
    /// drains the main worklist, then resolves any newly discoverable
    /// indirect call/virtual-call edges and repeats, exactly mirroring
    /// [`crate::fs::FlowSensitiveSolver::solve`]'s outer loop — the new
    /// edges a round of `updateCallGraph` adds can change which nodes
    /// are delta targets, so labelling is rebuilt from scratch each
    /// round rather than patched incrementally.
    pub fn solve(
        mut self,
        mut andersen_pts: impl FnMut(NodeID) -> PointsTo,
        resolve_fp: impl FnMut(CsId) -> PointsTo,
        resolve_vtbl: impl FnMut(CsId) -> PointsTo,
    ) -> VersionedFlowResult {
        let mut resolve_fp = resolve_fp;
        let mut resolve_vtbl = resolve_vtbl;
        loop {
            self.relabel(&mut andersen_pts);
            self.run_worklist();
            self.stats.outer_iterations += 1;

            if self.alarm.fired() {
                self.stats.timed_out = true;
                break;
            }

            let new_edges = callgraph::update_call_graph(
                self.svfg,
                self.mem_ssa,
                self.pag,
                self.chg,
                &mut self.cache,
                &mut resolve_fp,
                &mut resolve_vtbl,
            );
            self.stats.new_indirect_call_edges += new_edges as u64;
            tracing::debug!(
                iteration = self.stats.outer_iterations,
                new_edges,
                "versioned flow-sensitive round"
            );
            if new_edges == 0 {
                break;
            }
        }

        VersionedFlowResult {
            store: self.store,
            stats: self.stats,
        }
    }

    /// Pre-labelling, meld-labelling, meld-to-version mapping, and
    /// reliance construction, in that order (§4.7).
    fn relabel(&mut self, andersen_pts: &mut impl FnMut(NodeID) -> PointsTo) {
        let mut meld_yield: FxHashMap<(NodeID, NodeID), PointsTo> = FxHashMap::default();
        let mut meld_consume: FxHashMap<(NodeID, NodeID), PointsTo> = FxHashMap::default();
        let mut next_meld: u32 = 0;

        for node in &self.svfg.nodes {
            if let SvfgNodeKind::Store = node.kind {
                if let StmtKind::Store { ptr, .. } = self.icfg.stmt_kind(node.icfg_loc) {
                    for o in andersen_pts(ptr).iter() {
                        for o2 in expand(self.pag, NodeID::new(o)) {
                            meld_yield.entry((node.id, o2)).or_insert_with(|| {
                                let m = PointsTo::singleton(next_meld);
                                next_meld += 1;
                                m
                            });
                        }
                    }
                }
            }
        }

        // A delta node is a function entry reached only through an
        // indirect call, or the actual-out side of an indirect call's
        // return: more callers/callees may still be discovered by
        // `updateCallGraph`, so its consumed version must not meld
        // from (a possibly still-incomplete) set of predecessors.
        let mut delta_targets: FxHashSet<NodeID> = FxHashSet::default();
        for e in &self.svfg.edges {
            if matches!(
                e.kind,
                VfEdgeKind::Indirect(IndirectVfKind::CallIndirect(_))
                    | VfEdgeKind::Indirect(IndirectVfKind::RetIndirect(_))
            ) {
                delta_targets.insert(e.dst);
            }
        }
        for &n in &delta_targets {
            let mut objs: FxHashSet<u32> = FxHashSet::default();
            for e in &self.svfg.edges {
                if e.src == n && matches!(e.kind, VfEdgeKind::Indirect(_)) {
                    objs.extend(e.label.iter());
                }
            }
            for o in objs {
                meld_consume.entry((n, NodeID::new(o))).or_insert_with(|| {
                    let m = PointsTo::singleton(next_meld);
                    next_meld += 1;
                    m
                });
            }
        }

        // Meld-labelling: propagate yield-at-source into consume-at-
        // destination across every indirect edge whose destination
        // isn't a delta target, to a fixpoint. A plain repeated full
        // pass rather than a dedicated worklist — meld (bitset union)
        // is monotone over a finite version universe, so this always
        // terminates, just not as fast as a worklist would.
        loop {
            let mut changed = false;
            for e in &self.svfg.edges {
                if !matches!(e.kind, VfEdgeKind::Indirect(_)) || delta_targets.contains(&e.dst) {
                    continue;
                }
                for o in e.label.iter() {
                    let obj = NodeID::new(o);
                    let src_val = meld_yield
                        .get(&(e.src, obj))
                        .or_else(|| meld_consume.get(&(e.src, obj)))
                        .cloned()
                        .unwrap_or_default();
                    if src_val.is_empty() {
                        continue;
                    }
                    changed |= meld_consume.entry((e.dst, obj)).or_default().union_with(&src_val);
                }
            }
            if !changed {
                break;
            }
        }

        let mut version_of: FxHashMap<PointsTo, Version> = FxHashMap::default();
        let mut next_version: Version = INVALID_VERSION;

        self.yield_version.clear();
        self.consume_version.clear();
        for (&key, bits) in &meld_yield {
            self.yield_version.insert(key, dense_version(&mut version_of, &mut next_version, bits));
        }
        for (&key, bits) in &meld_consume {
            self.consume_version.insert(key, dense_version(&mut version_of, &mut next_version, bits));
        }
        // Non-store nodes don't redefine an object: whatever version
        // reaches them also leaves them (§4.7: "for non-store nodes,
        // consume and yield map to the same Version id").
        let passthrough: Vec<((NodeID, NodeID), Version)> = self
            .consume_version
            .iter()
            .filter(|((n, _), _)| !matches!(self.svfg.nodes[n.index()].kind, SvfgNodeKind::Store))
            .map(|(&k, &v)| (k, v))
            .collect();
        for (key, v) in passthrough {
            self.yield_version.entry(key).or_insert(v);
        }

        self.build_reliance();
    }

    fn build_reliance(&mut self) {
        self.version_reliance.clear();
        self.stmt_reliance.clear();

        for e in &self.svfg.edges {
            if !matches!(e.kind, VfEdgeKind::Indirect(_)) {
                continue;
            }
            for o in e.label.iter() {
                let obj = NodeID::new(o);
                let yv = self
                    .yield_version
                    .get(&(e.src, obj))
                    .or_else(|| self.consume_version.get(&(e.src, obj)))
                    .copied()
                    .unwrap_or(INVALID_VERSION);
                let cv = self.consume_version.get(&(e.dst, obj)).copied().unwrap_or(INVALID_VERSION);
                if yv != INVALID_VERSION && cv != INVALID_VERSION && yv != cv {
                    self.version_reliance.entry((obj, yv)).or_default().insert(cv);
                }
            }
        }

        for (&(n, o), &v) in &self.consume_version {
            if matches!(self.svfg.nodes[n.index()].kind, SvfgNodeKind::Load | SvfgNodeKind::Store) {
                self.stmt_reliance.entry((o, v)).or_default().insert(n);
            }
        }
    }

    fn run_worklist(&mut self) {
        let n = self.svfg.nodes.len();
        let mut out_succ: Vec<Vec<NodeID>> = vec![Vec::new(); n];
        let mut in_edges: Vec<Vec<NodeID>> = vec![Vec::new(); n];
        // Indirect edges no longer carry propagation (§4.7): only
        // direct top-level edges drive the worklist's successor fan-out.
        for e in &self.svfg.edges {
            if let VfEdgeKind::Direct(_) = e.kind {
                out_succ[e.src.index()].push(e.dst);
                in_edges[e.dst.index()].push(e.src);
            }
        }

        let mut worklist: VecDeque<NodeID> = (0..n as u32).map(NodeID::new).collect();
        let mut queued: FxHashSet<NodeID> = worklist.iter().copied().collect();

        while let Some(id) = worklist.pop_front() {
            queued.remove(&id);
            self.stats.worklist_pops += 1;
            let changed = self.process(id, &in_edges, &mut worklist, &mut queued);
            if changed {
                for &succ in &out_succ[id.index()] {
                    if queued.insert(succ) {
                        worklist.push_back(succ);
                    }
                }
            }
        }
    }

    fn is_strong_update_target(&self, o: NodeID) -> bool {
        !self.pag.is_heap_mem_obj(o) && !self.pag.is_field_insensitive(o) && !self.pag.is_local_var_in_recursive_fun(o)
    }

    fn process(
        &mut self,
        n: NodeID,
        in_edges: &[Vec<NodeID>],
        worklist: &mut VecDeque<NodeID>,
        queued: &mut FxHashSet<NodeID>,
    ) -> bool {
        let (kind, icfg_loc) = {
            let node = &self.svfg.nodes[n.index()];
            (node.kind, node.icfg_loc)
        };
        let mut changed = false;

        match kind {
            SvfgNodeKind::Addr => {
                if let Some(&obj) = self.addr_src.get(&icfg_loc) {
                    changed |= self.store.union_tlv_pts(n, &PointsTo::singleton(obj.raw()));
                }
            }

            SvfgNodeKind::Copy
            | SvfgNodeKind::Phi
            | SvfgNodeKind::InterPhi
            | SvfgNodeKind::ActualParm { .. }
            | SvfgNodeKind::FormalParm { .. }
            | SvfgNodeKind::ActualRet { .. }
            | SvfgNodeKind::FormalRet { .. } => {
                for &src in &in_edges[n.index()] {
                    let p = self.store.get_tlv_pts(src);
                    changed |= self.store.union_tlv_pts(n, &p);
                }
            }

            SvfgNodeKind::Gep => {
                let mut base_pts = PointsTo::new();
                for &src in &in_edges[n.index()] {
                    base_pts.union_with(&self.store.get_tlv_pts(src));
                }
                if let Some(gk) = self.gep_kind_of.get(&icfg_loc).copied() {
                    for o in base_pts.iter() {
                        let obj = NodeID::new(o);
                        match gk {
                            GepKind::Normal(off) => {
                                if self.pag.is_field_insensitive(obj) || self.pag.is_blk_obj_or_constant_obj(obj) {
                                    changed |= self.store.union_tlv_pts(n, &PointsTo::singleton(o));
                                } else {
                                    let field_obj = self.pag.get_gep_obj_var(obj, off);
                                    changed |= self.store.union_tlv_pts(n, &PointsTo::singleton(field_obj.raw()));
                                }
                            }
                            GepKind::Variant => {
                                self.pag.set_field_insensitive(obj);
                                let fi_obj = self.pag.get_fi_obj_var(obj);
                                changed |= self.store.union_tlv_pts(n, &PointsTo::singleton(fi_obj.raw()));
                            }
                        }
                    }
                }
            }

            SvfgNodeKind::Load => {
                if let StmtKind::Load { ptr, .. } = self.icfg.stmt_kind(icfg_loc) {
                    let ptr_pts = self.value_def.get(&ptr).map(|&d| self.store.get_tlv_pts(d)).unwrap_or_default();
                    let mut res_pts = PointsTo::new();
                    for o in ptr_pts.iter() {
                        for o2 in expand(self.pag, NodeID::new(o)) {
                            if let Some(&cv) = self.consume_version.get(&(n, o2)) {
                                res_pts.union_with(&self.store.get_pts((o2, cv)));
                            }
                        }
                    }
                    changed |= self.store.union_tlv_pts(n, &res_pts);
                }
            }

            SvfgNodeKind::Store => {
                if let StmtKind::Store { ptr, val } = self.icfg.stmt_kind(icfg_loc) {
                    let ptr_pts = self.value_def.get(&ptr).map(|&d| self.store.get_tlv_pts(d)).unwrap_or_default();
                    let val_pts = self.value_def.get(&val).map(|&d| self.store.get_tlv_pts(d)).unwrap_or_default();

                    let strong_obj = (ptr_pts.len() == 1)
                        .then(|| ptr_pts.iter().next().unwrap())
                        .filter(|&o| self.is_strong_update_target(NodeID::new(o)));
                    match strong_obj {
                        Some(_) => self.stats.strong_updates += 1,
                        None if !ptr_pts.is_empty() => self.stats.weak_updates += 1,
                        None => {}
                    }

                    let mut touched: Vec<(NodeID, Version)> = Vec::new();
                    for o in ptr_pts.iter() {
                        for o2 in expand(self.pag, NodeID::new(o)) {
                            let Some(&yv) = self.yield_version.get(&(n, o2)) else { continue };
                            if self.store.union_pts((o2, yv), &val_pts) {
                                changed = true;
                                touched.push((o2, yv));
                            }
                            // Weak carry-over of whatever reached this
                            // store: skipped for the strong-update
                            // target, which starts this version clean.
                            if strong_obj != Some(o) {
                                if let Some(&cv) = self.consume_version.get(&(n, o2)) {
                                    let carried = self.store.get_pts((o2, cv));
                                    if self.store.union_pts((o2, yv), &carried) {
                                        changed = true;
                                        touched.push((o2, yv));
                                    }
                                }
                            }
                        }
                    }
                    for (obj, v) in touched {
                        self.propagate_reliance(obj, v, worklist, queued);
                    }
                }
            }

            // Pure relay nodes: their consume/yield versions are
            // already fixed by `relabel`'s meld-labelling pass; no
            // points-to value of their own to compute.
            SvfgNodeKind::ActualIn { .. }
            | SvfgNodeKind::ActualOut { .. }
            | SvfgNodeKind::FormalIn { .. }
            | SvfgNodeKind::FormalOut { .. }
            | SvfgNodeKind::MSSAPhi { .. }
            | SvfgNodeKind::InterMSSAPhi { .. } => {}

            SvfgNodeKind::Cmp
            | SvfgNodeKind::BinaryOp
            | SvfgNodeKind::UnaryOp
            | SvfgNodeKind::Branch
            | SvfgNodeKind::NullPtr
            | SvfgNodeKind::DummyVersionProp => {}
        }

        changed
    }

    /// When `(obj, v)` grows: transitively union the delta into every
    /// version reliant on it, and re-run every load/store statement
    /// reliant on any version touched along the way (§4.7).
    fn propagate_reliance(
        &mut self,
        obj: NodeID,
        v: Version,
        worklist: &mut VecDeque<NodeID>,
        queued: &mut FxHashSet<NodeID>,
    ) {
        let mut stack = vec![v];
        let mut seen: FxHashSet<Version> = FxHashSet::default();
        while let Some(cur) = stack.pop() {
            if !seen.insert(cur) {
                continue;
            }
            if let Some(stmts) = self.stmt_reliance.get(&(obj, cur)) {
                for &l in stmts {
                    if queued.insert(l) {
                        worklist.push_back(l);
                    }
                }
            }
            let reliant: Vec<Version> = self
                .version_reliance
                .get(&(obj, cur))
                .map(|s| s.iter().copied().collect())
                .unwrap_or_default();
            let delta = self.store.get_pts((obj, cur));
            for rv in reliant {
                if self.store.union_pts((obj, rv), &delta) {
                    stack.push(rv);
                }
            }
        }
    }
}

fn dense_version(version_of: &mut FxHashMap<PointsTo, Version>, next_version: &mut Version, bits: &PointsTo) -> Version {
    if bits.is_empty() {
        return INVALID_VERSION;
    }
    if let Some(&v) = version_of.get(bits) {
        return v;
    }
    *next_version += 1;
    version_of.insert(bits.clone(), *next_version);
    *next_version
}

/// Same "expand field-insensitive objects" treatment the plain
/// flow-sensitive solver applies (`fs::solver::FlowSensitiveSolver::expand`).
fn expand(pag: &dyn ProgramAssignmentGraph, o: NodeID) -> Vec<NodeID> {
    if pag.is_field_insensitive(o) {
        let base = pag.get_base_obj(o);
        pag.get_all_fields_obj_vars(base).iter().map(NodeID::new).collect()
    } else {
        vec![o]
    }
}
