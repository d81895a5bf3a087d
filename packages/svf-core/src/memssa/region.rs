//! Memory regions (§4.4): a `MemRegion` owns the set of base objects
//! MemSSA treats as one scalar for mu/chi purposes. Which objects get
//! folded together is controlled by `MemPartitionStrategy`.

use rustc_hash::FxHashMap;

use crate::bitset::PointsTo;
use crate::config::MemPartitionStrategy;
use crate::ids::{MemRegionId, NodeID};
use crate::ports::frontend::{Icfg, StmtKind};
use crate::ports::ModRefAnalysis;

#[derive(Debug, Clone)]
pub struct MemRegion {
    pub id: MemRegionId,
    pub objects: PointsTo,
}

/// Union-find over object ids, keyed by raw `u32` rather than a dense
/// `Vec` index: the object-id universe here is whatever subset of the
/// shared `NodeID` space actually gets touched by a load/store/call,
/// not a contiguous range starting at 0.
struct ObjUnionFind {
    parent: FxHashMap<u32, u32>,
}

impl ObjUnionFind {
    fn new() -> Self {
        Self {
            parent: FxHashMap::default(),
        }
    }

    fn find(&mut self, x: u32) -> u32 {
        let mut root = *self.parent.entry(x).or_insert(x);
        while root != *self.parent.entry(root).or_insert(root) {
            root = self.parent[&root];
        }
        let mut cur = x;
        while cur != root {
            let next = self.parent[&cur];
            self.parent.insert(cur, root);
            cur = next;
        }
        root
    }

    /// Lowest-id wins, for deterministic region numbering independent
    /// of statement visitation order.
    fn union(&mut self, a: u32, b: u32) {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra == rb {
            return;
        }
        let (lo, hi) = if ra < rb { (ra, rb) } else { (rb, ra) };
        self.parent.insert(hi, lo);
    }

    fn groups(&mut self) -> FxHashMap<u32, Vec<u32>> {
        let keys: Vec<u32> = self.parent.keys().copied().collect();
        let mut out: FxHashMap<u32, Vec<u32>> = FxHashMap::default();
        for k in keys {
            let r = self.find(k);
            out.entry(r).or_default().push(k);
        }
        out
    }
}

/// Result of region construction: every base object that was touched
/// by some load/store/call is assigned a region id; untouched objects
/// have no region and never need mu/chi.
pub struct RegionPartition {
    strategy: MemPartitionStrategy,
    regions: Vec<MemRegion>,
    /// `Distinct`/`InterDisjoint`: single global assignment.
    global: FxHashMap<u32, MemRegionId>,
    /// `IntraDisjoint`: one assignment per function.
    per_function: FxHashMap<NodeID, FxHashMap<u32, MemRegionId>>,
}

impl RegionPartition {
    pub fn regions(&self) -> &[MemRegion] {
        &self.regions
    }

    pub fn region(&self, id: MemRegionId) -> &MemRegion {
        &self.regions[id.index()]
    }

    /// The region a touched object belongs to under this partition,
    /// scoped to `func` for `IntraDisjoint` (ignored otherwise).
    pub fn region_of(&self, func: NodeID, obj: NodeID) -> Option<MemRegionId> {
        match self.strategy {
            MemPartitionStrategy::IntraDisjoint => {
                self.per_function.get(&func)?.get(&obj.raw()).copied()
            }
            MemPartitionStrategy::Distinct | MemPartitionStrategy::InterDisjoint => {
                self.global.get(&obj.raw()).copied()
            }
        }
    }

    /// Builds the partition by scanning every load/store/call in
    /// every reachable function's every block, per §4.4: "any
    /// load/store/call whose Andersen points-to intersects a region
    /// gets a mu or chi on that region."
    ///
    /// `ptr_pts` resolves a pointer operand's current Andersen
    /// points-to set (the caller already has the solved `AndersenResult`
    /// in hand by the time MemSSA is built, per the §3 lifecycle: "MemSSA
    /// is built once per Andersen result").
    pub fn build(
        strategy: MemPartitionStrategy,
        icfg: &dyn Icfg,
        mod_ref: &dyn ModRefAnalysis,
        mut ptr_pts: impl FnMut(NodeID) -> PointsTo,
    ) -> Self {
        match strategy {
            MemPartitionStrategy::Distinct => Self::build_distinct(icfg, mod_ref, &mut ptr_pts),
            MemPartitionStrategy::InterDisjoint => {
                Self::build_disjoint_global(icfg, mod_ref, &mut ptr_pts)
            }
            MemPartitionStrategy::IntraDisjoint => {
                Self::build_disjoint_per_function(icfg, mod_ref, &mut ptr_pts)
            }
        }
    }

    fn build_distinct(
        icfg: &dyn Icfg,
        mod_ref: &dyn ModRefAnalysis,
        ptr_pts: &mut impl FnMut(NodeID) -> PointsTo,
    ) -> Self {
        let mut touched: Vec<u32> = Vec::new();
        for_each_touched_object(icfg, mod_ref, ptr_pts, |_func, o| touched.push(o));
        touched.sort_unstable();
        touched.dedup();

        let mut regions = Vec::with_capacity(touched.len());
        let mut global = FxHashMap::default();
        for (i, obj) in touched.into_iter().enumerate() {
            let id = MemRegionId::new(i as u32);
            let mut objects = PointsTo::new();
            objects.insert(obj);
            regions.push(MemRegion { id, objects });
            global.insert(obj, id);
        }

        RegionPartition {
            strategy: MemPartitionStrategy::Distinct,
            regions,
            global,
            per_function: FxHashMap::default(),
        }
    }

    fn build_disjoint_global(
        icfg: &dyn Icfg,
        mod_ref: &dyn ModRefAnalysis,
        ptr_pts: &mut impl FnMut(NodeID) -> PointsTo,
    ) -> Self {
        let mut uf = ObjUnionFind::new();
        let mut per_site: Vec<Vec<u32>> = Vec::new();
        for_each_touched_set(icfg, mod_ref, ptr_pts, |_func, objs| {
            for &o in &objs {
                uf.find(o);
            }
            per_site.push(objs);
        });
        for objs in &per_site {
            for w in objs.windows(2) {
                uf.union(w[0], w[1]);
            }
        }

        let (regions, global) = materialize_groups(uf.groups());
        RegionPartition {
            strategy: MemPartitionStrategy::InterDisjoint,
            regions,
            global,
            per_function: FxHashMap::default(),
        }
    }

    fn build_disjoint_per_function(
        icfg: &dyn Icfg,
        mod_ref: &dyn ModRefAnalysis,
        ptr_pts: &mut impl FnMut(NodeID) -> PointsTo,
    ) -> Self {
        let mut per_fn_sites: FxHashMap<NodeID, Vec<Vec<u32>>> = FxHashMap::default();
        for_each_touched_set(icfg, mod_ref, ptr_pts, |func, objs| {
            per_fn_sites.entry(func).or_default().push(objs);
        });

        let mut per_function = FxHashMap::default();
        let mut regions = Vec::new();
        for (func, sites) in per_fn_sites {
            let mut uf = ObjUnionFind::new();
            for objs in &sites {
                for &o in objs {
                    uf.find(o);
                }
            }
            for objs in &sites {
                for w in objs.windows(2) {
                    uf.union(w[0], w[1]);
                }
            }
            let (mut fn_regions, fn_map) = materialize_groups(uf.groups());
            // re-number regions to be globally unique across functions.
            let offset = regions.len() as u32;
            for r in fn_regions.iter_mut() {
                r.id = MemRegionId::new(r.id.raw() + offset);
            }
            let fn_map: FxHashMap<u32, MemRegionId> = fn_map
                .into_iter()
                .map(|(o, id)| (o, MemRegionId::new(id.raw() + offset)))
                .collect();
            regions.extend(fn_regions);
            per_function.insert(func, fn_map);
        }

        RegionPartition {
            strategy: MemPartitionStrategy::IntraDisjoint,
            regions,
            global: FxHashMap::default(),
            per_function,
        }
    }
}

fn materialize_groups(groups: FxHashMap<u32, Vec<u32>>) -> (Vec<MemRegion>, FxHashMap<u32, MemRegionId>) {
    let mut roots: Vec<u32> = groups.keys().copied().collect();
    roots.sort_unstable();
    let mut regions = Vec::with_capacity(roots.len());
    let mut map = FxHashMap::default();
    for (i, root) in roots.into_iter().enumerate() {
        let id = MemRegionId::new(i as u32);
        let mut objects = PointsTo::new();
        let mut members = groups[&root].clone();
        members.sort_unstable();
        for o in &members {
            objects.insert(*o);
            map.insert(*o, id);
        }
        regions.push(MemRegion { id, objects });
    }
    (regions, map)
}

/// Visits every object touched by a load/store/call, deduplicated,
/// without needing the set each access touched together.
fn for_each_touched_object(
    icfg: &dyn Icfg,
    mod_ref: &dyn ModRefAnalysis,
    ptr_pts: &mut impl FnMut(NodeID) -> PointsTo,
    mut visit: impl FnMut(NodeID, u32),
) {
    for_each_touched_set(icfg, mod_ref, ptr_pts, |func, objs| {
        for o in objs {
            visit(func, o);
        }
    });
}

/// Visits `(function, touched-objects-as-one-set)` for every
/// load/store/call statement in every reachable block of every
/// function, per the same walk `createMUCHI` (builder.rs) performs.
fn for_each_touched_set(
    icfg: &dyn Icfg,
    mod_ref: &dyn ModRefAnalysis,
    ptr_pts: &mut impl FnMut(NodeID) -> PointsTo,
    mut visit: impl FnMut(NodeID, Vec<u32>),
) {
    for func in icfg.functions() {
        for block in icfg.blocks(func) {
            for stmt in icfg.statements(block) {
                match icfg.stmt_kind(stmt) {
                    StmtKind::Load { ptr, .. } | StmtKind::Store { ptr, .. } => {
                        let pts = ptr_pts(ptr);
                        if !pts.is_empty() {
                            visit(func, pts.iter().collect());
                        }
                    }
                    StmtKind::Call(cs) => {
                        let modified = mod_ref.mod_objects(cs);
                        let refd = mod_ref.ref_objects(cs);
                        if !modified.is_empty() {
                            visit(func, modified.iter().collect());
                        }
                        if !refd.is_empty() {
                            visit(func, refd.iter().collect());
                        }
                    }
                    StmtKind::Other => {}
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::CsId;

    struct OneBlockIcfg {
        stmts: Vec<(NodeID, StmtKind)>,
    }

    impl Icfg for OneBlockIcfg {
        fn functions(&self) -> Vec<NodeID> {
            vec![NodeID::new(100)]
        }
        fn entry_block(&self, func: NodeID) -> NodeID {
            func
        }
        fn blocks(&self, func: NodeID) -> Vec<NodeID> {
            vec![func]
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
                .map(|(_, k)| *k)
                .unwrap_or(StmtKind::Other)
        }
        fn function_of(&self, _node: NodeID) -> Option<NodeID> {
            Some(NodeID::new(100))
        }
    }

    struct NoModRef;
    impl ModRefAnalysis for NoModRef {
        fn mod_objects(&self, _cs: CsId) -> PointsTo {
            PointsTo::new()
        }
        fn ref_objects(&self, _cs: CsId) -> PointsTo {
            PointsTo::new()
        }
    }

    fn pts_of(sets: &FxHashMap<u32, Vec<u32>>) -> impl FnMut(NodeID) -> PointsTo + '_ {
        move |ptr: NodeID| {
            let mut p = PointsTo::new();
            if let Some(objs) = sets.get(&ptr.raw()) {
                for &o in objs {
                    p.insert(o);
                }
            }
            p
        }
    }

    #[test]
    fn distinct_gives_one_region_per_object() {
        let icfg = OneBlockIcfg {
            stmts: vec![
                (NodeID::new(1), StmtKind::Load { ptr: NodeID::new(10), res: NodeID::new(1) }),
                (NodeID::new(2), StmtKind::Load { ptr: NodeID::new(11), res: NodeID::new(2) }),
            ],
        };
        let mut sets = FxHashMap::default();
        sets.insert(10, vec![0, 1]);
        sets.insert(11, vec![2]);
        let part = RegionPartition::build(MemPartitionStrategy::Distinct, &icfg, &NoModRef, pts_of(&sets));
        assert_eq!(part.regions().len(), 3);
        assert!(part.region_of(NodeID::new(100), NodeID::new(0)).is_some());
        assert_ne!(
            part.region_of(NodeID::new(100), NodeID::new(0)),
            part.region_of(NodeID::new(100), NodeID::new(1))
        );
    }

    #[test]
    fn inter_disjoint_merges_objects_touched_together() {
        let icfg = OneBlockIcfg {
            stmts: vec![(
                NodeID::new(1),
                StmtKind::Load { ptr: NodeID::new(10), res: NodeID::new(1) },
            )],
        };
        let mut sets = FxHashMap::default();
        sets.insert(10, vec![0, 1, 2]);
        let part = RegionPartition::build(MemPartitionStrategy::InterDisjoint, &icfg, &NoModRef, pts_of(&sets));
        assert_eq!(part.regions().len(), 1);
        assert_eq!(
            part.region_of(NodeID::new(100), NodeID::new(0)),
            part.region_of(NodeID::new(100), NodeID::new(2))
        );
    }

    #[test]
    fn untouched_object_has_no_region() {
        let icfg = OneBlockIcfg { stmts: vec![] };
        let part = RegionPartition::build(MemPartitionStrategy::Distinct, &icfg, &NoModRef, |_| PointsTo::new());
        assert!(part.region_of(NodeID::new(100), NodeID::new(0)).is_none());
    }
}
