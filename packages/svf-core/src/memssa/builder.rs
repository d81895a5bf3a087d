//! Three-pass MemSSA construction (§4.4), following Cytron et al.:
//! `createMUCHI` collects def sites per region, `insertPHI` places
//! phis at iterated dominance frontiers of those def sites, and
//! `SSARename` walks the dominator tree assigning fresh versions and
//! linking each mu/RetMu to its reaching def.

use rustc_hash::{FxHashMap, FxHashSet};

use super::dom::Dominance;
use super::region::RegionPartition;
use super::ver::{MRDef, MRVer};
use crate::bitset::PointsTo;
use crate::ids::{MRVerId, MemRegionId, NodeID, Version};
use crate::ports::frontend::{Icfg, StmtKind};
use crate::ports::ModRefAnalysis;
use crate::stats::MemSsaStats;

#[derive(Debug, Clone)]
pub struct PhiNode {
    pub out: MRVerId,
    /// `(predecessor block, version live-out of that predecessor)`.
    pub operands: Vec<(NodeID, MRVerId)>,
}

impl Default for PhiNode {
    /// `out` is a placeholder until the block that owns this phi is
    /// visited by `ssa_rename` and overwrites it with the version it
    /// actually allocates; a predecessor can fill in `operands` first
    /// if the dom-tree DFS reaches it before the phi's own block.
    fn default() -> Self {
        PhiNode {
            out: MRVerId::new(0),
            operands: Vec::new(),
        }
    }
}

/// MemSSA facts for a single function.
#[derive(Debug, Clone, Default)]
pub struct FunctionMemSsa {
    pub entry_chi: FxHashMap<MemRegionId, MRVerId>,
    /// Last exit block's reaching version per region, if the function
    /// has a reachable return (§4.4 invariant: RETMU only injected
    /// then).
    pub ret_mu: FxHashMap<MemRegionId, MRVerId>,
    pub mu_at: FxHashMap<NodeID, Vec<MRVerId>>,
    pub chi_at: FxHashMap<NodeID, Vec<(MRVerId, MRVerId)>>,
    pub phi_at: FxHashMap<(NodeID, MemRegionId), PhiNode>,
}

pub struct MemSsa {
    pub regions: RegionPartition,
    pub versions: Vec<MRVer>,
    pub functions: FxHashMap<NodeID, FunctionMemSsa>,
    pub stats: MemSsaStats,
}

impl MemSsa {
    pub fn mrver(&self, id: MRVerId) -> &MRVer {
        &self.versions[id.index()]
    }
}

pub struct MemSsaBuilder<'a> {
    icfg: &'a dyn Icfg,
    mod_ref: &'a dyn ModRefAnalysis,
    regions: RegionPartition,
    versions: Vec<MRVer>,
    stats: MemSsaStats,
}

impl<'a> MemSsaBuilder<'a> {
    pub fn new(icfg: &'a dyn Icfg, mod_ref: &'a dyn ModRefAnalysis, regions: RegionPartition) -> Self {
        Self {
            icfg,
            mod_ref,
            regions,
            versions: Vec::new(),
            stats: MemSsaStats::default(),
        }
    }

    pub fn build(mut self, mut ptr_pts: impl FnMut(NodeID) -> PointsTo) -> MemSsa {
        self.stats.regions = self.regions.regions().len();
        let mut functions = FxHashMap::default();
        for func in self.icfg.functions() {
            let dom = Dominance::compute(self.icfg, func);
            let f_result = self.build_function(func, &dom, &mut ptr_pts);
            functions.insert(func, f_result);
        }
        MemSsa {
            regions: self.regions,
            versions: self.versions,
            functions,
            stats: self.stats,
        }
    }

    fn alloc_version(
        &mut self,
        next_version: &mut FxHashMap<MemRegionId, Version>,
        region: MemRegionId,
        def: MRDef,
    ) -> MRVerId {
        let slot = next_version.entry(region).or_insert(0);
        let version = *slot;
        *slot += 1;
        let id = MRVerId::new(self.versions.len() as u32);
        self.versions.push(MRVer {
            id,
            region,
            version,
            def,
        });
        self.stats.max_version = self.stats.max_version.max(version);
        id
    }

    fn touched_regions(&self, func: NodeID, pts: &PointsTo) -> Vec<MemRegionId> {
        let mut regs: Vec<MemRegionId> = pts
            .iter()
            .filter_map(|o| self.regions.region_of(func, NodeID::new(o)))
            .collect();
        regs.sort_by_key(|r| r.raw());
        regs.dedup();
        regs
    }

    fn build_function(
        &mut self,
        func: NodeID,
        dom: &Dominance,
        ptr_pts: &mut impl FnMut(NodeID) -> PointsTo,
    ) -> FunctionMemSsa {
        let CreateMuChiResult {
            used_regions,
            def_blocks,
            mu_regions,
            chi_regions,
        } = self.create_mu_chi(func, dom, ptr_pts);

        let phi_sites = self.insert_phi(dom, &used_regions, &def_blocks);

        self.ssa_rename(func, dom, &used_regions, &mu_regions, &chi_regions, &phi_sites)
    }

    /// Pass 1: records which regions are used, which blocks define
    /// them (for phi placement), and which statements carry a mu/chi
    /// for which regions (without assigning SSA versions yet).
    fn create_mu_chi(
        &mut self,
        func: NodeID,
        dom: &Dominance,
        ptr_pts: &mut impl FnMut(NodeID) -> PointsTo,
    ) -> CreateMuChiResult {
        let mut used_regions: FxHashSet<MemRegionId> = FxHashSet::default();
        let mut def_blocks: FxHashMap<MemRegionId, FxHashSet<NodeID>> = FxHashMap::default();
        let mut mu_regions: FxHashMap<NodeID, Vec<MemRegionId>> = FxHashMap::default();
        let mut chi_regions: FxHashMap<NodeID, Vec<MemRegionId>> = FxHashMap::default();

        for &block in dom.reachable_blocks() {
            for stmt in self.icfg.statements(block) {
                match self.icfg.stmt_kind(stmt) {
                    StmtKind::Load { ptr, .. } => {
                        let regs = self.touched_regions(func, &ptr_pts(ptr));
                        used_regions.extend(regs.iter().copied());
                        mu_regions.entry(stmt).or_default().extend(regs);
                    }
                    StmtKind::Store { ptr, .. } => {
                        let regs = self.touched_regions(func, &ptr_pts(ptr));
                        used_regions.extend(regs.iter().copied());
                        for &r in &regs {
                            def_blocks.entry(r).or_default().insert(block);
                        }
                        chi_regions.entry(stmt).or_default().extend(regs);
                    }
                    StmtKind::Call(cs) => {
                        let ref_regs = self.touched_regions(func, &self.mod_ref.ref_objects(cs));
                        let mod_regs = self.touched_regions(func, &self.mod_ref.mod_objects(cs));
                        used_regions.extend(ref_regs.iter().copied());
                        used_regions.extend(mod_regs.iter().copied());
                        mu_regions.entry(stmt).or_default().extend(ref_regs);
                        for &r in &mod_regs {
                            def_blocks.entry(r).or_default().insert(block);
                        }
                        chi_regions.entry(stmt).or_default().extend(mod_regs);
                    }
                    StmtKind::Other => {}
                }
            }
        }

        // ENTRYCHI makes the entry block a def site for every used
        // region (invariant (c): an ENTRYCHI exists for a region iff
        // any statement uses or defs it).
        let entry = self.icfg.entry_block(func);
        for &r in &used_regions {
            def_blocks.entry(r).or_default().insert(entry);
        }
        self.stats.entry_chis += used_regions.len();
        if self.icfg.has_reachable_return(func) {
            self.stats.ret_mus += used_regions.len();
        }

        CreateMuChiResult {
            used_regions,
            def_blocks,
            mu_regions,
            chi_regions,
        }
    }

    /// Pass 2: iterated dominance-frontier phi placement, standard
    /// Cytron-et-al worklist per region.
    fn insert_phi(
        &mut self,
        dom: &Dominance,
        used_regions: &FxHashSet<MemRegionId>,
        def_blocks: &FxHashMap<MemRegionId, FxHashSet<NodeID>>,
    ) -> FxHashSet<(NodeID, MemRegionId)> {
        let mut phi_sites: FxHashSet<(NodeID, MemRegionId)> = FxHashSet::default();
        for &region in used_regions {
            let empty = FxHashSet::default();
            let defs = def_blocks.get(&region).unwrap_or(&empty);
            let mut has_phi: FxHashSet<NodeID> = FxHashSet::default();
            let mut worklist: Vec<NodeID> = defs.iter().copied().collect();
            worklist.sort_by_key(|b| b.raw());

            while let Some(b) = worklist.pop() {
                for d in dom.frontier(b) {
                    if has_phi.insert(d) {
                        phi_sites.insert((d, region));
                        worklist.push(d);
                    }
                }
            }
        }
        self.stats.phis_inserted += phi_sites.len();
        phi_sites
    }

    /// Pass 3: DFS over the dominator tree, renaming phi results, mu
    /// operands, and chi defs; fills phi operands of CFG successors
    /// (not dominator-tree successors) as each block is visited.
    #[allow(clippy::too_many_arguments)]
    fn ssa_rename(
        &mut self,
        func: NodeID,
        dom: &Dominance,
        used_regions: &FxHashSet<MemRegionId>,
        mu_regions: &FxHashMap<NodeID, Vec<MemRegionId>>,
        chi_regions: &FxHashMap<NodeID, Vec<MemRegionId>>,
        phi_sites: &FxHashSet<(NodeID, MemRegionId)>,
    ) -> FunctionMemSsa {
        let mut sorted_regions: Vec<MemRegionId> = used_regions.iter().copied().collect();
        sorted_regions.sort_by_key(|r| r.raw());

        let mut next_version: FxHashMap<MemRegionId, Version> = FxHashMap::default();
        let mut stack: FxHashMap<MemRegionId, Vec<MRVerId>> = FxHashMap::default();
        let mut result = FunctionMemSsa::default();
        let entry = self.icfg.entry_block(func);
        let has_ret = self.icfg.has_reachable_return(func);

        enum Frame {
            Enter(NodeID, bool),
            Exit(FxHashMap<MemRegionId, u32>),
        }

        let mut frame_stack: Vec<Frame> = vec![Frame::Enter(entry, true)];
        let mut visited: FxHashSet<NodeID> = FxHashSet::default();

        while let Some(frame) = frame_stack.pop() {
            let (block, is_entry) = match frame {
                Frame::Exit(pushed) => {
                    for (region, count) in pushed {
                        if let Some(s) = stack.get_mut(&region) {
                            let new_len = s.len().saturating_sub(count as usize);
                            s.truncate(new_len);
                        }
                    }
                    continue;
                }
                Frame::Enter(block, is_entry) => (block, is_entry),
            };
            if !visited.insert(block) {
                continue;
            }
            let mut pushed: FxHashMap<MemRegionId, u32> = FxHashMap::default();

            if is_entry {
                for &region in &sorted_regions {
                    let ver = self.alloc_version(&mut next_version, region, MRDef::EntryChi);
                    stack.entry(region).or_default().push(ver);
                    *pushed.entry(region).or_insert(0) += 1;
                    result.entry_chi.insert(region, ver);
                }
            }

            let mut regions_with_phi_here: Vec<MemRegionId> = sorted_regions
                .iter()
                .copied()
                .filter(|r| phi_sites.contains(&(block, *r)))
                .collect();
            regions_with_phi_here.sort_by_key(|r| r.raw());
            for region in regions_with_phi_here {
                let ver = self.alloc_version(&mut next_version, region, MRDef::Phi);
                stack.entry(region).or_default().push(ver);
                *pushed.entry(region).or_insert(0) += 1;
                // `.entry(...).or_insert_with(default)` rather than a
                // plain insert: a predecessor block that is not a dom-
                // tree ancestor of `block` (the common case for a
                // merge point) may already have appended an operand
                // here if it was visited earlier in the dom-tree DFS,
                // and visiting order between sibling subtrees is by
                // block id, not CFG predecessor order.
                result.phi_at.entry((block, region)).or_default().out = ver;
            }

            for stmt in self.icfg.statements(block) {
                if let Some(regs) = mu_regions.get(&stmt) {
                    for &region in regs {
                        if let Some(top) = stack.get(&region).and_then(|s| s.last()) {
                            result.mu_at.entry(stmt).or_default().push(*top);
                        }
                    }
                }
                if let Some(regs) = chi_regions.get(&stmt) {
                    for &region in regs {
                        let in_ver = stack.get(&region).and_then(|s| s.last()).copied();
                        let def = match self.icfg.stmt_kind(stmt) {
                            StmtKind::Call(cs) => MRDef::CallChi(cs),
                            _ => MRDef::StoreChi(stmt),
                        };
                        let out_ver = self.alloc_version(&mut next_version, region, def);
                        if let Some(in_ver) = in_ver {
                            result.chi_at.entry(stmt).or_default().push((in_ver, out_ver));
                        }
                        stack.entry(region).or_default().push(out_ver);
                        *pushed.entry(region).or_insert(0) += 1;
                    }
                }
            }

            for succ in self.icfg.successors(block) {
                for &region in &sorted_regions {
                    if phi_sites.contains(&(succ, region)) {
                        if let Some(cur) = stack.get(&region).and_then(|s| s.last()) {
                            result
                                .phi_at
                                .entry((succ, region))
                                .or_insert_with(PhiNode::default)
                                .operands
                                .push((block, *cur));
                        }
                    }
                }
            }

            if has_ret && self.icfg.successors(block).is_empty() {
                for &region in &sorted_regions {
                    if let Some(cur) = stack.get(&region).and_then(|s| s.last()) {
                        result.ret_mu.insert(region, *cur);
                    }
                }
            }

            // Exit frame first so it runs after every dom-tree child
            // (pushed next, so popped before the exit frame).
            frame_stack.push(Frame::Exit(pushed));

            let mut children: Vec<NodeID> = dom.dom_tree_children(block).to_vec();
            children.sort_by_key(|n| n.raw());
            for child in children.into_iter().rev() {
                frame_stack.push(Frame::Enter(child, false));
            }
        }

        result
    }
}

struct CreateMuChiResult {
    used_regions: FxHashSet<MemRegionId>,
    def_blocks: FxHashMap<MemRegionId, FxHashSet<NodeID>>,
    mu_regions: FxHashMap<NodeID, Vec<MemRegionId>>,
    chi_regions: FxHashMap<NodeID, Vec<MemRegionId>>,
}
