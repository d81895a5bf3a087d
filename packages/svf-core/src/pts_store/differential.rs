//! Differential backend: flat total pts plus, per node, a `diff` set
//! (added since last read) and a `propagated` set (what has already
//! been pushed to successors). Required by wave-diff propagation
//! (§4.1 backend 2, §4.3, §9).
//!
//! The two bitsets are genuinely disjoint in intent: `diff` is
//! recomputed from `total \ propagated` on demand
//! (`compute_diff_pts`), never by re-scanning the whole points-to set
//! on every worklist step — recomputing from scratch each time would
//! destroy the asymptotic wave-diff exists for (§9).

use super::{flat::FlatPtsStore, group_by_value, PointsToStore};
use crate::bitset::PointsTo;
use crate::ids::NodeID;
use rustc_hash::FxHashMap;

#[derive(Debug, Clone, Default)]
pub struct DifferentialPtsStore {
    total: FlatPtsStore,
    diff: FxHashMap<NodeID, PointsTo>,
    propagated: FxHashMap<NodeID, PointsTo>,
}

impl DifferentialPtsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// `diff(k)`: the portion of `pts(k)` not yet propagated.
    pub fn get_diff_pts(&self, key: NodeID) -> PointsTo {
        self.diff.get(&key).cloned().unwrap_or_default()
    }

    pub fn get_propagated_pts(&self, key: NodeID) -> PointsTo {
        self.propagated.get(&key).cloned().unwrap_or_default()
    }

    /// `diff(k) = curr \ propagated(k)`; `propagated(k) |= curr`.
    pub fn compute_diff_pts(&mut self, key: NodeID, curr: &PointsTo) {
        let propagated = self.propagated.entry(key).or_default();
        let diff = curr.difference(propagated);
        propagated.union_with(curr);
        self.diff.insert(key, diff);
    }

    /// `propagated(dst) |= propagated(src)`.
    pub fn update_propa_pts_map(&mut self, src: NodeID, dst: NodeID) {
        let src_propagated = self.propagated.get(&src).cloned().unwrap_or_default();
        if src_propagated.is_empty() {
            return;
        }
        self.propagated
            .entry(dst)
            .or_default()
            .union_with(&src_propagated);
    }

    pub fn clear_propa_pts(&mut self, key: NodeID) {
        self.propagated.remove(&key);
    }

    pub fn clear_diff_pts(&mut self, key: NodeID) {
        self.diff.remove(&key);
    }
}

impl PointsToStore<NodeID> for DifferentialPtsStore {
    fn get_pts(&self, key: NodeID) -> PointsTo {
        self.total.get_pts(key)
    }

    fn get_pts_in_place(&self, key: NodeID) -> Option<&PointsTo> {
        self.total.get_pts_in_place(key)
    }

    fn union_pts(&mut self, key: NodeID, src: &PointsTo) -> bool {
        self.total.union_pts(key, src)
    }

    fn add_pts(&mut self, key: NodeID, obj: u32) -> bool {
        self.total.add_pts(key, obj)
    }

    fn clear_pts(&mut self, key: NodeID) {
        self.total.clear_pts(key);
        self.diff.remove(&key);
        self.propagated.remove(&key);
    }

    fn get_all_pts(&self, live_only: bool) -> std::collections::HashMap<Vec<u32>, usize> {
        self.total.get_all_pts(live_only)
    }
}
