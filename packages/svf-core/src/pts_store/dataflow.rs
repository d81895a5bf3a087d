//! Data-flow backend: `(LocId, NodeID) -> PointsTo` with an IN and an
//! OUT map per SVFG location (§4.1 backend 3), used by the
//! flow-sensitive solver (C6). Also tracks, per location, which
//! OUT-variables changed since last cleared — the "dirty-out-var"
//! bitmap callers use to skip unchanged successors.

use super::{group_by_value, PointsToStore};
use crate::bitset::PointsTo;
use crate::ids::{LocId, NodeID};
use rustc_hash::{FxHashMap, FxHashSet};

/// Which per-location map a key addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DfDir {
    In,
    Out,
}

#[derive(Debug, Clone, Default)]
pub struct DataFlowPtsStore {
    in_map: FxHashMap<(LocId, NodeID), PointsTo>,
    out_map: FxHashMap<(LocId, NodeID), PointsTo>,
    /// Objects with a live IN entry at a location, for
    /// `update_all_df_out_from_in` without a full map scan.
    in_objs: FxHashMap<LocId, FxHashSet<NodeID>>,
    /// Top-level-variable points-to, not region-scoped.
    tlv: FxHashMap<NodeID, PointsTo>,
    dirty_out_vars: FxHashMap<LocId, FxHashSet<NodeID>>,
}

impl DataFlowPtsStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn mark_dirty(&mut self, loc: LocId, obj: NodeID) {
        self.dirty_out_vars.entry(loc).or_default().insert(obj);
    }

    pub fn get_in(&self, loc: LocId, obj: NodeID) -> PointsTo {
        self.in_map.get(&(loc, obj)).cloned().unwrap_or_default()
    }

    pub fn get_out(&self, loc: LocId, obj: NodeID) -> PointsTo {
        self.out_map.get(&(loc, obj)).cloned().unwrap_or_default()
    }

    fn union_in(&mut self, loc: LocId, obj: NodeID, src: &PointsTo) -> bool {
        let changed = self.in_map.entry((loc, obj)).or_default().union_with(src);
        if changed {
            self.in_objs.entry(loc).or_default().insert(obj);
        }
        changed
    }

    fn union_out(&mut self, loc: LocId, obj: NodeID, src: &PointsTo) -> bool {
        let changed = self.out_map.entry((loc, obj)).or_default().union_with(src);
        if changed {
            self.mark_dirty(loc, obj);
        }
        changed
    }

    /// `DFIn[dst][o] |= DFIn[src][o]`.
    pub fn update_df_in_from_in(&mut self, src_loc: LocId, obj: NodeID, dst_loc: LocId) -> bool {
        let v = self.get_in(src_loc, obj);
        if v.is_empty() {
            return false;
        }
        self.union_in(dst_loc, obj, &v)
    }

    /// `DFIn[dst][o] |= DFOut[src][o]`.
    pub fn update_df_in_from_out(&mut self, src_loc: LocId, obj: NodeID, dst_loc: LocId) -> bool {
        let v = self.get_out(src_loc, obj);
        if v.is_empty() {
            return false;
        }
        self.union_in(dst_loc, obj, &v)
    }

    /// Merge IN into OUT for one object at `loc`. `strong_update_mask`,
    /// when given, means the store is a strong update for this object:
    /// OUT is *overwritten* with the mask rather than unioned with IN.
    pub fn update_df_out_from_in(
        &mut self,
        loc: LocId,
        obj: NodeID,
        strong_update_mask: Option<&PointsTo>,
    ) -> bool {
        match strong_update_mask {
            Some(new_val) => {
                let slot = self.out_map.entry((loc, obj)).or_default();
                if &*slot == new_val {
                    return false;
                }
                *slot = new_val.clone();
                self.mark_dirty(loc, obj);
                true
            }
            None => {
                let v = self.get_in(loc, obj);
                if v.is_empty() {
                    return false;
                }
                self.union_out(loc, obj, &v)
            }
        }
    }

    /// Weak-merge IN into OUT for every object with a live IN entry at
    /// `loc`. Returns whether anything changed.
    pub fn update_all_df_out_from_in(&mut self, loc: LocId) -> bool {
        let objs: Vec<NodeID> = self
            .in_objs
            .get(&loc)
            .map(|s| s.iter().copied().collect())
            .unwrap_or_default();
        let mut changed = false;
        for obj in objs {
            changed |= self.update_df_out_from_in(loc, obj, None);
        }
        changed
    }

    /// Top-level-variable write (not memory-region scoped).
    pub fn update_tlv_pts(&mut self, var: NodeID, src: &PointsTo) -> bool {
        self.tlv.entry(var).or_default().union_with(src)
    }

    pub fn get_tlv_pts(&self, var: NodeID) -> PointsTo {
        self.tlv.get(&var).cloned().unwrap_or_default()
    }

    pub fn dirty_out_vars(&self, loc: LocId) -> impl Iterator<Item = NodeID> + '_ {
        self.dirty_out_vars
            .get(&loc)
            .into_iter()
            .flat_map(|s| s.iter().copied())
    }

    pub fn clear_all_df_out_updated_var(&mut self, loc: LocId) {
        self.dirty_out_vars.remove(&loc);
    }
}

impl PointsToStore<(LocId, NodeID, DfDir)> for DataFlowPtsStore {
    fn get_pts(&self, key: (LocId, NodeID, DfDir)) -> PointsTo {
        match key.2 {
            DfDir::In => self.get_in(key.0, key.1),
            DfDir::Out => self.get_out(key.0, key.1),
        }
    }

    fn get_pts_in_place(&self, key: (LocId, NodeID, DfDir)) -> Option<&PointsTo> {
        match key.2 {
            DfDir::In => self.in_map.get(&(key.0, key.1)),
            DfDir::Out => self.out_map.get(&(key.0, key.1)),
        }
    }

    fn union_pts(&mut self, key: (LocId, NodeID, DfDir), src: &PointsTo) -> bool {
        match key.2 {
            DfDir::In => self.union_in(key.0, key.1, src),
            DfDir::Out => self.union_out(key.0, key.1, src),
        }
    }

    fn add_pts(&mut self, key: (LocId, NodeID, DfDir), obj: u32) -> bool {
        self.union_pts(key, &PointsTo::singleton(obj))
    }

    fn clear_pts(&mut self, key: (LocId, NodeID, DfDir)) {
        match key.2 {
            DfDir::In => {
                self.in_map.remove(&(key.0, key.1));
                if let Some(s) = self.in_objs.get_mut(&key.0) {
                    s.remove(&key.1);
                }
            }
            DfDir::Out => {
                self.out_map.remove(&(key.0, key.1));
            }
        }
    }

    fn get_all_pts(&self, live_only: bool) -> std::collections::HashMap<Vec<u32>, usize> {
        group_by_value(self.out_map.iter().map(|(&k, v)| (k, v)), live_only)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_from_in_propagates_and_reports_change() {
        let mut store = DataFlowPtsStore::new();
        let (l0, l1) = (LocId::new(0), LocId::new(1));
        let o = NodeID::new(5);
        store.union_in(l0, o, &PointsTo::from_iter([1, 2]));
        assert!(store.update_df_in_from_in(l0, o, l1));
        assert!(!store.update_df_in_from_in(l0, o, l1));
        assert_eq!(store.get_in(l1, o).iter().collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn weak_merge_unions_in_into_out() {
        let mut store = DataFlowPtsStore::new();
        let l = LocId::new(0);
        let o = NodeID::new(1);
        store.union_in(l, o, &PointsTo::from_iter([1]));
        store.union_out(l, o, &PointsTo::from_iter([2]));
        assert!(store.update_df_out_from_in(l, o, None));
        assert_eq!(store.get_out(l, o).iter().collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn strong_update_overwrites_out() {
        let mut store = DataFlowPtsStore::new();
        let l = LocId::new(0);
        let o = NodeID::new(1);
        store.union_out(l, o, &PointsTo::from_iter([99]));
        let mask = PointsTo::from_iter([7]);
        assert!(store.update_df_out_from_in(l, o, Some(&mask)));
        assert_eq!(store.get_out(l, o).iter().collect::<Vec<_>>(), vec![7]);
        assert!(!store.update_df_out_from_in(l, o, Some(&mask)));
    }

    #[test]
    fn dirty_out_vars_tracks_and_clears() {
        let mut store = DataFlowPtsStore::new();
        let l = LocId::new(0);
        store.union_out(l, NodeID::new(1), &PointsTo::singleton(1));
        store.union_out(l, NodeID::new(2), &PointsTo::singleton(2));
        let mut dirty: Vec<_> = store.dirty_out_vars(l).collect();
        dirty.sort();
        assert_eq!(dirty, vec![NodeID::new(1), NodeID::new(2)]);

        store.clear_all_df_out_updated_var(l);
        assert_eq!(store.dirty_out_vars(l).count(), 0);
    }

    #[test]
    fn update_all_df_out_from_in_covers_every_live_object() {
        let mut store = DataFlowPtsStore::new();
        let l = LocId::new(0);
        store.union_in(l, NodeID::new(1), &PointsTo::singleton(10));
        store.union_in(l, NodeID::new(2), &PointsTo::singleton(20));
        assert!(store.update_all_df_out_from_in(l));
        assert_eq!(store.get_out(l, NodeID::new(1)).iter().collect::<Vec<_>>(), vec![10]);
        assert_eq!(store.get_out(l, NodeID::new(2)).iter().collect::<Vec<_>>(), vec![20]);
    }

    #[test]
    fn tlv_write_is_independent_of_region_maps() {
        let mut store = DataFlowPtsStore::new();
        let v = NodeID::new(42);
        assert!(store.update_tlv_pts(v, &PointsTo::singleton(1)));
        assert!(!store.update_tlv_pts(v, &PointsTo::singleton(1)));
        assert_eq!(store.get_tlv_pts(v).iter().collect::<Vec<_>>(), vec![1]);
    }
}
