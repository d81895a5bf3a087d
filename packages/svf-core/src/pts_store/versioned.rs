//! Versioned backend: `(NodeID, Version) -> PointsTo`, keyed by
//! address-taken object and the per-object-per-location version the
//! versioned flow-sensitive solver (C7) assigns it, plus a flat
//! top-level-variable map. Grounded on `ObjToVersionMap` /
//! `vPtD` in `original_source/include/WPA/VersionedFlowSensitive.h`.

use super::{group_by_value, PointsToStore};
use crate::bitset::PointsTo;
use crate::ids::{NodeID, Version};
use rustc_hash::FxHashMap;

/// Key into the versioned store: an address-taken object at a
/// specific version (`atKey` in the original).
pub type VersionedVar = (NodeID, Version);

#[derive(Debug, Clone, Default)]
pub struct VersionedPtsStore {
    map: FxHashMap<VersionedVar, PointsTo>,
    tlv: FxHashMap<NodeID, PointsTo>,
}

impl VersionedPtsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_tlv_pts(&self, var: NodeID) -> PointsTo {
        self.tlv.get(&var).cloned().unwrap_or_default()
    }

    pub fn union_tlv_pts(&mut self, var: NodeID, src: &PointsTo) -> bool {
        self.tlv.entry(var).or_default().union_with(src)
    }

    /// All versions ever recorded for `obj`, for version-reliance
    /// propagation bookkeeping.
    pub fn versions_of(&self, obj: NodeID) -> impl Iterator<Item = Version> + '_ {
        self.map
            .keys()
            .filter(move |(o, _)| *o == obj)
            .map(|(_, v)| *v)
    }
}

impl PointsToStore<VersionedVar> for VersionedPtsStore {
    fn get_pts(&self, key: VersionedVar) -> PointsTo {
        self.map.get(&key).cloned().unwrap_or_default()
    }

    fn get_pts_in_place(&self, key: VersionedVar) -> Option<&PointsTo> {
        self.map.get(&key)
    }

    fn union_pts(&mut self, key: VersionedVar, src: &PointsTo) -> bool {
        self.map.entry(key).or_default().union_with(src)
    }

    fn add_pts(&mut self, key: VersionedVar, obj: u32) -> bool {
        self.map.entry(key).or_default().insert(obj)
    }

    fn clear_pts(&mut self, key: VersionedVar) {
        self.map.remove(&key);
    }

    fn get_all_pts(&self, live_only: bool) -> std::collections::HashMap<Vec<u32>, usize> {
        group_by_value(self.map.iter().map(|(&k, v)| (k, v)), live_only)
    }
}
