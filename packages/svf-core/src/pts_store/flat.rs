//! Flat backend: `NodeID -> PointsTo`, for context-insensitive
//! Andersen (§4.1 backend 1).

use super::{group_by_value, PointsToStore};
use crate::bitset::PointsTo;
use crate::ids::NodeID;
use rustc_hash::FxHashMap;

#[derive(Debug, Clone, Default)]
pub struct FlatPtsStore {
    map: FxHashMap<NodeID, PointsTo>,
}

impl FlatPtsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = NodeID> + '_ {
        self.map.keys().copied()
    }
}

impl PointsToStore<NodeID> for FlatPtsStore {
    fn get_pts(&self, key: NodeID) -> PointsTo {
        self.map.get(&key).cloned().unwrap_or_default()
    }

    fn get_pts_in_place(&self, key: NodeID) -> Option<&PointsTo> {
        self.map.get(&key)
    }

    fn union_pts(&mut self, key: NodeID, src: &PointsTo) -> bool {
        self.map.entry(key).or_default().union_with(src)
    }

    fn add_pts(&mut self, key: NodeID, obj: u32) -> bool {
        self.map.entry(key).or_default().insert(obj)
    }

    fn clear_pts(&mut self, key: NodeID) {
        self.map.remove(&key);
    }

    fn get_all_pts(&self, live_only: bool) -> std::collections::HashMap<Vec<u32>, usize> {
        group_by_value(self.map.iter().map(|(&k, v)| (k, v)), live_only)
    }
}
