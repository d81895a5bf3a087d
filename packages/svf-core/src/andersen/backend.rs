//! Selects which C1 backend the solver reads/writes points-to
//! through. `diff_pts = true` (§6 `diff-pts`) picks the differential
//! store so wave propagation can read `diff(rep)` cheaply;
//! `diff_pts = false` falls back to the flat store and a plain
//! worklist, trading propagation efficiency for simplicity.

use crate::bitset::PointsTo;
use crate::ids::NodeID;
use crate::pts_store::{DifferentialPtsStore, FlatPtsStore, PointsToStore};

#[derive(Debug, Clone)]
pub enum PtsBackend {
    Flat(FlatPtsStore),
    Differential(DifferentialPtsStore),
}

impl PtsBackend {
    pub fn new(diff_pts: bool) -> Self {
        if diff_pts {
            PtsBackend::Differential(DifferentialPtsStore::new())
        } else {
            PtsBackend::Flat(FlatPtsStore::new())
        }
    }

    pub fn is_differential(&self) -> bool {
        matches!(self, PtsBackend::Differential(_))
    }

    pub fn as_differential_mut(&mut self) -> Option<&mut DifferentialPtsStore> {
        match self {
            PtsBackend::Differential(s) => Some(s),
            PtsBackend::Flat(_) => None,
        }
    }
}

impl PointsToStore<NodeID> for PtsBackend {
    fn get_pts(&self, key: NodeID) -> PointsTo {
        match self {
            PtsBackend::Flat(s) => s.get_pts(key),
            PtsBackend::Differential(s) => s.get_pts(key),
        }
    }

    fn get_pts_in_place(&self, key: NodeID) -> Option<&PointsTo> {
        match self {
            PtsBackend::Flat(s) => s.get_pts_in_place(key),
            PtsBackend::Differential(s) => s.get_pts_in_place(key),
        }
    }

    fn union_pts(&mut self, key: NodeID, src: &PointsTo) -> bool {
        match self {
            PtsBackend::Flat(s) => s.union_pts(key, src),
            PtsBackend::Differential(s) => s.union_pts(key, src),
        }
    }

    fn add_pts(&mut self, key: NodeID, obj: u32) -> bool {
        match self {
            PtsBackend::Flat(s) => s.add_pts(key, obj),
            PtsBackend::Differential(s) => s.add_pts(key, obj),
        }
    }

    fn clear_pts(&mut self, key: NodeID) {
        match self {
            PtsBackend::Flat(s) => s.clear_pts(key),
            PtsBackend::Differential(s) => s.clear_pts(key),
        }
    }

    fn get_all_pts(&self, live_only: bool) -> std::collections::HashMap<Vec<u32>, usize> {
        match self {
            PtsBackend::Flat(s) => s.get_all_pts(live_only),
            PtsBackend::Differential(s) => s.get_all_pts(live_only),
        }
    }
}
