//! Points-to data store (C1): four backends selected at construction,
//! uniform in their core operation signatures (spec.md §4.1).

pub mod dataflow;
pub mod differential;
pub mod flat;
pub mod versioned;

pub use dataflow::DataFlowPtsStore;
pub use differential::DifferentialPtsStore;
pub use flat::FlatPtsStore;
pub use versioned::VersionedPtsStore;

use crate::bitset::PointsTo;

/// Core operations every backend exposes, keyed by `K`:
/// `getPts`, `unionPts`, `addPts`, `clearPts`, `getAllPts`.
///
/// Reads return an owned copy (§5: "points-to sets are value-copied
/// on read unless explicitly referenced in place"); `in_place` exists
/// for the hot paths that must avoid the clone.
pub trait PointsToStore<K> {
    fn get_pts(&self, key: K) -> PointsTo;
    fn get_pts_in_place(&self, key: K) -> Option<&PointsTo>;
    fn union_pts(&mut self, key: K, src: &PointsTo) -> bool;
    fn add_pts(&mut self, key: K, obj: u32) -> bool;
    fn clear_pts(&mut self, key: K);
    /// Grouped-by-identical-set statistic: `pts value -> count of keys
    /// holding it`. `live_only` restricts to keys whose set is
    /// non-empty.
    fn get_all_pts(&self, live_only: bool) -> std::collections::HashMap<Vec<u32>, usize>;
}

pub(crate) fn group_by_value<'a, K>(
    entries: impl Iterator<Item = (K, &'a PointsTo)>,
    live_only: bool,
) -> std::collections::HashMap<Vec<u32>, usize> {
    let mut map: std::collections::HashMap<Vec<u32>, usize> = std::collections::HashMap::new();
    for (_, pts) in entries {
        if live_only && pts.is_empty() {
            continue;
        }
        let key: Vec<u32> = pts.iter().collect();
        *map.entry(key).or_insert(0) += 1;
    }
    map
}
