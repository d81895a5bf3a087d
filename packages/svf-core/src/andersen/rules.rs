//! The six constraint rules of §4.3, parameterised over the set of
//! objects to process (`src_pts`): the full current points-to set for
//! the plain worklist, or just `diff(rep)` for wave propagation.

use crate::bitset::PointsTo;
use crate::cg::{ConstraintGraph, DirectKind};
use crate::ids::NodeID;
use crate::ports::frontend::{GepKind, ProgramAssignmentGraph};
use crate::pts_store::PointsToStore;
use crate::stats::AndersenStats;

use super::PtsBackend;

/// Addr `o -> p`: `pts(p) |= {o}`, once at initialization.
pub fn init_addr_edges(graph: &ConstraintGraph, pts: &mut PtsBackend, stats: &mut AndersenStats) {
    for node in graph.nodes() {
        for &ptr in &node.out_addr {
            if pts.add_pts(ptr, node.id.raw()) {
                stats.addr_processed += 1;
            }
        }
    }
}

/// NormalGep/VariantGep rules: rewrites `src_pts` through the rep's
/// outgoing gep edges, creating derived field/field-insensitive
/// objects on demand via the front end.
pub fn apply_gep_rules(
    graph: &mut ConstraintGraph,
    pts: &mut PtsBackend,
    pag: &mut dyn ProgramAssignmentGraph,
    rep: NodeID,
    src_pts: &PointsTo,
    stats: &mut AndersenStats,
) -> bool {
    let edges: Vec<(NodeID, DirectKind)> = match graph.node(rep) {
        Some(n) => n
            .out_direct
            .iter()
            .filter(|(_, k)| k.is_gep())
            .copied()
            .collect(),
        None => return false,
    };

    let mut changed = false;
    for (dst, kind) in edges {
        let gep_kind = match kind {
            DirectKind::Gep(g) => g,
            DirectKind::Copy => unreachable!("filtered to gep edges above"),
        };
        for o in src_pts.iter() {
            let obj = NodeID::new(o);
            match gep_kind {
                GepKind::Normal(off) => {
                    if graph.is_field_insensitive(obj) || pag.is_blk_obj_or_constant_obj(obj) {
                        changed |= pts.add_pts(dst, o);
                    } else {
                        let field_obj = pag.get_gep_obj_var(obj, off);
                        changed |= pts.add_pts(dst, field_obj.raw());
                    }
                    stats.gep_processed += 1;
                }
                GepKind::Variant => {
                    pag.set_field_insensitive(obj);
                    if !graph.is_field_insensitive(obj) {
                        stats.field_insensitive_widenings += 1;
                    }
                    graph.set_field_insensitive(obj);
                    let fi_obj = pag.get_fi_obj_var(obj);
                    changed |= pts.add_pts(dst, fi_obj.raw());
                    stats.gep_processed += 1;
                }
            }
        }
    }
    changed
}

/// Load/Store rules: for each `o` in `src_pts`, materialize a fresh
/// copy edge (`o -> q` for load, `q -> o` for store).
pub fn apply_load_store_rules(
    graph: &mut ConstraintGraph,
    rep: NodeID,
    src_pts: &PointsTo,
    stats: &mut AndersenStats,
) -> bool {
    let (loads, stores): (Vec<NodeID>, Vec<NodeID>) = match graph.node(rep) {
        Some(n) => (
            n.out_load.iter().copied().collect(),
            n.out_store.iter().copied().collect(),
        ),
        None => return false,
    };

    let mut changed = false;
    for o in src_pts.iter() {
        let obj = NodeID::new(o);
        for &q in &loads {
            changed |= graph.add_direct_edge(obj, q, DirectKind::Copy);
            stats.load_processed += 1;
        }
        for &q in &stores {
            changed |= graph.add_direct_edge(q, obj, DirectKind::Copy);
            stats.store_processed += 1;
        }
    }
    changed
}

/// Copy rule: `pts(q) |= src_pts` along every outgoing copy edge of
/// `rep`.
pub fn propagate_copy(
    graph: &ConstraintGraph,
    pts: &mut PtsBackend,
    rep: NodeID,
    src_pts: &PointsTo,
    stats: &mut AndersenStats,
) -> bool {
    if src_pts.is_empty() {
        return false;
    }
    let dsts: Vec<NodeID> = match graph.node(rep) {
        Some(n) => n
            .out_direct
            .iter()
            .filter(|(_, k)| !k.is_gep())
            .map(|(d, _)| *d)
            .collect(),
        None => return false,
    };
    let mut changed = false;
    for dst in dsts {
        changed |= pts.union_pts(dst, src_pts);
        stats.copy_processed += 1;
        stats.max_points_to_size = stats.max_points_to_size.max(pts.get_pts(dst).len());
    }
    changed
}
