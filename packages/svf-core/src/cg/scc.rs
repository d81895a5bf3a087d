//! Nuutila's variant of Tarjan's SCC algorithm (§4.2): a single
//! depth-first pass assigns `dfn` on entry, folds `low = min(low,
//! low(succ))` from descendants, and emits an SCC on return when
//! `low == dfn`. Iterative (explicit stack) rather than the
//! recursive formulation of `scc_detector.rs::tarjan_dfs`, since
//! constraint graphs built from whole-program PAGs can exceed a
//! comfortable native call-stack depth.

use crate::cg::node::DirectKind;
use crate::cg::ConstraintNode;
use crate::ids::NodeID;
use rustc_hash::FxHashMap;

/// Which edge set a traversal follows: `Direct` (copy+gep) is used
/// by Andersen's outer SCC-over-copy-edges pass is actually `Copy`
/// only per §4.3 step (1); `Direct` is reserved for callers (e.g. the
/// SVFG optimizer) that must also fold gep edges into the same SCC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SccEdgeFlag {
    Direct,
    Copy,
}

impl SccEdgeFlag {
    fn follows(&self, kind: DirectKind) -> bool {
        match self {
            SccEdgeFlag::Direct => true,
            SccEdgeFlag::Copy => matches!(kind, DirectKind::Copy),
        }
    }
}

/// One discovered SCC: its members (lowest id first) and whether any
/// internal edge was a gep edge (positive-weight cycle, §4.2) and
/// whether any such gep edge was a `Variant` gep.
#[derive(Debug, Clone)]
pub struct Scc {
    pub members: Vec<NodeID>,
    pub is_pwc: bool,
    pub reaches_variant: bool,
}

enum Frame {
    Enter(NodeID),
    Exit(NodeID),
}

/// Runs SCC detection over `nodes` following `flag`'s edge set.
/// Returns every SCC with more than one member, or a single member
/// with a self-loop (a degenerate positive-weight cycle).
pub fn detect_scc(
    nodes: &FxHashMap<NodeID, ConstraintNode>,
    flag: SccEdgeFlag,
) -> Vec<Scc> {
    let mut index: FxHashMap<NodeID, u32> = FxHashMap::default();
    let mut lowlink: FxHashMap<NodeID, u32> = FxHashMap::default();
    let mut on_stack: FxHashMap<NodeID, bool> = FxHashMap::default();
    let mut tarjan_stack: Vec<NodeID> = Vec::new();
    let mut next_index: u32 = 0;
    let mut sccs = Vec::new();

    let mut ids: Vec<NodeID> = nodes.keys().copied().collect();
    ids.sort_by_key(|n| n.raw());

    for &start in &ids {
        if index.contains_key(&start) {
            continue;
        }
        let mut work: Vec<Frame> = vec![Frame::Enter(start)];
        while let Some(frame) = work.pop() {
            match frame {
                Frame::Enter(v) => {
                    if index.contains_key(&v) {
                        continue;
                    }
                    index.insert(v, next_index);
                    lowlink.insert(v, next_index);
                    next_index += 1;
                    tarjan_stack.push(v);
                    on_stack.insert(v, true);

                    work.push(Frame::Exit(v));
                    if let Some(node) = nodes.get(&v) {
                        let mut succs: Vec<NodeID> = node
                            .out_direct
                            .iter()
                            .filter(|(_, k)| flag.follows(*k))
                            .map(|(dst, _)| *dst)
                            .collect();
                        succs.sort_by_key(|n| n.raw());
                        for w in succs {
                            if !index.contains_key(&w) {
                                work.push(Frame::Enter(w));
                            } else if *on_stack.get(&w).unwrap_or(&false) {
                                let wi = index[&w];
                                let lv = lowlink[&v];
                                lowlink.insert(v, lv.min(wi));
                            }
                        }
                    }
                }
                Frame::Exit(v) => {
                    if let Some(node) = nodes.get(&v) {
                        let mut succs: Vec<NodeID> = node
                            .out_direct
                            .iter()
                            .filter(|(_, k)| flag.follows(*k))
                            .map(|(dst, _)| *dst)
                            .collect();
                        succs.sort_by_key(|n| n.raw());
                        for w in succs {
                            if let Some(&wl) = lowlink.get(&w) {
                                let lv = lowlink[&v];
                                lowlink.insert(v, lv.min(wl));
                            }
                        }
                    }

                    if lowlink[&v] == index[&v] {
                        let mut members = Vec::new();
                        loop {
                            let w = tarjan_stack.pop().expect("rep must be on stack");
                            on_stack.insert(w, false);
                            members.push(w);
                            if w == v {
                                break;
                            }
                        }
                        let is_pwc = members.iter().any(|&m| {
                            nodes
                                .get(&m)
                                .map(|n| {
                                    n.out_direct.iter().any(|(dst, k)| {
                                        k.is_gep() && (members.contains(dst) || *dst == m)
                                    })
                                })
                                .unwrap_or(false)
                        });
                        let reaches_variant = members.iter().any(|&m| {
                            nodes
                                .get(&m)
                                .map(|n| {
                                    n.out_direct.iter().any(|(dst, k)| {
                                        k.reaches_variant_obj()
                                            && (members.contains(dst) || *dst == m)
                                    })
                                })
                                .unwrap_or(false)
                        });
                        let has_cycle = members.len() > 1
                            || nodes.get(&v).map(|n| n.has_self_loop()).unwrap_or(false);
                        if has_cycle {
                            members.sort_by_key(|n| n.raw());
                            sccs.push(Scc {
                                members,
                                is_pwc,
                                reaches_variant,
                            });
                        }
                    }
                }
            }
        }
    }

    sccs
}
