//! Dominator tree and dominance-frontier computation over a single
//! function's ICFG blocks.
//!
//! `Icfg` exposes only `successors`/`predecessors`/`blocks`/
//! `entry_block`; no front end in this crate's dependency graph is
//! asked to hand back a dominator tree directly, so MemSSA's phi
//! placement (`insertPHI`, §4.4 step 2) needs its own computation.
//! Cooper, Harvey & Kennedy's "A Simple, Fast Dominance Algorithm"
//! (2001) is the standard iterative alternative to the Lengauer-Tarjan
//! algorithm SVF itself links against (LLVM's `DominatorTree`); it
//! needs no auxiliary DFS-numbering structure beyond a reverse
//! postorder, which this module computes once per function.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::ids::NodeID;
use crate::ports::frontend::Icfg;

/// Dominance facts for one function, computed once and consulted by
/// `createMUCHI`'s reachability check and `SSARename`'s tree walk.
pub struct Dominance {
    rpo: Vec<NodeID>,
    rpo_index: FxHashMap<NodeID, usize>,
    idom: FxHashMap<NodeID, NodeID>,
    children: FxHashMap<NodeID, Vec<NodeID>>,
    frontier: FxHashMap<NodeID, FxHashSet<NodeID>>,
}

impl Dominance {
    /// Computes dominance over every block reachable from `func`'s
    /// entry. Blocks `Icfg::blocks` lists but that are unreachable
    /// from entry (dead code, or blocks belonging to a function the
    /// front end listed incompletely) are simply absent from every
    /// map here; callers must not assume `blocks(func)` and
    /// `reachable_blocks()` agree in length.
    pub fn compute(icfg: &dyn Icfg, func: NodeID) -> Self {
        let entry = icfg.entry_block(func);
        let rpo = reverse_postorder(icfg, entry);
        let mut rpo_index = FxHashMap::default();
        for (i, &b) in rpo.iter().enumerate() {
            rpo_index.insert(b, i);
        }

        let idom = compute_idom(icfg, &rpo, &rpo_index, entry);
        let children = build_children(&idom, entry);
        let frontier = compute_frontier(icfg, &rpo, &idom, entry);

        Dominance {
            rpo,
            rpo_index,
            idom,
            children,
            frontier,
        }
    }

    pub fn reachable_blocks(&self) -> &[NodeID] {
        &self.rpo
    }

    pub fn is_reachable(&self, block: NodeID) -> bool {
        self.rpo_index.contains_key(&block)
    }

    pub fn idom(&self, block: NodeID) -> Option<NodeID> {
        self.idom.get(&block).copied()
    }

    /// Dominator-tree children, in no particular order beyond being
    /// stable across calls (sorted by raw id) so `SSARename`'s DFS is
    /// deterministic.
    pub fn dom_tree_children(&self, block: NodeID) -> &[NodeID] {
        self.children.get(&block).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn frontier(&self, block: NodeID) -> impl Iterator<Item = NodeID> + '_ {
        self.frontier
            .get(&block)
            .into_iter()
            .flat_map(|s| s.iter().copied())
    }

    /// `a` strictly or non-strictly dominates `b` (per `strict`),
    /// walking the idom chain from `b` up to the root.
    pub fn dominates(&self, a: NodeID, b: NodeID) -> bool {
        if a == b {
            return true;
        }
        let mut cur = b;
        while let Some(&idom) = self.idom.get(&cur) {
            if idom == cur {
                break;
            }
            if idom == a {
                return true;
            }
            cur = idom;
        }
        false
    }
}

fn reverse_postorder(icfg: &dyn Icfg, entry: NodeID) -> Vec<NodeID> {
    let mut visited = FxHashSet::default();
    let mut postorder = Vec::new();
    let mut stack: Vec<(NodeID, usize, Vec<NodeID>)> = Vec::new();

    visited.insert(entry);
    stack.push((entry, 0, icfg.successors(entry)));

    while let Some((node, mut idx, succs)) = stack.pop() {
        if idx < succs.len() {
            let next = succs[idx];
            idx += 1;
            let resume_succs = succs.clone();
            stack.push((node, idx, resume_succs));
            if visited.insert(next) {
                stack.push((next, 0, icfg.successors(next)));
            }
        } else {
            postorder.push(node);
        }
    }

    postorder.reverse();
    postorder
}

fn compute_idom(
    icfg: &dyn Icfg,
    rpo: &[NodeID],
    rpo_index: &FxHashMap<NodeID, usize>,
    entry: NodeID,
) -> FxHashMap<NodeID, NodeID> {
    let mut idom: FxHashMap<NodeID, NodeID> = FxHashMap::default();
    idom.insert(entry, entry);

    let mut changed = true;
    while changed {
        changed = false;
        for &b in rpo.iter() {
            if b == entry {
                continue;
            }
            let preds = icfg.predecessors(b);
            let mut new_idom: Option<NodeID> = None;
            for p in preds {
                if !idom.contains_key(&p) {
                    continue;
                }
                new_idom = Some(match new_idom {
                    None => p,
                    Some(cur) => intersect(&idom, rpo_index, cur, p),
                });
            }
            if let Some(ni) = new_idom {
                if idom.get(&b) != Some(&ni) {
                    idom.insert(b, ni);
                    changed = true;
                }
            }
        }
    }

    idom
}

fn intersect(
    idom: &FxHashMap<NodeID, NodeID>,
    rpo_index: &FxHashMap<NodeID, usize>,
    mut a: NodeID,
    mut b: NodeID,
) -> NodeID {
    while a != b {
        while rpo_index[&a] > rpo_index[&b] {
            a = idom[&a];
        }
        while rpo_index[&b] > rpo_index[&a] {
            b = idom[&b];
        }
    }
    a
}

fn build_children(idom: &FxHashMap<NodeID, NodeID>, entry: NodeID) -> FxHashMap<NodeID, Vec<NodeID>> {
    let mut children: FxHashMap<NodeID, Vec<NodeID>> = FxHashMap::default();
    for (&b, &d) in idom.iter() {
        if b != entry {
            children.entry(d).or_default().push(b);
        }
    }
    for v in children.values_mut() {
        v.sort_by_key(|n| n.raw());
    }
    children
}

fn compute_frontier(
    icfg: &dyn Icfg,
    rpo: &[NodeID],
    idom: &FxHashMap<NodeID, NodeID>,
    entry: NodeID,
) -> FxHashMap<NodeID, FxHashSet<NodeID>> {
    let mut df: FxHashMap<NodeID, FxHashSet<NodeID>> = FxHashMap::default();
    for &b in rpo {
        let preds = icfg.predecessors(b);
        if preds.len() < 2 {
            continue;
        }
        let id_b = match idom.get(&b) {
            Some(&d) => d,
            None => continue,
        };
        for p in preds {
            if !idom.contains_key(&p) {
                continue;
            }
            let mut runner = p;
            while runner != id_b {
                df.entry(runner).or_default().insert(b);
                let next = idom[&runner];
                if next == runner {
                    break;
                }
                runner = next;
            }
        }
    }
    let _ = entry;
    df
}

#[cfg(test)]
mod tests {
    use super::*;
    use rustc_hash::FxHashMap as HMap;

    /// A diamond: entry -> (l, r) -> join.
    struct DiamondIcfg;
    const ENTRY: u32 = 0;
    const L: u32 = 1;
    const R: u32 = 2;
    const JOIN: u32 = 3;

    impl Icfg for DiamondIcfg {
        fn functions(&self) -> Vec<NodeID> {
            vec![NodeID::new(ENTRY)]
        }
        fn entry_block(&self, _func: NodeID) -> NodeID {
            NodeID::new(ENTRY)
        }
        fn blocks(&self, _func: NodeID) -> Vec<NodeID> {
            vec![ENTRY, L, R, JOIN].into_iter().map(NodeID::new).collect()
        }
        fn successors(&self, block: NodeID) -> Vec<NodeID> {
            match block.raw() {
                ENTRY => vec![NodeID::new(L), NodeID::new(R)],
                L | R => vec![NodeID::new(JOIN)],
                _ => vec![],
            }
        }
        fn predecessors(&self, block: NodeID) -> Vec<NodeID> {
            match block.raw() {
                L | R => vec![NodeID::new(ENTRY)],
                JOIN => vec![NodeID::new(L), NodeID::new(R)],
                _ => vec![],
            }
        }
        fn has_reachable_return(&self, _func: NodeID) -> bool {
            true
        }
        fn statements(&self, _block: NodeID) -> Vec<NodeID> {
            vec![]
        }
        fn stmt_kind(&self, _stmt: NodeID) -> crate::ports::frontend::StmtKind {
            crate::ports::frontend::StmtKind::Other
        }
        fn function_of(&self, _node: NodeID) -> Option<NodeID> {
            Some(NodeID::new(ENTRY))
        }
    }

    #[test]
    fn diamond_idom_is_entry_for_join() {
        let dom = Dominance::compute(&DiamondIcfg, NodeID::new(ENTRY));
        assert_eq!(dom.idom(NodeID::new(JOIN)), Some(NodeID::new(ENTRY)));
        assert_eq!(dom.idom(NodeID::new(L)), Some(NodeID::new(ENTRY)));
        assert_eq!(dom.idom(NodeID::new(R)), Some(NodeID::new(ENTRY)));
    }

    #[test]
    fn diamond_frontier_of_branches_is_join() {
        let dom = Dominance::compute(&DiamondIcfg, NodeID::new(ENTRY));
        let front: Vec<NodeID> = dom.frontier(NodeID::new(L)).collect();
        assert_eq!(front, vec![NodeID::new(JOIN)]);
        let front_r: Vec<NodeID> = dom.frontier(NodeID::new(R)).collect();
        assert_eq!(front_r, vec![NodeID::new(JOIN)]);
        let front_entry: Vec<NodeID> = dom.frontier(NodeID::new(ENTRY)).collect();
        assert!(front_entry.is_empty());
    }

    #[test]
    fn entry_dominates_everything() {
        let dom = Dominance::compute(&DiamondIcfg, NodeID::new(ENTRY));
        assert!(dom.dominates(NodeID::new(ENTRY), NodeID::new(JOIN)));
        assert!(!dom.dominates(NodeID::new(L), NodeID::new(R)));
    }

    #[test]
    fn dom_tree_children_of_entry_are_l_and_r() {
        let dom = Dominance::compute(&DiamondIcfg, NodeID::new(ENTRY));
        let mut kids: Vec<u32> = dom
            .dom_tree_children(NodeID::new(ENTRY))
            .iter()
            .map(|n| n.raw())
            .collect();
        kids.sort();
        assert_eq!(kids, vec![L, R]);
    }

    #[test]
    fn reachable_blocks_is_all_four_in_a_diamond() {
        let dom = Dominance::compute(&DiamondIcfg, NodeID::new(ENTRY));
        assert_eq!(dom.reachable_blocks().len(), 4);
        let m: HMap<u32, ()> = dom.reachable_blocks().iter().map(|n| (n.raw(), ())).collect();
        assert!(m.contains_key(&JOIN));
    }
}
