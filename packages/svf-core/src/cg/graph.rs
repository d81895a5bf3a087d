//! The constraint graph itself: dense nodes plus the union-find that
//! maintains `rep(n) = find(n)` as an invariant after every mutation
//! (§3, §4.2).

use super::node::DirectKind;
use super::scc::{detect_scc, Scc, SccEdgeFlag};
use super::union_find::UnionFind;
use super::ConstraintNode;
use crate::ids::NodeID;
use rustc_hash::{FxHashMap, FxHashSet};

#[derive(Debug, Clone, Default)]
pub struct ConstraintGraph {
    nodes: FxHashMap<NodeID, ConstraintNode>,
    uf: UnionFind,
    field_insensitive: FxHashSet<NodeID>,
    pwc_reps: FxHashSet<NodeID>,
}

impl ConstraintGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ensure_node(&mut self, id: NodeID) {
        self.uf.make_set(id.raw());
        self.nodes.entry(id).or_insert_with(|| ConstraintNode::new(id));
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn contains(&self, id: NodeID) -> bool {
        self.nodes.contains_key(&id)
    }

    /// `rep(n) = find(n)`: the current representative of `n`'s SCC.
    pub fn rep(&mut self, n: NodeID) -> NodeID {
        NodeID::new(self.uf.find(n.raw()))
    }

    pub fn rep_readonly(&self, n: NodeID) -> NodeID {
        NodeID::new(self.uf.find_readonly(n.raw()))
    }

    pub fn is_rep(&mut self, n: NodeID) -> bool {
        self.rep(n) == n
    }

    pub fn is_field_insensitive(&self, n: NodeID) -> bool {
        self.field_insensitive.contains(&n)
    }

    pub fn set_field_insensitive(&mut self, n: NodeID) {
        self.field_insensitive.insert(n);
    }

    pub fn is_pwc_rep(&self, n: NodeID) -> bool {
        self.pwc_reps.contains(&n)
    }

    pub fn node(&self, id: NodeID) -> Option<&ConstraintNode> {
        self.nodes.get(&id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &ConstraintNode> {
        self.nodes.values()
    }

    pub fn add_addr_edge(&mut self, obj: NodeID, ptr: NodeID) -> bool {
        self.ensure_node(obj);
        self.ensure_node(ptr);
        self.nodes.get_mut(&obj).unwrap().out_addr.insert(ptr)
    }

    pub fn add_direct_edge(&mut self, src: NodeID, dst: NodeID, kind: DirectKind) -> bool {
        self.ensure_node(src);
        self.ensure_node(dst);
        let added_out = self
            .nodes
            .get_mut(&src)
            .unwrap()
            .out_direct
            .insert((dst, kind));
        self.nodes
            .get_mut(&dst)
            .unwrap()
            .in_direct
            .insert((src, kind));
        added_out
    }

    pub fn add_load_edge(&mut self, p: NodeID, q: NodeID) -> bool {
        self.ensure_node(p);
        self.ensure_node(q);
        let added = self.nodes.get_mut(&p).unwrap().out_load.insert(q);
        self.nodes.get_mut(&q).unwrap().in_load.insert(p);
        added
    }

    pub fn add_store_edge(&mut self, q: NodeID, p: NodeID) -> bool {
        self.ensure_node(p);
        self.ensure_node(q);
        let added = self.nodes.get_mut(&p).unwrap().out_store.insert(q);
        self.nodes.get_mut(&q).unwrap().in_store.insert(p);
        added
    }

    /// Runs SCC detection over `flag`'s edge set and collapses every
    /// discovered SCC into its lowest-id member. Returns the list of
    /// SCCs merged this pass (for statistics).
    pub fn detect_and_collapse(&mut self, flag: SccEdgeFlag) -> Vec<Scc> {
        let sccs = detect_scc(&self.nodes, flag);
        let nontrivial = sccs.iter().filter(|s| s.members.len() > 1).count();
        tracing::debug!(total = sccs.len(), nontrivial, "scc detection");
        for scc in &sccs {
            self.collapse(scc);
        }
        sccs
    }

    fn collapse(&mut self, scc: &Scc) {
        if scc.members.len() < 2 {
            // Self-loop-only SCC: still flag PWC/field-insensitivity,
            // nothing to merge.
            let m = scc.members[0];
            if scc.is_pwc {
                self.pwc_reps.insert(m);
            }
            if scc.reaches_variant {
                self.set_field_insensitive(m);
            }
            return;
        }

        let rep = *scc.members.iter().min_by_key(|n| n.raw()).unwrap();
        for &member in &scc.members {
            if member == rep {
                continue;
            }
            self.uf.union_min(rep.raw(), member.raw());
            // union_min always keeps the lower id; rep is already the
            // minimum of the SCC so this is a no-op on the union-find
            // side beyond recording the link, but we still must move
            // the member's edges onto rep.
            self.merge_node_into(rep, member);
        }

        if scc.is_pwc {
            self.pwc_reps.insert(rep);
        }
        if scc.reaches_variant {
            self.set_field_insensitive(rep);
        }
    }

    /// Moves every edge touching `member` onto `rep`, dropping
    /// self-loops that result, then removes `member`'s node record.
    fn merge_node_into(&mut self, rep: NodeID, member: NodeID) {
        let taken = match self.nodes.remove(&member) {
            Some(n) => n,
            None => return,
        };

        for dst in taken.out_addr {
            let dst = self.canon(dst);
            if dst != rep {
                self.nodes.get_mut(&rep).unwrap().out_addr.insert(dst);
            }
        }
        for (dst, kind) in taken.out_direct {
            let dst = self.canon(dst);
            if dst != rep {
                self.add_direct_edge(rep, dst, kind);
            }
        }
        for (src, kind) in taken.in_direct {
            let src = self.canon(src);
            if src != rep {
                self.add_direct_edge(src, rep, kind);
            }
        }
        for dst in taken.out_load {
            let dst = self.canon(dst);
            if dst != rep {
                self.add_load_edge(rep, dst);
            }
        }
        for src in taken.in_load {
            let src = self.canon(src);
            if src != rep {
                self.add_load_edge(src, rep);
            }
        }
        for dst in taken.out_store {
            let dst = self.canon(dst);
            if dst != rep {
                self.add_store_edge(dst, rep);
            }
        }
        for src in taken.in_store {
            let src = self.canon(src);
            if src != rep {
                self.add_store_edge(src, rep);
            }
        }

        // Rewire edge-endpoints recorded against `member` anywhere
        // else in the graph (neighbors whose in/out sets still name
        // `member` directly, not through the pairs just rehomed).
        self.rewrite_endpoint(member, rep);

        if self.field_insensitive.remove(&member) {
            self.field_insensitive.insert(rep);
        }
        if self.pwc_reps.remove(&member) {
            self.pwc_reps.insert(rep);
        }
    }

    fn canon(&self, n: NodeID) -> NodeID {
        NodeID::new(self.uf.find_readonly(n.raw()))
    }

    fn rewrite_endpoint(&mut self, from: NodeID, to: NodeID) {
        for node in self.nodes.values_mut() {
            node.out_addr = node
                .out_addr
                .iter()
                .map(|&d| if d == from { to } else { d })
                .collect();
            node.out_direct = node
                .out_direct
                .iter()
                .map(|&(d, k)| if d == from { (to, k) } else { (d, k) })
                .collect();
            node.in_direct = node
                .in_direct
                .iter()
                .map(|&(s, k)| if s == from { (to, k) } else { (s, k) })
                .collect();
            node.out_load = node
                .out_load
                .iter()
                .map(|&d| if d == from { to } else { d })
                .collect();
            node.in_load = node
                .in_load
                .iter()
                .map(|&s| if s == from { to } else { s })
                .collect();
            node.out_store = node
                .out_store
                .iter()
                .map(|&d| if d == from { to } else { d })
                .collect();
            node.in_store = node
                .in_store
                .iter()
                .map(|&s| if s == from { to } else { s })
                .collect();
        }
    }
}
