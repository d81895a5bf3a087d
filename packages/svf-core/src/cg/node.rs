//! Per-node edge storage, segregated by the four edge classes §4.2
//! names: addr, direct (copy+gep), load, store.

use crate::ids::NodeID;
use crate::ports::frontend::GepKind;
use rustc_hash::FxHashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DirectKind {
    Copy,
    Gep(GepKind),
}

impl DirectKind {
    pub fn is_gep(&self) -> bool {
        matches!(self, DirectKind::Gep(_))
    }

    pub fn reaches_variant_obj(&self) -> bool {
        matches!(self, DirectKind::Gep(GepKind::Variant))
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConstraintNode {
    pub id: NodeID,
    /// `Addr o -> p`: this node is `o`; `out_addr` holds every `p`.
    pub out_addr: FxHashSet<NodeID>,
    pub out_direct: FxHashSet<(NodeID, DirectKind)>,
    pub in_direct: FxHashSet<(NodeID, DirectKind)>,
    /// `Load *p -> q`: this node is `p`; `out_load` holds every `q`.
    pub out_load: FxHashSet<NodeID>,
    pub in_load: FxHashSet<NodeID>,
    /// `Store q -> *p`: this node is `p`; `out_store` holds every `q`.
    pub out_store: FxHashSet<NodeID>,
    pub in_store: FxHashSet<NodeID>,
}

impl ConstraintNode {
    pub fn new(id: NodeID) -> Self {
        Self {
            id,
            ..Default::default()
        }
    }

    pub fn has_self_loop(&self) -> bool {
        self.out_direct.iter().any(|(dst, _)| *dst == self.id)
    }
}
