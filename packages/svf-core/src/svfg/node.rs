//! SVFG node and edge representation (C5), per §3/§4.5. A tagged
//! union dispatched once per processing routine, the same style as
//! `cg::node::DirectKind`/`ports::frontend::PagEdgeKind`, so the
//! flow-sensitive worklist's inner loop stays monomorphic rather than
//! going through a virtual call per node (§9 design note).
//!
//! SVFG node ids are their own dense space, distinct from the PAG/ICFG
//! node id a node corresponds to — §6's wire format carries both a
//! `SVFGNodeID` and an `ICFGNodeID` per line, so the two were never
//! meant to share a counter.

use crate::bitset::PointsTo;
use crate::ids::{CsId, MRVerId, NodeID};

/// What an SVFG node represents (§3's 23-variant list).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SvfgNodeKind {
    Addr,
    Copy,
    Gep,
    Load,
    Store,
    /// Intraprocedural merge of a top-level value (as opposed to
    /// `MSSAPhi`'s memory-region merge). Not produced by the builder
    /// itself in this port — top-level PAG statements are already in
    /// SSA form here, so a genuine top-level phi would only arise from
    /// a front end modeling non-SSA control flow directly; kept as a
    /// node kind for the optimizer's `InterPhi` rewiring target and for
    /// `io::svfg_format` round-tripping a front end that does emit one.
    Phi,
    Cmp,
    BinaryOp,
    UnaryOp,
    Branch,
    NullPtr,
    ActualParm { cs: CsId },
    FormalParm { func: NodeID },
    ActualRet { cs: CsId },
    FormalRet { func: NodeID },
    ActualIn { cs: CsId, mrver: MRVerId },
    ActualOut { cs: CsId, mrver: MRVerId },
    FormalIn { func: NodeID, mrver: MRVerId },
    FormalOut { func: NodeID, mrver: MRVerId },
    MSSAPhi { block: NodeID, mrver: MRVerId },
    /// Optimizer rule 1/2 output: a `FormalParm` or `ActualRet`
    /// coalesced into a PHI over the call edges that used to target it.
    InterPhi,
    /// Optimizer rule 4 output, the memory-SSA analogue of `InterPhi`:
    /// an `MSSAPhi` bypass that could not collapse to a single
    /// replacement edge because more than one `(pred, succ)` pair
    /// survived with distinct labels.
    InterMSSAPhi { mrver: MRVerId },
    /// Placeholder a reader creates for an edge endpoint the textual
    /// form doesn't carry a full node record for; never produced by
    /// `SvfgBuilder` itself.
    DummyVersionProp,
}

impl SvfgNodeKind {
    pub fn mrver(&self) -> Option<MRVerId> {
        match *self {
            SvfgNodeKind::ActualIn { mrver, .. }
            | SvfgNodeKind::ActualOut { mrver, .. }
            | SvfgNodeKind::FormalIn { mrver, .. }
            | SvfgNodeKind::FormalOut { mrver, .. }
            | SvfgNodeKind::MSSAPhi { mrver, .. }
            | SvfgNodeKind::InterMSSAPhi { mrver } => Some(mrver),
            _ => None,
        }
    }

    pub fn cs_id(&self) -> Option<CsId> {
        match *self {
            SvfgNodeKind::ActualParm { cs }
            | SvfgNodeKind::ActualRet { cs }
            | SvfgNodeKind::ActualIn { cs, .. }
            | SvfgNodeKind::ActualOut { cs, .. } => Some(cs),
            _ => None,
        }
    }

    /// Node kinds the optimizer may remove outright when unreferenced
    /// (§4.5 rule 6's removability criteria; the tri-state self-cycle
    /// policy and the FormalIn/ActualIn "retained" exceptions are
    /// applied by the optimizer itself, not here).
    pub fn is_parm_or_ret(&self) -> bool {
        matches!(
            self,
            SvfgNodeKind::ActualParm { .. }
                | SvfgNodeKind::FormalParm { .. }
                | SvfgNodeKind::ActualRet { .. }
                | SvfgNodeKind::FormalRet { .. }
        )
    }
}

#[derive(Debug, Clone)]
pub struct SvfgNode {
    pub id: NodeID,
    /// The ICFG/PAG location this node corresponds to: a statement id
    /// for Load/Store/Call-derived nodes, the defined value's PAG node
    /// id for Addr/Copy/Gep, the owning block for `MSSAPhi`.
    pub icfg_loc: NodeID,
    pub kind: SvfgNodeKind,
}

impl SvfgNode {
    pub fn mrver(&self) -> Option<MRVerId> {
        self.kind.mrver()
    }
}

/// A direct (top-level value) edge kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DirectVfKind {
    IntraDirect,
    CallDirect(CsId),
    RetDirect(CsId),
}

/// An indirect (memory object) edge kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndirectVfKind {
    IntraIndirect,
    CallIndirect(CsId),
    RetIndirect(CsId),
    ThreadMhpIndirect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VfEdgeKind {
    Direct(DirectVfKind),
    Indirect(IndirectVfKind),
}

impl VfEdgeKind {
    /// `true` for any edge that crosses a call or return boundary —
    /// the optimizer's `bothInterEdges` check (§9 open question) asks
    /// whether exactly one of a bypassed pair's two edges satisfies
    /// this.
    pub fn is_inter(&self) -> bool {
        self.cs_id().is_some()
    }

    pub fn cs_id(&self) -> Option<CsId> {
        match *self {
            VfEdgeKind::Direct(DirectVfKind::CallDirect(cs))
            | VfEdgeKind::Direct(DirectVfKind::RetDirect(cs))
            | VfEdgeKind::Indirect(IndirectVfKind::CallIndirect(cs))
            | VfEdgeKind::Indirect(IndirectVfKind::RetIndirect(cs)) => Some(cs),
            _ => None,
        }
    }

    pub fn is_indirect(&self) -> bool {
        matches!(self, VfEdgeKind::Indirect(_))
    }
}

#[derive(Debug, Clone)]
pub struct SvfgEdge {
    pub src: NodeID,
    pub dst: NodeID,
    pub kind: VfEdgeKind,
    /// Points-to label: the set of memory objects this edge carries
    /// flow for. Empty for direct edges, which name no object.
    pub label: PointsTo,
}
