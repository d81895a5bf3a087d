//! Sparse value-flow graph: construction over a solved PAG + MemSSA
//! (§4.5 "Nodes"/"Edges") and optimization (§4.5 "Optimizer").

mod builder;
mod node;
mod optimizer;

pub use builder::{Svfg, SvfgBuilder};
pub use node::{DirectVfKind, IndirectVfKind, SvfgEdge, SvfgNode, SvfgNodeKind, VfEdgeKind};
pub use optimizer::SvfgOptimizer;
