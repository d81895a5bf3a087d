//! External collaborator interfaces (spec.md §1, §6): the front-end
//! PAG/SVFIR and the class-hierarchy graph. The core never depends on
//! a concrete parser or CHG implementation, only on these traits.

pub mod frontend;
pub mod modref;

pub use frontend::{
    ClassHierarchyGraph, Icfg, PagEdge, PagEdgeKind, ProgramAssignmentGraph, StmtKind,
};
pub use modref::ModRefAnalysis;
