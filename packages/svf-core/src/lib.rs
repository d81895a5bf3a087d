//! Whole-program pointer analysis core: an inclusion-based (Andersen)
//! constraint solver, memory-SSA construction over address-taken
//! objects, a sparse value-flow graph built from both, and flow-
//! sensitive solvers (plain and versioned) over that graph.
//!
//! This crate owns the algorithms (§4) and their data model (§3); it
//! never parses source itself — a front end hands it a
//! [`ports::ProgramAssignmentGraph`]/[`ports::Icfg`]/
//! [`ports::ClassHierarchyGraph`]/[`ports::ModRefAnalysis`] built from
//! whatever IR it reads.

pub mod alarm;
pub mod analyzer;
pub mod andersen;
pub mod bitset;
pub mod callgraph;
pub mod cg;
pub mod config;
pub mod errors;
pub mod fs;
pub mod ids;
pub mod io;
pub mod memssa;
pub mod ports;
pub mod pts_store;
pub mod stats;
pub mod svfg;
pub mod vfs;

pub use analyzer::Analyzer;
pub use andersen::{Andersen, AndersenBase, AndersenResult, PtsBackend};
pub use bitset::PointsTo;
pub use callgraph::{update_call_graph, CallGraphCache};
pub use config::AnalysisConfig;
pub use errors::{Result, SvfError};
pub use fs::{FlowSensitiveResult, FlowSensitiveSolver};
pub use memssa::{MemSsa, MemSsaBuilder, RegionPartition};
pub use stats::RunStats;
pub use svfg::{Svfg, SvfgBuilder, SvfgOptimizer};
pub use vfs::{VersionedFlowResult, VersionedFlowSolver};
