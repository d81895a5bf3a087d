//! Versioned flow-sensitive solver (C7): meld-labelled version
//! assignment over the SVFG (§4.7), replacing the plain flow-sensitive
//! solver's per-location memory store with one keyed by `(object,
//! version)` plus a static version-reliance graph, so a change to one
//! object's points-to set only re-triggers the load/store statements
//! actually reliant on that version instead of every successor.

mod solver;

pub use solver::{VersionedFlowResult, VersionedFlowSolver};
