//! Flow-sensitive solver (C6): a worklist over an already-built SVFG,
//! tracking per-location/per-object points-to sets rather than the
//! flat per-variable sets Andersen (C3) computes (§4.6).

mod solver;

pub use solver::{FlowSensitiveResult, FlowSensitiveSolver};
