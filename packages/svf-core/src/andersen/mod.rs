//! Inclusion-based (Andersen) points-to solver (C3). `AndersenBase`
//! owns the constraint graph and the rule set common to both solving
//! disciplines; `AndersenBase::solve_once` runs the plain worklist,
//! `Andersen::solve` adds SCC collapsing and wave-diff propagation on
//! top (§4.3, and the `AndersenBase`/`Andersen` split in
//! `original_source/include/WPA/Andersen.h`).

mod backend;
mod rules;
mod solver;

pub use backend::PtsBackend;
pub use solver::{Andersen, AndersenBase, AndersenResult};
