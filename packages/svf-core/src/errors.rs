//! Error types for svf-core.
//!
//! Mirrors the category split required by the analysis design:
//! configuration rejection happens before a run starts, invariant
//! violations abort a run in progress, IO errors are isolated to
//! serialization, and a fired time budget is a controlled
//! cancellation rather than a failure.

use thiserror::Error;

/// Crate-wide error type.
#[derive(Debug, Error)]
pub enum SvfError {
    /// Option combination rejected before the run starts (e.g.
    /// requesting a plain-mapping store together with cluster-FS).
    #[error("configuration error: {0}")]
    Config(String),

    /// An algorithmic pre-condition failed mid-run: a missing `MRVer`
    /// during SSA rename, a missing base object when cloning a GEP
    /// node, an unknown SVFG node kind during processing, and so on.
    /// Non-recoverable: the run must abort.
    #[error("invariant violated: {0}")]
    InvariantViolated(String),

    /// Serialization read/write failure. Read failures are
    /// recoverable (the caller may fall through to recompute); write
    /// failures are reported as-is.
    #[error("IO error: {0}")]
    Io(String),

    /// The analysis alarm fired. Cancels the current worklist loop
    /// cleanly at the next outer-loop boundary; not an error in the
    /// traditional sense, but routed through the same channel so
    /// callers handle it with `?`.
    #[error("analysis budget exceeded")]
    Budget,
}

impl SvfError {
    pub fn config(msg: impl Into<String>) -> Self {
        SvfError::Config(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        SvfError::InvariantViolated(msg.into())
    }

    pub fn io(msg: impl Into<String>) -> Self {
        SvfError::Io(msg.into())
    }

    /// True for errors a caller may recover from by falling back to
    /// recomputing the result (per spec: IO-on-read is recoverable).
    pub fn is_recoverable_io(&self) -> bool {
        matches!(self, SvfError::Io(_))
    }
}

impl From<std::io::Error> for SvfError {
    fn from(e: std::io::Error) -> Self {
        SvfError::Io(e.to_string())
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, SvfError>;
