//! Coarse time-limit ("analysis alarm"), armed before `analyze()` and
//! checked only at outer-loop boundaries (§5: "There are no
//! cancellation points inside the fixpoint loops").

use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct AnalysisAlarm {
    deadline: Option<Instant>,
}

impl AnalysisAlarm {
    /// No time limit.
    pub fn unbounded() -> Self {
        Self { deadline: None }
    }

    pub fn with_limit(limit: Duration) -> Self {
        Self {
            deadline: Some(Instant::now() + limit),
        }
    }

    pub fn from_secs(secs: Option<u64>) -> Self {
        match secs {
            Some(s) => Self::with_limit(Duration::from_secs(s)),
            None => Self::unbounded(),
        }
    }

    /// Check at an outer-loop boundary only; never inside a fixpoint
    /// worklist loop.
    #[inline]
    pub fn fired(&self) -> bool {
        matches!(self.deadline, Some(d) if Instant::now() >= d)
    }
}
