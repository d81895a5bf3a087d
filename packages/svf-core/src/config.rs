//! Typed shape of the recognized options (spec.md §6).
//!
//! Parsing them from a CLI or config file is out of scope for this
//! crate (front-end concern); this module only owns the validated,
//! serializable struct a driver populates and passes to [`crate::analyzer::Analyzer`].

use crate::errors::{Result, SvfError};
use serde::{Deserialize, Serialize};

/// MemSSA region partition strategy (§4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MemPartitionStrategy {
    /// One region per base object.
    Distinct,
    /// Per-function disjoint union of objects touched together.
    IntraDisjoint,
    /// Program-wide disjoint union.
    InterDisjoint,
}

/// MSSA-PHI self-cycle policy used by the SVFG optimizer (§4.5 rule 5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SelfCyclePolicy {
    /// Keep every self loop.
    All,
    /// Keep only call/ret self-loops.
    Context,
    /// Remove all indirect self-loops before bypass.
    None,
}

/// The full recognized option set of spec.md §6.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// `mem-par`
    pub mem_partition: MemPartitionStrategy,
    /// `opt-svfg`
    pub optimize_svfg: bool,
    /// `self-cycle`
    pub self_cycle_policy: SelfCyclePolicy,
    /// `keep-aofi`: keep ActualOut/FormalIn nodes.
    pub keep_actual_out_formal_in: bool,
    /// `write-svfg`
    pub write_svfg_path: Option<String>,
    /// `read-svfg`
    pub read_svfg_path: Option<String>,
    /// `fs-time-limit`, seconds. `None` means unlimited.
    pub fs_time_limit_secs: Option<u64>,
    /// `detect-pwc`
    pub detect_pwc: bool,
    /// `diff-pts`: use the differential points-to store / wave-diff
    /// discipline rather than the plain worklist.
    pub diff_pts: bool,
    /// `max-field-limit`: 0 disables field sensitivity.
    pub max_field_limit: u32,
    /// `cxt-limit`: maximum context-string length for DDA consumers.
    pub cxt_limit: u32,
    /// Selects C7 (meld-versioned) over C6 (plain worklist) as the
    /// flow-sensitive engine `Analyzer::run` drives. C7 is a drop-in
    /// replacement for C6 that answers the same queries faster on
    /// large SVFGs, so it's the default; C6 stays reachable directly
    /// for callers that want the simpler reference engine.
    pub use_versioned_flow: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            mem_partition: MemPartitionStrategy::IntraDisjoint,
            optimize_svfg: true,
            self_cycle_policy: SelfCyclePolicy::Context,
            keep_actual_out_formal_in: false,
            write_svfg_path: None,
            read_svfg_path: None,
            fs_time_limit_secs: None,
            detect_pwc: true,
            diff_pts: true,
            max_field_limit: 512,
            cxt_limit: 3,
            use_versioned_flow: true,
        }
    }
}

impl AnalysisConfig {
    /// Validate option combinations that are rejected before a run,
    /// per spec.md §7's `ConfigError` example (plain-mapping +
    /// cluster-FS together). In this port, the analogous conflict is
    /// requesting both a read and a write of the SVFG serialization
    /// in the same run, and field sensitivity disabled while a
    /// field-sensitive-only self-cycle policy is requested.
    pub fn validate(&self) -> Result<()> {
        if self.write_svfg_path.is_some()
            && self.read_svfg_path.as_deref() == self.write_svfg_path.as_deref()
        {
            return Err(SvfError::config(
                "write-svfg and read-svfg must not target the same path in one run",
            ));
        }
        if self.max_field_limit == 0 && self.detect_pwc {
            return Err(SvfError::config(
                "detect-pwc requires field sensitivity (max-field-limit > 0): a PWC collapse \
                 without field sensitivity has nothing to collapse",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(AnalysisConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_field_insensitive_pwc_detection() {
        let mut cfg = AnalysisConfig::default();
        cfg.max_field_limit = 0;
        cfg.detect_pwc = true;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_identical_read_write_svfg_paths() {
        let mut cfg = AnalysisConfig::default();
        cfg.write_svfg_path = Some("svfg.txt".into());
        cfg.read_svfg_path = Some("svfg.txt".into());
        assert!(cfg.validate().is_err());
    }
}
