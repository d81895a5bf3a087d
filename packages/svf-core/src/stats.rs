//! Plain result structs wiring statistics out of each component,
//! produced at teardown rather than read from a global (§9 design
//! note). An external reporter (out of scope) turns these into
//! human-readable dumps; the crate itself only guarantees the fields
//! spec.md §4.3/§7/§9 name are populated.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Statistics published by the Andersen solver (C3), per §4.3.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AndersenStats {
    pub addr_processed: u64,
    pub copy_processed: u64,
    pub gep_processed: u64,
    pub load_processed: u64,
    pub store_processed: u64,
    pub scc_detections: u64,
    pub field_insensitive_widenings: u64,
    pub max_points_to_size: usize,
    pub outer_iterations: u64,
    #[serde(with = "duration_secs")]
    pub time_scc: Duration,
    #[serde(with = "duration_secs")]
    pub time_copy_gep: Duration,
    #[serde(with = "duration_secs")]
    pub time_load_store: Duration,
    #[serde(with = "duration_secs")]
    pub time_update_call_graph: Duration,
}

/// Statistics published by MemSSA construction (C4).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemSsaStats {
    pub regions: usize,
    pub entry_chis: usize,
    pub ret_mus: usize,
    pub phis_inserted: usize,
    pub max_version: u32,
}

/// Statistics published by SVFG construction/optimization (C5).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SvfgStats {
    pub nodes: usize,
    pub direct_edges: usize,
    pub indirect_edges: usize,
    pub nodes_removed_by_optimizer: usize,
    pub mssa_phis_bypassed: usize,
}

/// Statistics published by the flow-sensitive solver (C6) and its
/// versioned variant (C7).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FlowSensitiveStats {
    pub worklist_pops: u64,
    pub outer_iterations: u64,
    pub strong_updates: u64,
    pub weak_updates: u64,
    pub new_indirect_call_edges: u64,
    pub timed_out: bool,
}

/// Top-level run statistics assembled at `Analyzer::teardown`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunStats {
    pub andersen: AndersenStats,
    pub mem_ssa: MemSsaStats,
    pub svfg: SvfgStats,
    pub flow_sensitive: Option<FlowSensitiveStats>,
    /// Set whenever any phase's `Budget` fired, regardless of whether
    /// the run otherwise completed — spec.md §7: "statistics are
    /// written at end of analysis regardless of whether the timer
    /// fired, including a `TimedOut` flag."
    pub timed_out: bool,
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        d.as_secs_f64().serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        Ok(Duration::from_secs_f64(secs.max(0.0)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_stats_roundtrip_json() {
        let mut stats = RunStats::default();
        stats.andersen.copy_processed = 5;
        stats.timed_out = true;
        let json = serde_json::to_string(&stats).unwrap();
        let back: RunStats = serde_json::from_str(&json).unwrap();
        assert_eq!(back.andersen.copy_processed, 5);
        assert!(back.timed_out);
    }
}
