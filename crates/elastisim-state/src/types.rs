//! Record types persisted per run.

use elastisim_core::{ScalingDecision, UnitId, VirtualTime};
use serde::{Deserialize, Serialize};

/// Snapshot taken at the end of a monitor tick.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TickRecord {
    pub run_id: String,
    /// Tick number within the run, from 0.
    pub seq: u64,
    pub time: VirtualTime,
    pub active_units: u32,
    pub provisioning_units: u32,
    /// Mean over Active units; `None` when none were sampled.
    pub mean_utilization: Option<f64>,
    pub decision: ScalingDecision,
    pub pending_jobs: u32,
    pub running_jobs: u32,
}

/// Kind of fleet change.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ScalingEventKind {
    ScaleUp,
    ScaleDown,
    CreateFailed,
}

/// A fleet change, as it was carried out.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScalingEventRecord {
    pub run_id: String,
    pub seq: u64,
    pub time: VirtualTime,
    pub kind: ScalingEventKind,
    /// Units created or destroyed.
    pub units: Vec<UnitId>,
    /// Jobs moved to another unit during a scale-down.
    pub moved: u32,
    /// Jobs returned to the pending queue during a scale-down.
    pub requeued: u32,
}

/// Key shared by both tables; the padding keeps lexical order numeric.
pub fn record_key(run_id: &str, seq: u64) -> String {
    format!("{run_id}:{seq:010}")
}

impl TickRecord {
    pub fn table_key(&self) -> String {
        record_key(&self.run_id, self.seq)
    }
}

impl ScalingEventRecord {
    pub fn table_key(&self) -> String {
        record_key(&self.run_id, self.seq)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_sort_in_sequence_order() {
        let mut keys = vec![record_key("r", 10), record_key("r", 9), record_key("r", 100)];
        keys.sort();
        assert_eq!(keys, vec!["r:0000000009", "r:0000000010", "r:0000000100"]);
    }
}
