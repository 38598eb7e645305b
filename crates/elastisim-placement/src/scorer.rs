//! Unit ordering for reclaim and migration.
//!
//! - **Reclaim**: least utilized first, so the unit doing the least work is
//!   removed first
//! - **Destination**: least loaded unit with a free slot, so migrated jobs
//!   spread across the survivors

use std::cmp::Ordering;

use elastisim_core::{UnitId, VirtualTime};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// An Active unit eligible for scale-down.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReclaimCandidate {
    pub unit: UnitId,
    pub utilization: f64,
    pub created_at: VirtualTime,
}

/// Slot usage of a potential migration destination.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DestinationLoad {
    pub unit: UnitId,
    /// Jobs currently assigned.
    pub assigned: u32,
    /// Capacity-derived job threshold.
    pub threshold: u32,
}

impl DestinationLoad {
    pub fn has_room(&self) -> bool {
        self.assigned < self.threshold
    }

    /// Fraction of slots in use.
    pub fn load(&self) -> f64 {
        if self.threshold == 0 {
            return 1.0;
        }
        f64::from(self.assigned) / f64::from(self.threshold)
    }
}

/// Reclaim order: ascending utilization, then oldest, then lowest id.
pub fn rank_reclaim_candidates(candidates: &[ReclaimCandidate]) -> Vec<UnitId> {
    let mut sorted: Vec<&ReclaimCandidate> = candidates.iter().collect();
    sorted.sort_by(|a, b| {
        a.utilization
            .partial_cmp(&b.utilization)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.created_at.total_cmp(&b.created_at))
            .then_with(|| a.unit.cmp(&b.unit))
    });
    sorted.into_iter().map(|c| c.unit).collect()
}

/// The least loaded destination with room, excluding `source`.
///
/// Ties go to the lowest id. `None` when every unit is full.
pub fn least_loaded(units: &[DestinationLoad], source: UnitId) -> Option<UnitId> {
    let best = units
        .iter()
        .filter(|u| u.unit != source && u.has_room())
        .min_by(|a, b| {
            a.load()
                .total_cmp(&b.load())
                .then_with(|| a.unit.cmp(&b.unit))
        });

    match best {
        Some(dest) => {
            debug!(%source, unit = %dest.unit, load = dest.load(), "migration destination chosen");
            Some(dest.unit)
        }
        None => {
            debug!(%source, considered = units.len(), "no destination with room");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reclaim(id: u64, utilization: f64, created_at: f64) -> ReclaimCandidate {
        ReclaimCandidate {
            unit: UnitId(id),
            utilization,
            created_at,
        }
    }

    fn dest(id: u64, assigned: u32, threshold: u32) -> DestinationLoad {
        DestinationLoad {
            unit: UnitId(id),
            assigned,
            threshold,
        }
    }

    #[test]
    fn reclaims_least_utilized_first() {
        let order = rank_reclaim_candidates(&[
            reclaim(1, 0.8, 0.0),
            reclaim(2, 0.1, 10.0),
            reclaim(3, 0.4, 5.0),
        ]);
        assert_eq!(order, vec![UnitId(2), UnitId(3), UnitId(1)]);
    }

    #[test]
    fn reclaim_ties_prefer_oldest_then_lowest_id() {
        let order = rank_reclaim_candidates(&[
            reclaim(5, 0.0, 20.0),
            reclaim(4, 0.0, 10.0),
            reclaim(3, 0.0, 20.0),
        ]);
        assert_eq!(order, vec![UnitId(4), UnitId(3), UnitId(5)]);
    }

    #[test]
    fn destination_skips_source_and_full_units() {
        let units = [dest(1, 0, 4), dest(2, 4, 4), dest(3, 3, 4)];
        assert_eq!(least_loaded(&units, UnitId(1)), Some(UnitId(3)));
    }

    #[test]
    fn destination_prefers_lower_load_fraction() {
        // 1/2 is fuller than 1/4 even though assigned counts match.
        let units = [dest(1, 1, 2), dest(2, 1, 4)];
        assert_eq!(least_loaded(&units, UnitId(9)), Some(UnitId(2)));
    }

    #[test]
    fn destination_ties_go_to_lowest_id() {
        let units = [dest(8, 1, 4), dest(6, 1, 4)];
        assert_eq!(least_loaded(&units, UnitId(0)), Some(UnitId(6)));
    }

    #[test]
    fn no_destination_when_all_full() {
        let units = [dest(1, 4, 4), dest(2, 2, 2)];
        assert_eq!(least_loaded(&units, UnitId(0)), None);
        assert_eq!(least_loaded(&[], UnitId(0)), None);
    }
}
