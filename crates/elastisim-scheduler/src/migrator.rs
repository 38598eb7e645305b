//! Workload migration off a unit that is about to be destroyed.
//!
//! Each in-flight job moves to the least loaded Active unit with a free
//! slot. A job with nowhere to go is requeued at the back of the pending
//! queue and picked up by the next onboarding pass. Placement failure is
//! never an error.

use elastisim_core::{SimKernel, UnitId, UnitStatus};
use elastisim_placement::{DestinationLoad, least_loaded};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::registry::UnitRegistry;

/// Outcome of draining one unit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationResult {
    /// Jobs placed on another Active unit.
    pub moved: u32,
    /// Jobs returned to the pending queue.
    pub requeued: u32,
}

impl MigrationResult {
    pub fn total(&self) -> u32 {
        self.moved + self.requeued
    }
}

impl std::ops::AddAssign for MigrationResult {
    fn add_assign(&mut self, rhs: Self) {
        self.moved += rhs.moved;
        self.requeued += rhs.requeued;
    }
}

pub struct Migrator;

impl Migrator {
    /// Move every in-flight job off `from`, in submission order.
    ///
    /// An empty or unknown unit yields `{0, 0}` and touches nothing.
    pub fn migrate(
        registry: &mut UnitRegistry,
        from: UnitId,
        kernel: &mut dyn SimKernel,
    ) -> MigrationResult {
        let mut result = MigrationResult::default();

        if registry.unit(from).is_none() {
            debug!(unit = %from, "migrate: unknown unit");
            return result;
        }

        for job in registry.jobs_on(from) {
            let dest = least_loaded(&destinations(registry), from);

            if let Some(dest) = dest {
                match registry.assign(job, dest) {
                    Ok(entry) => {
                        kernel.reassign(entry, Some(dest));
                        debug!(%job, from = %from, to = %dest, "job migrated");
                        result.moved += 1;
                        continue;
                    }
                    Err(e) => warn!(%job, to = %dest, error = %e, "migration placement failed"),
                }
            }

            match registry.requeue(job) {
                Ok(entry) => {
                    kernel.reassign(entry, None);
                    debug!(%job, from = %from, "no capacity, job requeued");
                    result.requeued += 1;
                }
                Err(e) => warn!(%job, error = %e, "requeue failed"),
            }
        }

        result
    }
}

fn destinations(registry: &UnitRegistry) -> Vec<DestinationLoad> {
    registry
        .units_with_status(UnitStatus::Active)
        .map(|u| DestinationLoad {
            unit: u.id,
            assigned: registry.assigned_count(u.id),
            threshold: u.job_threshold(),
        })
        .collect()
}
