//! Unit lifecycle manager.
//!
//! Carries out scaling decisions against the registry:
//!
//! - **Scale up**: allocate ids, register Provisioning units, ask the
//!   kernel to create them. Units turn Active on a successful ack.
//! - **Scale down**: pick Active units (least utilized, or most correlated
//!   with the host), mark them Draining, migrate their jobs, then destroy.
//! - **Onboarding**: after any change that frees or adds capacity, pending
//!   jobs are placed first-fit onto the newest Active units.

use elastisim_core::{
    Job, JobId, PolicyConfig, ReclaimStrategy, SimKernel, Unit, UnitId, UnitSpec, UnitStatus,
    UtilizationSample,
};
use elastisim_placement::{Candidate, ReclaimCandidate, rank_reclaim_candidates, select};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::migrator::{MigrationResult, Migrator};
use crate::registry::UnitRegistry;

/// Running totals over the lifetime of one simulation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleStats {
    pub units_requested: u32,
    pub units_activated: u32,
    pub units_failed: u32,
    pub units_destroyed: u32,
    pub jobs_submitted: u32,
    pub jobs_completed: u32,
    pub jobs_migrated: u32,
    pub jobs_requeued: u32,
}

/// What one scale-down call actually did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScaleDownReport {
    /// Units the decision asked to remove.
    pub requested: u32,
    /// Units actually destroyed, in selection order.
    pub reclaimed: Vec<UnitId>,
    pub migration: MigrationResult,
}

pub struct LifecycleManager {
    registry: UnitRegistry,
    spec: UnitSpec,
    min_units: u32,
    reclaim: ReclaimStrategy,
    stats: LifecycleStats,
}

impl LifecycleManager {
    pub fn new(policy: &PolicyConfig, spec: UnitSpec) -> Self {
        Self {
            registry: UnitRegistry::new(),
            spec,
            min_units: policy.min_units,
            reclaim: policy.reclaim,
            stats: LifecycleStats::default(),
        }
    }

    pub fn registry(&self) -> &UnitRegistry {
        &self.registry
    }

    pub fn stats(&self) -> &LifecycleStats {
        &self.stats
    }

    pub fn reclaim_strategy(&self) -> ReclaimStrategy {
        self.reclaim
    }

    /// Active plus Provisioning: the fleet size the decision engine sees.
    pub fn unit_count(&self) -> u32 {
        self.registry.count(UnitStatus::Active) + self.registry.count(UnitStatus::Provisioning)
    }

    /// Store the tick's readings on the units they belong to.
    pub fn record_utilization(&mut self, sample: &UtilizationSample) {
        for (unit, reading) in sample.iter() {
            self.registry.set_utilization(unit, reading.utilization);
        }
    }

    // ── Scale up ──────────────────────────────────────────────────

    /// Request `count` new units. Returns their ids.
    pub fn scale_up(&mut self, count: u32, kernel: &mut dyn SimKernel) -> Vec<UnitId> {
        let now = kernel.now();
        let mut ids = Vec::with_capacity(count as usize);

        for _ in 0..count {
            let id = self.registry.allocate_unit_id();
            self.registry.insert_unit(Unit::new(id, self.spec.clone(), now));
            kernel.request_unit_create(id, &self.spec);
            ids.push(id);
        }

        self.stats.units_requested += count;
        if count > 0 {
            info!(count, now, units = ?ids, "requested new units");
        }
        ids
    }

    /// Handle the kernel's answer to a creation request.
    pub fn on_unit_create_ack(&mut self, unit: UnitId, success: bool, kernel: &mut dyn SimKernel) {
        let now = kernel.now();

        match self.registry.unit(unit).map(|u| u.status) {
            None => {
                warn!(%unit, "creation ack for unknown unit");
                return;
            }
            Some(UnitStatus::Provisioning) => {}
            Some(status) => {
                debug!(%unit, ?status, "ignoring creation ack for unit not provisioning");
                return;
            }
        }

        if !success {
            warn!(%unit, now, "unit creation failed");
            if let Err(e) = self.registry.transition(unit, UnitStatus::Destroyed, now) {
                warn!(%unit, error = %e, "could not retire failed unit");
            }
            self.stats.units_failed += 1;
            return;
        }

        if let Err(e) = self.registry.transition(unit, UnitStatus::Active, now) {
            warn!(%unit, error = %e, "could not activate unit");
            return;
        }
        self.stats.units_activated += 1;
        info!(%unit, now, "unit active");

        self.onboard_pending(kernel);
    }

    // ── Scale down ────────────────────────────────────────────────

    /// Remove up to `count` Active units without crossing `min_units`.
    pub fn scale_down(
        &mut self,
        count: u32,
        sample: &UtilizationSample,
        kernel: &mut dyn SimKernel,
    ) -> ScaleDownReport {
        let active = self.registry.count(UnitStatus::Active);
        let provisioning = self.registry.count(UnitStatus::Provisioning);
        let allowed = count
            .min((active + provisioning).saturating_sub(self.min_units))
            .min(active);

        let mut report = ScaleDownReport {
            requested: count,
            ..Default::default()
        };
        if allowed == 0 {
            debug!(count, active, provisioning, min_units = self.min_units, "nothing to reclaim");
            return report;
        }

        let victims = self.choose_victims(allowed as usize, sample, kernel);
        let now = kernel.now();

        // Drain every victim first so none of them is picked as a
        // migration destination for another.
        for &unit in &victims {
            if let Err(e) = self.registry.transition(unit, UnitStatus::Draining, now) {
                warn!(%unit, error = %e, "could not drain unit");
            }
        }

        for unit in victims {
            if let Some(result) = self.retire(unit, kernel) {
                report.migration += result;
                report.reclaimed.push(unit);
            }
        }

        info!(
            requested = count,
            reclaimed = report.reclaimed.len(),
            moved = report.migration.moved,
            requeued = report.migration.requeued,
            "scale-down complete"
        );

        self.onboard_pending(kernel);
        report
    }

    /// Drain and destroy a single Active unit.
    ///
    /// Returns `None`, and does nothing, when the unit is not Active or the
    /// fleet is already at `min_units`.
    pub fn reclaim(&mut self, unit: UnitId, kernel: &mut dyn SimKernel) -> Option<MigrationResult> {
        if !self.registry.unit(unit).is_some_and(Unit::is_active) {
            debug!(%unit, "reclaim skipped, unit not active");
            return None;
        }
        if self.unit_count() <= self.min_units {
            debug!(%unit, min_units = self.min_units, "reclaim skipped, at floor");
            return None;
        }
        if let Err(e) = self.registry.transition(unit, UnitStatus::Draining, kernel.now()) {
            warn!(%unit, error = %e, "could not drain unit");
            return None;
        }
        let result = self.retire(unit, kernel);
        self.onboard_pending(kernel);
        result
    }

    fn retire(&mut self, unit: UnitId, kernel: &mut dyn SimKernel) -> Option<MigrationResult> {
        if self.registry.unit(unit).map(|u| u.status) != Some(UnitStatus::Draining) {
            return None;
        }

        let result = Migrator::migrate(&mut self.registry, unit, kernel);
        self.stats.jobs_migrated += result.moved;
        self.stats.jobs_requeued += result.requeued;

        if let Err(e) = self.registry.transition(unit, UnitStatus::Destroyed, kernel.now()) {
            warn!(%unit, error = %e, "could not destroy drained unit");
            return None;
        }
        kernel.request_unit_destroy(unit);
        self.stats.units_destroyed += 1;
        debug!(%unit, moved = result.moved, requeued = result.requeued, "unit destroyed");
        Some(result)
    }

    fn choose_victims(
        &self,
        count: usize,
        sample: &UtilizationSample,
        kernel: &dyn SimKernel,
    ) -> Vec<UnitId> {
        if self.reclaim == ReclaimStrategy::MaxCorrelation {
            let reference = kernel.host_utilization_history();
            if !reference.is_empty() {
                return self.most_correlated(count, &reference, kernel);
            }
            debug!("no host history yet, falling back to least utilized");
        }
        self.least_utilized(count, sample)
    }

    fn least_utilized(&self, count: usize, sample: &UtilizationSample) -> Vec<UnitId> {
        let candidates: Vec<ReclaimCandidate> = self
            .registry
            .units_with_status(UnitStatus::Active)
            .map(|u| ReclaimCandidate {
                unit: u.id,
                utilization: sample.get(u.id).unwrap_or(u.utilization),
                created_at: u.created_at,
            })
            .collect();

        let mut order = rank_reclaim_candidates(&candidates);
        order.truncate(count);
        order
    }

    fn most_correlated(&self, count: usize, reference: &[f64], kernel: &dyn SimKernel) -> Vec<UnitId> {
        let mut candidates: Vec<Candidate> = self
            .registry
            .units_with_status(UnitStatus::Active)
            .map(|u| Candidate {
                unit: u.id,
                history: kernel.utilization_history(u.id),
                utilization: u.utilization,
            })
            .collect();

        let mut chosen = Vec::with_capacity(count);
        while chosen.len() < count {
            let Some(unit) = select(&candidates, reference) else {
                break;
            };
            candidates.retain(|c| c.unit != unit);
            chosen.push(unit);
        }
        chosen
    }

    // ── Jobs ──────────────────────────────────────────────────────

    /// Register a job of `length` work and try to place it.
    pub fn submit_job(&mut self, length: f64, kernel: &mut dyn SimKernel) -> JobId {
        let id = self.registry.allocate_job_id();
        self.registry.enqueue_job(Job::new(id, length, kernel.now()));
        self.stats.jobs_submitted += 1;
        self.onboard_pending(kernel);
        id
    }

    /// Mark a job finished and refill the slot it held.
    pub fn on_job_complete(&mut self, job: JobId, kernel: &mut dyn SimKernel) {
        match self.registry.complete_job(job, kernel.now()) {
            Ok(unit) => {
                self.stats.jobs_completed += 1;
                debug!(%job, unit = ?unit, "job complete");
                self.onboard_pending(kernel);
            }
            Err(e) => debug!(%job, error = %e, "ignoring completion"),
        }
    }

    /// First-fit placement of pending jobs, newest Active unit first.
    ///
    /// Returns how many jobs were placed.
    pub fn onboard_pending(&mut self, kernel: &mut dyn SimKernel) -> u32 {
        if self.registry.pending_len() == 0 {
            return 0;
        }

        let mut targets: Vec<&Unit> = self.registry.units_with_status(UnitStatus::Active).collect();
        targets.sort_by(|a, b| {
            b.created_at
                .total_cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        let targets: Vec<(UnitId, u32)> = targets.iter().map(|u| (u.id, u.job_threshold())).collect();

        let mut placed = 0;
        for (unit, threshold) in targets {
            let mut free = threshold.saturating_sub(self.registry.assigned_count(unit));
            while free > 0 {
                let Some(job) = self.registry.pop_pending() else {
                    break;
                };
                match self.registry.assign(job, unit) {
                    Ok(entry) => {
                        kernel.reassign(entry, Some(unit));
                        free -= 1;
                        placed += 1;
                    }
                    Err(e) => warn!(%job, %unit, error = %e, "onboarding failed"),
                }
            }
            if self.registry.pending_len() == 0 {
                break;
            }
        }

        if placed > 0 {
            debug!(placed, pending = self.registry.pending_len(), "onboarded pending jobs");
        }
        placed
    }
}
