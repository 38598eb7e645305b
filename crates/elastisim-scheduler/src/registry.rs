//! Authoritative fleet state: units, jobs, and the pending queue.
//!
//! One registry exists per simulation. Everything that changes a unit's
//! status or a job's assignment goes through `&mut UnitRegistry`, so the
//! lifecycle manager and the migrator can never interleave their updates.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use elastisim_core::{Job, JobId, Unit, UnitId, UnitStatus, VirtualTime};

use crate::error::{SchedulerError, SchedulerResult};

#[derive(Debug, Default)]
pub struct UnitRegistry {
    units: BTreeMap<UnitId, Unit>,
    jobs: BTreeMap<JobId, Job>,
    /// In-flight jobs per unit. Completed jobs leave this index.
    assignments: BTreeMap<UnitId, BTreeSet<JobId>>,
    pending: VecDeque<JobId>,
    next_unit: u64,
    next_job: u64,
}

impl UnitRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Units ─────────────────────────────────────────────────────

    /// Reserve the next unit id. Ids are never reused.
    pub fn allocate_unit_id(&mut self) -> UnitId {
        let id = UnitId(self.next_unit);
        self.next_unit += 1;
        id
    }

    pub fn insert_unit(&mut self, unit: Unit) {
        self.next_unit = self.next_unit.max(unit.id.0 + 1);
        self.units.insert(unit.id, unit);
    }

    pub fn unit(&self, id: UnitId) -> Option<&Unit> {
        self.units.get(&id)
    }

    /// All units ever registered, tombstones included, in id order.
    pub fn units(&self) -> impl Iterator<Item = &Unit> {
        self.units.values()
    }

    pub fn units_with_status(&self, status: UnitStatus) -> impl Iterator<Item = &Unit> {
        self.units.values().filter(move |u| u.status == status)
    }

    pub fn count(&self, status: UnitStatus) -> u32 {
        self.units_with_status(status).count() as u32
    }

    /// Units that still count toward the fleet (everything but Destroyed).
    pub fn live_count(&self) -> u32 {
        self.units.values().filter(|u| u.status.is_live()).count() as u32
    }

    /// Move a unit to `to`, rejecting transitions outside the lifecycle:
    ///
    /// ```text
    /// Provisioning ─┬─> Active ──> Draining ──> Destroyed
    ///               └─────────────────────────> Destroyed   (creation failed)
    /// ```
    pub fn transition(
        &mut self,
        id: UnitId,
        to: UnitStatus,
        now: VirtualTime,
    ) -> SchedulerResult<()> {
        let unit = self
            .units
            .get_mut(&id)
            .ok_or(SchedulerError::UnitNotFound(id))?;

        let allowed = matches!(
            (unit.status, to),
            (UnitStatus::Provisioning, UnitStatus::Active)
                | (UnitStatus::Provisioning, UnitStatus::Destroyed)
                | (UnitStatus::Active, UnitStatus::Draining)
                | (UnitStatus::Draining, UnitStatus::Destroyed)
        );
        if !allowed {
            return Err(SchedulerError::InvalidTransition {
                unit: id,
                from: unit.status,
                to,
            });
        }

        if to == UnitStatus::Destroyed {
            if self.assignments.get(&id).is_some_and(|set| !set.is_empty()) {
                return Err(SchedulerError::InvalidTransition {
                    unit: id,
                    from: unit.status,
                    to,
                });
            }
            unit.destroyed_at = Some(now);
            self.assignments.remove(&id);
        }
        unit.status = to;
        Ok(())
    }

    pub fn set_utilization(&mut self, id: UnitId, utilization: f64) {
        if let Some(unit) = self.units.get_mut(&id) {
            unit.utilization = utilization;
        }
    }

    // ── Jobs ──────────────────────────────────────────────────────

    pub fn allocate_job_id(&mut self) -> JobId {
        let id = JobId(self.next_job);
        self.next_job += 1;
        id
    }

    /// Register a new, unassigned job at the back of the pending queue.
    pub fn enqueue_job(&mut self, mut job: Job) {
        job.assigned_unit = None;
        self.next_job = self.next_job.max(job.id.0 + 1);
        self.pending.push_back(job.id);
        self.jobs.insert(job.id, job);
    }

    pub fn job(&self, id: JobId) -> Option<&Job> {
        self.jobs.get(&id)
    }

    pub fn jobs(&self) -> impl Iterator<Item = &Job> {
        self.jobs.values()
    }

    /// In-flight jobs on `unit`, in submission order.
    pub fn jobs_on(&self, unit: UnitId) -> Vec<JobId> {
        let Some(set) = self.assignments.get(&unit) else {
            return Vec::new();
        };
        let mut on: Vec<&Job> = set.iter().filter_map(|id| self.jobs.get(id)).collect();
        on.sort_by(|a, b| {
            a.submitted_at
                .total_cmp(&b.submitted_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        on.into_iter().map(|j| j.id).collect()
    }

    pub fn assigned_count(&self, unit: UnitId) -> u32 {
        self.assignments.get(&unit).map_or(0, |set| set.len() as u32)
    }

    /// In-flight jobs across every unit.
    pub fn running_count(&self) -> u32 {
        self.assignments.values().map(|set| set.len() as u32).sum()
    }

    fn unindex(&mut self, job: JobId, unit: Option<UnitId>) {
        if let Some(unit) = unit
            && let Some(set) = self.assignments.get_mut(&unit)
        {
            set.remove(&job);
        }
    }

    /// Bind a job to an Active unit.
    ///
    /// Moving a job that already had a unit counts as a migration.
    pub fn assign(&mut self, job: JobId, unit: UnitId) -> SchedulerResult<&Job> {
        let status = self
            .units
            .get(&unit)
            .map(|u| u.status)
            .ok_or(SchedulerError::UnitNotFound(unit))?;
        if status != UnitStatus::Active {
            return Err(SchedulerError::NotAccepting { unit, status });
        }

        let entry = self.jobs.get_mut(&job).ok_or(SchedulerError::JobNotFound(job))?;
        if entry.is_complete() {
            return Err(SchedulerError::JobCompleted(job));
        }
        let previous = entry.assigned_unit.replace(unit);
        if previous.is_some() {
            entry.migrations += 1;
        }

        self.unindex(job, previous);
        self.assignments.entry(unit).or_default().insert(job);
        self.pending.retain(|id| *id != job);
        self.jobs.get(&job).ok_or(SchedulerError::JobNotFound(job))
    }

    /// Clear a job's assignment and append it to the pending queue.
    pub fn requeue(&mut self, job: JobId) -> SchedulerResult<&Job> {
        let entry = self.jobs.get_mut(&job).ok_or(SchedulerError::JobNotFound(job))?;
        if entry.is_complete() {
            return Err(SchedulerError::JobCompleted(job));
        }
        let previous = entry.assigned_unit.take();

        self.unindex(job, previous);
        if !self.pending.contains(&job) {
            self.pending.push_back(job);
        }
        self.jobs.get(&job).ok_or(SchedulerError::JobNotFound(job))
    }

    /// Mark a job finished and release its slot.
    ///
    /// Returns the unit it ran on.
    pub fn complete_job(&mut self, job: JobId, now: VirtualTime) -> SchedulerResult<Option<UnitId>> {
        let entry = self.jobs.get_mut(&job).ok_or(SchedulerError::JobNotFound(job))?;
        if entry.is_complete() {
            return Err(SchedulerError::JobCompleted(job));
        }
        entry.completed_at = Some(now);
        entry.remaining_work = 0.0;
        let ran_on = entry.assigned_unit.take();

        self.unindex(job, ran_on);
        self.pending.retain(|id| *id != job);
        Ok(ran_on)
    }

    // ── Pending queue ─────────────────────────────────────────────

    pub fn pop_pending(&mut self) -> Option<JobId> {
        self.pending.pop_front()
    }

    pub fn pending(&self) -> &VecDeque<JobId> {
        &self.pending
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}
