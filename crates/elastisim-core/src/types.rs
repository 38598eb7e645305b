//! Domain types shared across elastisim crates.
//!
//! Units and jobs are plain records; the authoritative copies live in the
//! scheduler's registry. Everything here is `Serialize` so run records can
//! be persisted as JSON.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Virtual simulation time, in seconds since the run started.
pub type VirtualTime = f64;

/// Identifier of a compute unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnitId(pub u64);

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unit-{}", self.0)
    }
}

/// Identifier of a submitted job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub u64);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "job-{}", self.0)
    }
}

// ── Unit ──────────────────────────────────────────────────────────

/// Shape of a compute unit as requested from the resource model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitSpec {
    /// Processing rate per core (work units per second).
    pub mips: f64,
    /// Number of cores.
    pub pes: u32,
    /// Jobs one core is expected to carry before the unit counts as full.
    pub jobs_per_pe: u32,
}

impl UnitSpec {
    /// Total processing rate of the unit.
    pub fn capacity(&self) -> f64 {
        self.mips * f64::from(self.pes)
    }

    /// Capacity-derived number of jobs the unit accepts.
    pub fn job_threshold(&self) -> u32 {
        self.pes.saturating_mul(self.jobs_per_pe).max(1)
    }
}

impl Default for UnitSpec {
    fn default() -> Self {
        Self {
            mips: 1000.0,
            pes: 2,
            jobs_per_pe: 2,
        }
    }
}

/// Lifecycle status of a compute unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitStatus {
    /// Requested from the resource model, not yet acknowledged.
    Provisioning,
    /// Running and accepting jobs.
    Active,
    /// Selected for removal; jobs are being moved off.
    Draining,
    /// Gone. Holds no jobs.
    Destroyed,
}

impl UnitStatus {
    /// Whether the unit still counts toward the fleet size.
    pub fn is_live(self) -> bool {
        !matches!(self, UnitStatus::Destroyed)
    }
}

/// A compute unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Unit {
    pub id: UnitId,
    pub spec: UnitSpec,
    /// Latest sampled utilization in `[0, 1]`.
    pub utilization: f64,
    pub status: UnitStatus,
    pub created_at: VirtualTime,
    pub destroyed_at: Option<VirtualTime>,
}

impl Unit {
    pub fn new(id: UnitId, spec: UnitSpec, created_at: VirtualTime) -> Self {
        Self {
            id,
            spec,
            utilization: 0.0,
            status: UnitStatus::Provisioning,
            created_at,
            destroyed_at: None,
        }
    }

    pub fn capacity(&self) -> f64 {
        self.spec.capacity()
    }

    pub fn job_threshold(&self) -> u32 {
        self.spec.job_threshold()
    }

    pub fn is_active(&self) -> bool {
        self.status == UnitStatus::Active
    }
}

// ── Job ───────────────────────────────────────────────────────────

/// A unit of submitted work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    /// Work submitted, in the same units as `UnitSpec::mips` × seconds.
    pub length: f64,
    /// Work still owed as far as the registry knows: `length` until the
    /// job completes, then 0. Live progress belongs to the kernel.
    pub remaining_work: f64,
    /// `None` while the job waits in the pending queue.
    pub assigned_unit: Option<UnitId>,
    pub submitted_at: VirtualTime,
    pub completed_at: Option<VirtualTime>,
    /// How many times the job has been moved between units.
    pub migrations: u32,
}

impl Job {
    pub fn new(id: JobId, length: f64, submitted_at: VirtualTime) -> Self {
        Self {
            id,
            length,
            remaining_work: length,
            assigned_unit: None,
            submitted_at,
            completed_at: None,
            migrations: 0,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.completed_at.is_some()
    }
}

// ── Sampling and decisions ────────────────────────────────────────

/// One unit's reading within a monitor tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UtilizationReading {
    pub utilization: f64,
    pub measured_at: VirtualTime,
}

/// Per-tick utilization readings, keyed by unit.
///
/// Produced and consumed within one monitor tick.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UtilizationSample {
    readings: BTreeMap<UnitId, UtilizationReading>,
}

impl UtilizationSample {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a reading; values are clamped to `[0, 1]`, NaN reads as idle.
    pub fn insert(&mut self, unit: UnitId, utilization: f64, measured_at: VirtualTime) {
        let utilization = if utilization.is_nan() {
            0.0
        } else {
            utilization.clamp(0.0, 1.0)
        };
        self.readings.insert(
            unit,
            UtilizationReading {
                utilization,
                measured_at,
            },
        );
    }

    pub fn get(&self, unit: UnitId) -> Option<f64> {
        self.readings.get(&unit).map(|r| r.utilization)
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (UnitId, &UtilizationReading)> {
        self.readings.iter().map(|(id, r)| (*id, r))
    }

    /// Arithmetic mean of all readings, `None` when empty.
    pub fn mean(&self) -> Option<f64> {
        if self.readings.is_empty() {
            return None;
        }
        let total: f64 = self.readings.values().map(|r| r.utilization).sum();
        Some(total / self.readings.len() as f64)
    }
}

impl FromIterator<(UnitId, f64, VirtualTime)> for UtilizationSample {
    fn from_iter<I: IntoIterator<Item = (UnitId, f64, VirtualTime)>>(iter: I) -> Self {
        let mut sample = Self::new();
        for (unit, utilization, at) in iter {
            sample.insert(unit, utilization, at);
        }
        sample
    }
}

/// Output of the decision engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ScalingDecision {
    NoAction,
    ScaleUp { count: u32 },
    ScaleDown { count: u32 },
}

impl ScalingDecision {
    pub fn is_action(&self) -> bool {
        !matches!(self, ScalingDecision::NoAction)
    }
}
