//! The external simulation kernel, as seen from the scaling core.
//!
//! The kernel owns virtual time, delivers one-shot timers, and fronts the
//! resource model that provisions units and measures their load. The core
//! never advances time itself; it reacts to callbacks and issues commands
//! back through this trait.

use crate::types::{Job, UnitId, UnitSpec, VirtualTime};

/// Tag carried by a one-shot timer so the adapter can route its firing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerTag {
    /// Periodic utilization check and scaling decision.
    Monitor,
    /// Periodic injection of new jobs.
    JobArrival,
}

/// Commands and queries the core issues to the simulation kernel.
///
/// Implementations are single-threaded: every call happens from inside a
/// callback the kernel itself delivered.
pub trait SimKernel {
    /// Current virtual clock.
    fn now(&self) -> VirtualTime;

    /// Register a one-shot timer firing `delay` after `now()`.
    ///
    /// Repeating timers are re-armed explicitly by the caller.
    fn schedule_timer(&mut self, delay: VirtualTime, tag: TimerTag);

    /// Ask the resource model for a new unit. The outcome arrives later as a
    /// creation acknowledgment for `unit`.
    fn request_unit_create(&mut self, unit: UnitId, spec: &UnitSpec);

    /// Release a unit. Fire-and-forget.
    fn request_unit_destroy(&mut self, unit: UnitId);

    /// Current load of `unit` in `[0, 1]`.
    ///
    /// Takes `&mut self` because resource models typically record each
    /// observation into the unit's history.
    fn sample_utilization(&mut self, unit: UnitId) -> f64;

    /// Past readings for `unit`, oldest first.
    fn utilization_history(&self, unit: UnitId) -> Vec<f64>;

    /// Past host-level readings, oldest first.
    fn host_utilization_history(&self) -> Vec<f64>;

    /// Bind `job` to `unit`, or park it when `unit` is `None`.
    ///
    /// Covers first placement as well as migration. `job.remaining_work`
    /// seeds the kernel's execution state on first sight only: the registry
    /// does not track progress, so on a migration the kernel must keep the
    /// progress it already accrued rather than re-reading the field.
    fn reassign(&mut self, job: &Job, unit: Option<UnitId>);
}
