//! Recording kernel for scheduler tests.

use std::collections::HashMap;

use elastisim_core::{Job, JobId, SimKernel, TimerTag, UnitId, UnitSpec, VirtualTime};

#[derive(Debug, Default)]
pub struct RecordingKernel {
    pub now: VirtualTime,
    pub created: Vec<UnitId>,
    pub destroyed: Vec<UnitId>,
    pub reassigned: Vec<(JobId, Option<UnitId>)>,
    pub timers: Vec<(VirtualTime, TimerTag)>,
    pub utilization: HashMap<UnitId, f64>,
    pub histories: HashMap<UnitId, Vec<f64>>,
    pub host_history: Vec<f64>,
}

impl RecordingKernel {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SimKernel for RecordingKernel {
    fn now(&self) -> VirtualTime {
        self.now
    }

    fn schedule_timer(&mut self, delay: VirtualTime, tag: TimerTag) {
        self.timers.push((self.now + delay, tag));
    }

    fn request_unit_create(&mut self, unit: UnitId, _spec: &UnitSpec) {
        self.created.push(unit);
    }

    fn request_unit_destroy(&mut self, unit: UnitId) {
        self.destroyed.push(unit);
    }

    fn sample_utilization(&mut self, unit: UnitId) -> f64 {
        self.utilization.get(&unit).copied().unwrap_or(0.0)
    }

    fn utilization_history(&self, unit: UnitId) -> Vec<f64> {
        self.histories.get(&unit).cloned().unwrap_or_default()
    }

    fn host_utilization_history(&self) -> Vec<f64> {
        self.host_history.clone()
    }

    fn reassign(&mut self, job: &Job, unit: Option<UnitId>) {
        self.reassigned.push((job.id, unit));
    }
}
