//! LocalKernel — deterministic single-threaded reference kernel.
//!
//! Implements [`SimKernel`] on top of a binary-heap event queue. Events
//! fire in `(time, seq)` order, so two events at the same instant are
//! delivered in the order they were scheduled.
//!
//! # Execution model
//!
//! Time-shared: a unit's jobs split its capacity evenly, each capped at one
//! core's rate. Progress is settled whenever a unit's job set changes, and
//! completion events are recomputed under a fresh generation number so the
//! stale ones are dropped on delivery.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, BinaryHeap, HashMap, HashSet, VecDeque};

use elastisim_core::{
    Job, JobId, SimKernel, SimulationConfig, TimerTag, UnitId, UnitSpec, VirtualTime,
};
use tracing::{debug, error, warn};

use crate::event::SimEvent;

#[derive(Debug, Clone, Copy)]
enum Pending {
    Timer(TimerTag),
    UnitCreated { unit: UnitId, success: bool },
    JobFinished { job: JobId, unit: UnitId, generation: u64 },
}

#[derive(Debug)]
struct Scheduled {
    time: VirtualTime,
    seq: u64,
    pending: Pending,
}

impl PartialEq for Scheduled {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Scheduled {}

impl PartialOrd for Scheduled {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Scheduled {
    // Reversed: BinaryHeap is a max-heap, the earliest event must pop first.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .time
            .total_cmp(&self.time)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Execution state of a created unit.
#[derive(Debug)]
struct UnitExec {
    mips: f64,
    capacity: f64,
    threshold: u32,
    running: BTreeSet<JobId>,
    generation: u64,
    settled_at: VirtualTime,
}

impl UnitExec {
    fn rate_per_job(&self) -> f64 {
        if self.running.is_empty() {
            return 0.0;
        }
        (self.capacity / self.running.len() as f64).min(self.mips)
    }
}

#[derive(Debug)]
struct JobExec {
    remaining: f64,
    unit: Option<UnitId>,
}

pub struct LocalKernel {
    now: VirtualTime,
    seq: u64,
    queue: BinaryHeap<Scheduled>,
    provisioning_delay: VirtualTime,
    fail_creates: HashSet<UnitId>,
    /// Specs of units whose creation is still in flight.
    requested: HashMap<UnitId, UnitSpec>,
    units: BTreeMap<UnitId, UnitExec>,
    jobs: HashMap<JobId, JobExec>,
    history_window: usize,
    histories: HashMap<UnitId, VecDeque<f64>>,
    host_history: VecDeque<(VirtualTime, f64)>,
}

impl LocalKernel {
    pub fn new(config: &SimulationConfig) -> Self {
        Self {
            now: 0.0,
            seq: 0,
            queue: BinaryHeap::new(),
            provisioning_delay: config.provisioning_delay,
            fail_creates: config.fail_creates.iter().copied().map(UnitId).collect(),
            requested: HashMap::new(),
            units: BTreeMap::new(),
            jobs: HashMap::new(),
            history_window: config.history_window.max(2),
            histories: HashMap::new(),
            host_history: VecDeque::new(),
        }
    }

    /// Time of the next queued event, stale ones included.
    pub fn peek_time(&self) -> Option<VirtualTime> {
        self.queue.peek().map(|s| s.time)
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Advance the clock to the next live event at or before `horizon`.
    ///
    /// Stale completions are discarded on the way. Returns `None` once the
    /// queue is empty or the next event lies past the horizon.
    pub fn next_event_until(&mut self, horizon: VirtualTime) -> Option<SimEvent> {
        while let Some(top) = self.queue.peek() {
            if top.time > horizon {
                return None;
            }
            let Some(scheduled) = self.queue.pop() else {
                break;
            };
            if let Some(event) = self.deliver(scheduled) {
                return Some(event);
            }
        }
        None
    }

    /// Advance to the next live event with no horizon.
    pub fn next_event(&mut self) -> Option<SimEvent> {
        self.next_event_until(f64::INFINITY)
    }

    /// Jobs currently executing, across all units.
    pub fn running_jobs(&self) -> usize {
        self.units.values().map(|u| u.running.len()).sum()
    }

    /// Jobs executing on `unit`.
    pub fn running_on(&self, unit: UnitId) -> usize {
        self.units.get(&unit).map_or(0, |u| u.running.len())
    }

    /// Remaining work of a job the kernel has seen.
    pub fn remaining_work(&self, job: JobId) -> Option<f64> {
        self.jobs.get(&job).map(|j| j.remaining)
    }

    fn push(&mut self, delay: VirtualTime, pending: Pending) {
        let seq = self.seq;
        self.seq += 1;
        self.queue.push(Scheduled {
            time: self.now + delay.max(0.0),
            seq,
            pending,
        });
    }

    fn deliver(&mut self, scheduled: Scheduled) -> Option<SimEvent> {
        match scheduled.pending {
            Pending::Timer(tag) => {
                self.now = scheduled.time;
                Some(match tag {
                    TimerTag::Monitor => SimEvent::MonitorTick,
                    TimerTag::JobArrival => SimEvent::JobArrival,
                })
            }
            Pending::UnitCreated { unit, success } => {
                self.now = scheduled.time;
                let spec = self.requested.remove(&unit);
                if success && let Some(spec) = spec {
                    self.units.insert(
                        unit,
                        UnitExec {
                            mips: spec.mips,
                            capacity: spec.capacity(),
                            threshold: spec.job_threshold(),
                            running: BTreeSet::new(),
                            generation: 0,
                            settled_at: self.now,
                        },
                    );
                }
                Some(SimEvent::UnitCreateAck { unit, success })
            }
            Pending::JobFinished {
                job,
                unit,
                generation,
            } => {
                let live = self
                    .units
                    .get(&unit)
                    .is_some_and(|u| u.generation == generation && u.running.contains(&job));
                if !live {
                    return None;
                }
                self.now = scheduled.time;
                self.settle(unit);
                if let Some(exec) = self.units.get_mut(&unit) {
                    exec.running.remove(&job);
                }
                self.jobs.remove(&job);
                self.reschedule(unit);
                Some(SimEvent::JobComplete { job })
            }
        }
    }

    /// Accrue progress on `unit` up to `now`.
    fn settle(&mut self, unit: UnitId) {
        let Some(exec) = self.units.get_mut(&unit) else {
            return;
        };
        let elapsed = self.now - exec.settled_at;
        exec.settled_at = self.now;
        if elapsed <= 0.0 {
            return;
        }
        let done = exec.rate_per_job() * elapsed;
        for id in &exec.running {
            if let Some(job) = self.jobs.get_mut(id) {
                job.remaining = (job.remaining - done).max(0.0);
            }
        }
    }

    /// Invalidate pending completions on `unit` and schedule fresh ones.
    fn reschedule(&mut self, unit: UnitId) {
        let Some(exec) = self.units.get_mut(&unit) else {
            return;
        };
        exec.generation += 1;
        let generation = exec.generation;
        let rate = exec.rate_per_job();
        if rate <= 0.0 {
            return;
        }
        let finishing: Vec<(JobId, f64)> = exec
            .running
            .iter()
            .map(|id| {
                let remaining = self.jobs.get(id).map_or(0.0, |j| j.remaining);
                (*id, remaining / rate)
            })
            .collect();
        for (job, eta) in finishing {
            self.push(
                eta,
                Pending::JobFinished {
                    job,
                    unit,
                    generation,
                },
            );
        }
    }

    fn detach(&mut self, job: JobId) {
        let Some(from) = self.jobs.get(&job).and_then(|j| j.unit) else {
            return;
        };
        self.settle(from);
        if let Some(exec) = self.units.get_mut(&from) {
            exec.running.remove(&job);
        }
        if let Some(entry) = self.jobs.get_mut(&job) {
            entry.unit = None;
        }
        self.reschedule(from);
    }

    fn record_host_utilization(&mut self) {
        let (running, slots) = self.units.values().fold((0usize, 0u64), |(r, s), u| {
            (r + u.running.len(), s + u64::from(u.threshold))
        });
        let host = if slots == 0 {
            0.0
        } else {
            (running as f64 / slots as f64).min(1.0)
        };

        // One point per instant: later samples in the same tick overwrite it.
        if let Some((at, value)) = self.host_history.back_mut()
            && *at == self.now
        {
            *value = host;
            return;
        }
        self.host_history.push_back((self.now, host));
        if self.host_history.len() > self.history_window {
            self.host_history.pop_front();
        }
    }
}

impl SimKernel for LocalKernel {
    fn now(&self) -> VirtualTime {
        self.now
    }

    fn schedule_timer(&mut self, delay: VirtualTime, tag: TimerTag) {
        self.push(delay, Pending::Timer(tag));
    }

    fn request_unit_create(&mut self, unit: UnitId, spec: &UnitSpec) {
        let success = !self.fail_creates.contains(&unit);
        self.requested.insert(unit, spec.clone());
        debug!(%unit, success, delay = self.provisioning_delay, "unit creation requested");
        self.push(self.provisioning_delay, Pending::UnitCreated { unit, success });
    }

    fn request_unit_destroy(&mut self, unit: UnitId) {
        self.settle(unit);
        let Some(exec) = self.units.remove(&unit) else {
            warn!(%unit, "destroy requested for unknown unit");
            return;
        };
        if !exec.running.is_empty() {
            error!(%unit, jobs = exec.running.len(), "unit destroyed while still running jobs");
            for job in &exec.running {
                if let Some(entry) = self.jobs.get_mut(job) {
                    entry.unit = None;
                }
            }
        }
        self.histories.remove(&unit);
        debug!(%unit, "unit destroyed");
    }

    fn sample_utilization(&mut self, unit: UnitId) -> f64 {
        let Some(exec) = self.units.get(&unit) else {
            return 0.0;
        };
        let utilization = (exec.running.len() as f64 / f64::from(exec.threshold)).min(1.0);

        let window = self.history_window;
        let history = self.histories.entry(unit).or_default();
        history.push_back(utilization);
        if history.len() > window {
            history.pop_front();
        }
        self.record_host_utilization();

        utilization
    }

    fn utilization_history(&self, unit: UnitId) -> Vec<f64> {
        self.histories
            .get(&unit)
            .map(|h| h.iter().copied().collect())
            .unwrap_or_default()
    }

    fn host_utilization_history(&self) -> Vec<f64> {
        self.host_history.iter().map(|(_, v)| *v).collect()
    }

    fn reassign(&mut self, job: &Job, unit: Option<UnitId>) {
        self.detach(job.id);
        let entry = self.jobs.entry(job.id).or_insert(JobExec {
            remaining: job.remaining_work,
            unit: None,
        });

        let Some(unit) = unit else {
            debug!(job = %job.id, "job parked");
            return;
        };
        if !self.units.contains_key(&unit) {
            warn!(job = %job.id, %unit, "reassign to a unit the kernel has not created");
            return;
        }
        entry.unit = Some(unit);

        self.settle(unit);
        if let Some(exec) = self.units.get_mut(&unit) {
            exec.running.insert(job.id);
        }
        self.reschedule(unit);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kernel() -> LocalKernel {
        LocalKernel::new(&SimulationConfig {
            provisioning_delay: 1.0,
            ..SimulationConfig::default()
        })
    }

    fn one_core() -> UnitSpec {
        UnitSpec {
            mips: 100.0,
            pes: 1,
            jobs_per_pe: 2,
        }
    }

    /// Create `unit` and deliver its ack.
    fn created(k: &mut LocalKernel, unit: u64, spec: &UnitSpec) -> UnitId {
        let id = UnitId(unit);
        k.request_unit_create(id, spec);
        assert_eq!(
            k.next_event(),
            Some(SimEvent::UnitCreateAck {
                unit: id,
                success: true
            })
        );
        id
    }

    #[test]
    fn events_fire_in_time_then_schedule_order() {
        let mut k = kernel();
        k.schedule_timer(5.0, TimerTag::Monitor);
        k.schedule_timer(2.0, TimerTag::JobArrival);
        k.schedule_timer(5.0, TimerTag::JobArrival);

        assert_eq!(k.next_event(), Some(SimEvent::JobArrival));
        assert_eq!(k.now(), 2.0);
        assert_eq!(k.next_event(), Some(SimEvent::MonitorTick));
        assert_eq!(k.next_event(), Some(SimEvent::JobArrival));
        assert_eq!(k.now(), 5.0);
        assert_eq!(k.next_event(), None);
    }

    #[test]
    fn horizon_stops_delivery() {
        let mut k = kernel();
        k.schedule_timer(10.0, TimerTag::Monitor);

        assert_eq!(k.next_event_until(9.0), None);
        assert_eq!(k.now(), 0.0);
        assert_eq!(k.next_event_until(10.0), Some(SimEvent::MonitorTick));
    }

    #[test]
    fn creation_ack_after_delay_and_failures() {
        let mut k = LocalKernel::new(&SimulationConfig {
            provisioning_delay: 3.0,
            fail_creates: vec![1],
            ..SimulationConfig::default()
        });
        k.request_unit_create(UnitId(0), &one_core());
        k.request_unit_create(UnitId(1), &one_core());

        assert_eq!(
            k.next_event(),
            Some(SimEvent::UnitCreateAck {
                unit: UnitId(0),
                success: true
            })
        );
        assert_eq!(k.now(), 3.0);
        assert_eq!(
            k.next_event(),
            Some(SimEvent::UnitCreateAck {
                unit: UnitId(1),
                success: false
            })
        );
        assert_eq!(k.sample_utilization(UnitId(1)), 0.0);
    }

    #[test]
    fn single_job_completes_at_length_over_rate() {
        let mut k = kernel();
        let unit = created(&mut k, 0, &one_core());
        k.reassign(&Job::new(JobId(0), 500.0, 1.0), Some(unit));

        assert_eq!(k.next_event(), Some(SimEvent::JobComplete { job: JobId(0) }));
        assert!((k.now() - 6.0).abs() < 1e-9);
        assert_eq!(k.running_jobs(), 0);
        assert_eq!(k.remaining_work(JobId(0)), None);
    }

    #[test]
    fn finished_jobs_are_forgotten() {
        let mut k = kernel();
        let unit = created(&mut k, 0, &one_core());
        for id in 0..50 {
            k.reassign(&Job::new(JobId(id), 100.0, 1.0), Some(unit));
        }
        while k.next_event().is_some() {}

        assert_eq!(k.running_jobs(), 0);
        assert!(k.jobs.is_empty());
    }

    #[test]
    fn time_sharing_slows_jobs_and_stale_completions_are_dropped() {
        let mut k = kernel();
        let unit = created(&mut k, 0, &one_core());
        k.reassign(&Job::new(JobId(0), 400.0, 1.0), Some(unit));
        // Second job halves the rate; the first one's original ETA (t=5) is stale.
        k.reassign(&Job::new(JobId(1), 400.0, 1.0), Some(unit));

        assert_eq!(k.next_event(), Some(SimEvent::JobComplete { job: JobId(0) }));
        assert!((k.now() - 9.0).abs() < 1e-9, "now = {}", k.now());
        assert_eq!(k.next_event(), Some(SimEvent::JobComplete { job: JobId(1) }));
        assert!((k.now() - 9.0).abs() < 1e-9);
        assert_eq!(k.next_event(), None);
    }

    #[test]
    fn migration_keeps_progress() {
        let mut k = kernel();
        let a = created(&mut k, 0, &one_core());
        let b = created(&mut k, 1, &one_core());
        let job = Job::new(JobId(0), 1000.0, 2.0);
        k.reassign(&job, Some(a));

        k.schedule_timer(4.0, TimerTag::Monitor);
        assert_eq!(k.next_event(), Some(SimEvent::MonitorTick));
        assert_eq!(k.now(), 6.0);

        // The registry's copy still says 1000; the kernel keeps its own progress.
        assert_eq!(job.remaining_work, 1000.0);
        k.reassign(&job, Some(b));
        assert_eq!(k.remaining_work(job.id), Some(600.0));
        assert_eq!(k.running_on(a), 0);
        assert_eq!(k.running_on(b), 1);

        assert_eq!(k.next_event(), Some(SimEvent::JobComplete { job: job.id }));
        assert!((k.now() - 12.0).abs() < 1e-9);
    }

    #[test]
    fn parked_job_makes_no_progress() {
        let mut k = kernel();
        let a = created(&mut k, 0, &one_core());
        let job = Job::new(JobId(0), 1000.0, 1.0);
        k.reassign(&job, Some(a));
        k.reassign(&job, None);

        assert_eq!(k.next_event(), None);
        assert_eq!(k.running_jobs(), 0);
        assert_eq!(k.remaining_work(job.id), Some(1000.0));
    }

    #[test]
    fn utilization_is_running_over_threshold() {
        let mut k = kernel();
        let unit = created(&mut k, 0, &one_core());
        assert_eq!(k.sample_utilization(unit), 0.0);

        k.reassign(&Job::new(JobId(0), 1e6, 1.0), Some(unit));
        assert_eq!(k.sample_utilization(unit), 0.5);
        k.reassign(&Job::new(JobId(1), 1e6, 1.0), Some(unit));
        k.reassign(&Job::new(JobId(2), 1e6, 1.0), Some(unit));
        assert_eq!(k.sample_utilization(unit), 1.0);

        assert_eq!(k.utilization_history(unit), vec![0.0, 0.5, 1.0]);
    }

    #[test]
    fn host_history_keeps_one_point_per_instant() {
        let mut k = kernel();
        let a = created(&mut k, 0, &one_core());
        let b = created(&mut k, 1, &one_core());
        k.reassign(&Job::new(JobId(0), 1e6, 1.0), Some(a));

        k.sample_utilization(a);
        k.sample_utilization(b);
        assert_eq!(k.host_utilization_history(), vec![0.25]);

        k.schedule_timer(1.0, TimerTag::Monitor);
        k.next_event();
        k.reassign(&Job::new(JobId(1), 1e6, 1.0), Some(b));
        k.sample_utilization(a);
        k.sample_utilization(b);
        assert_eq!(k.host_utilization_history(), vec![0.25, 0.5]);
    }

    #[test]
    fn history_window_is_bounded() {
        let mut k = LocalKernel::new(&SimulationConfig {
            history_window: 3,
            ..SimulationConfig::default()
        });
        let unit = created(&mut k, 0, &one_core());
        for _ in 0..5 {
            k.sample_utilization(unit);
        }
        assert_eq!(k.utilization_history(unit).len(), 3);
    }

    #[test]
    fn destroy_drops_unit_state() {
        let mut k = kernel();
        let unit = created(&mut k, 0, &one_core());
        k.sample_utilization(unit);

        k.request_unit_destroy(unit);
        assert!(k.utilization_history(unit).is_empty());
        assert_eq!(k.sample_utilization(unit), 0.0);
        // Sampling a gone unit records nothing.
        assert!(k.utilization_history(unit).is_empty());
        assert!(!k.histories.contains_key(&unit));
        assert_eq!(k.host_utilization_history().len(), 1);
    }
}
