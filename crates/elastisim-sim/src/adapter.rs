//! Scheduling adapter — routes kernel events to the scaling core.
//!
//! Events are dispatched through a table keyed by [`EventTag`]. Each
//! periodic timer is one-shot; its handler re-arms it explicitly while the
//! next firing stays inside the run's horizon.

use std::collections::HashMap;

use elastisim_autoscale::DecisionEngine;
use elastisim_core::{
    ElastiConfig, JobId, ScalingDecision, SimKernel, TimerTag, UnitId, UnitStatus, VirtualTime,
    WorkloadConfig,
};
use elastisim_scheduler::LifecycleManager;
use elastisim_state::{RunStore, ScalingEventKind, ScalingEventRecord, TickRecord};
use tracing::{debug, info, warn};

use crate::error::AdapterResult;
use crate::event::{EventTag, SimEvent};
use crate::sampler::Sampler;
use crate::workload::JobSource;

/// Callback registered for one event tag.
pub type Handler = fn(&mut SchedulingAdapter, SimEvent, &mut dyn SimKernel) -> AdapterResult<()>;

pub struct SchedulingAdapter {
    engine: DecisionEngine,
    lifecycle: LifecycleManager,
    handlers: HashMap<EventTag, Handler>,
    source: Option<Box<dyn JobSource>>,
    arrivals: WorkloadConfig,
    initial_units: u32,
    monitor_interval: VirtualTime,
    horizon: VirtualTime,
    run_id: String,
    store: Option<RunStore>,
    ticks: Vec<TickRecord>,
    events: Vec<ScalingEventRecord>,
}

impl SchedulingAdapter {
    /// Build the adapter for one run. `source` may be `None` for a run
    /// driven purely by externally submitted jobs.
    pub fn new(config: &ElastiConfig, source: Option<Box<dyn JobSource>>) -> AdapterResult<Self> {
        config.validate()?;
        let engine = DecisionEngine::new(config.policy.clone())?;
        let lifecycle = LifecycleManager::new(&config.policy, config.unit.spec());

        let mut adapter = Self {
            engine,
            lifecycle,
            handlers: HashMap::new(),
            source,
            arrivals: config.workload.clone().unwrap_or_default(),
            initial_units: config.unit.initial_units,
            monitor_interval: config.policy.monitor_interval,
            horizon: config.simulation.until,
            run_id: format!("seed-{}", config.simulation.seed),
            store: None,
            ticks: Vec::new(),
            events: Vec::new(),
        };
        adapter.register(EventTag::MonitorTick, handle_monitor_tick);
        adapter.register(EventTag::JobArrival, handle_job_arrival);
        adapter.register(EventTag::UnitCreateAck, handle_unit_create_ack);
        adapter.register(EventTag::JobComplete, handle_job_complete);
        Ok(adapter)
    }

    /// Persist ticks and scaling events to `store` as they happen.
    pub fn with_store(mut self, store: RunStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = run_id.into();
        self
    }

    /// Install `handler` for `tag`, returning the one it replaces.
    pub fn register(&mut self, tag: EventTag, handler: Handler) -> Option<Handler> {
        self.handlers.insert(tag, handler)
    }

    pub fn unregister(&mut self, tag: EventTag) -> Option<Handler> {
        self.handlers.remove(&tag)
    }

    pub fn engine(&self) -> &DecisionEngine {
        &self.engine
    }

    pub fn lifecycle(&self) -> &LifecycleManager {
        &self.lifecycle
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn horizon(&self) -> VirtualTime {
        self.horizon
    }

    pub fn ticks(&self) -> &[TickRecord] {
        &self.ticks
    }

    pub fn events(&self) -> &[ScalingEventRecord] {
        &self.events
    }

    /// Request the initial fleet, submit the initial jobs, and arm the
    /// periodic timers.
    pub fn start(&mut self, kernel: &mut dyn SimKernel) -> AdapterResult<()> {
        let units = self.lifecycle.scale_up(self.initial_units, kernel);
        info!(run_id = %self.run_id, units = units.len(), horizon = self.horizon, "simulation starting");

        if let Some(source) = self.source.as_mut() {
            for request in source.initial_batch() {
                self.lifecycle.submit_job(request.length, kernel);
            }
        }

        if self.monitor_interval <= self.horizon {
            kernel.schedule_timer(self.monitor_interval, TimerTag::Monitor);
        }
        if self.source.is_some() && self.arrival_allowed(kernel.now() + self.arrivals.arrival_interval) {
            kernel.schedule_timer(self.arrivals.arrival_interval, TimerTag::JobArrival);
        }
        Ok(())
    }

    /// Route one event through the handler table.
    ///
    /// An event whose tag has no handler is logged and dropped.
    pub fn dispatch(&mut self, event: SimEvent, kernel: &mut dyn SimKernel) -> AdapterResult<()> {
        let tag = event.tag();
        match self.handlers.get(&tag).copied() {
            Some(handler) => handler(self, event, kernel),
            None => {
                warn!(?tag, "no handler registered, event ignored");
                Ok(())
            }
        }
    }

    /// Sample, decide, act, record, re-arm.
    pub fn on_monitor_tick(&mut self, kernel: &mut dyn SimKernel) -> AdapterResult<ScalingDecision> {
        let now = kernel.now();

        let sample = Sampler::sample(self.lifecycle.registry(), kernel);
        self.lifecycle.record_utilization(&sample);

        let unit_count = self.lifecycle.unit_count();
        let decision = self.engine.evaluate(&sample, unit_count, now);

        match decision {
            ScalingDecision::ScaleUp { count } => {
                let units = self.lifecycle.scale_up(count, kernel);
                self.record_event(now, ScalingEventKind::ScaleUp, units, 0, 0)?;
            }
            ScalingDecision::ScaleDown { count } => {
                let report = self.lifecycle.scale_down(count, &sample, kernel);
                if !report.reclaimed.is_empty() {
                    self.record_event(
                        now,
                        ScalingEventKind::ScaleDown,
                        report.reclaimed,
                        report.migration.moved,
                        report.migration.requeued,
                    )?;
                }
            }
            ScalingDecision::NoAction => {}
        }

        self.lifecycle.onboard_pending(kernel);
        self.record_tick(now, sample.mean(), decision)?;

        let next = now + self.monitor_interval;
        if next <= self.horizon {
            kernel.schedule_timer(self.monitor_interval, TimerTag::Monitor);
        } else {
            debug!(now, horizon = self.horizon, "monitor timer disarmed");
        }
        Ok(decision)
    }

    /// Pull a batch from the job source, submit it, re-arm.
    ///
    /// Returns the number of jobs submitted.
    pub fn on_job_arrival(&mut self, kernel: &mut dyn SimKernel) -> AdapterResult<usize> {
        let now = kernel.now();
        let Some(source) = self.source.as_mut() else {
            return Ok(0);
        };

        let batch = source.next_batch(now);
        for request in &batch {
            self.lifecycle.submit_job(request.length, kernel);
        }
        debug!(now, jobs = batch.len(), pending = self.lifecycle.registry().pending_len(), "jobs arrived");

        if self.arrival_allowed(now + self.arrivals.arrival_interval) {
            kernel.schedule_timer(self.arrivals.arrival_interval, TimerTag::JobArrival);
        }
        Ok(batch.len())
    }

    pub fn on_unit_create_ack(
        &mut self,
        unit: UnitId,
        success: bool,
        kernel: &mut dyn SimKernel,
    ) -> AdapterResult<()> {
        let was_provisioning = self
            .lifecycle
            .registry()
            .unit(unit)
            .is_some_and(|u| u.status == UnitStatus::Provisioning);

        self.lifecycle.on_unit_create_ack(unit, success, kernel);

        if !success && was_provisioning {
            self.record_event(kernel.now(), ScalingEventKind::CreateFailed, vec![unit], 0, 0)?;
        }
        Ok(())
    }

    pub fn on_job_complete(&mut self, job: JobId, kernel: &mut dyn SimKernel) -> AdapterResult<()> {
        self.lifecycle.on_job_complete(job, kernel);
        Ok(())
    }

    fn arrival_allowed(&self, at: VirtualTime) -> bool {
        at <= self.horizon && self.arrivals.stop_after.is_none_or(|stop| at <= stop)
    }

    fn record_tick(
        &mut self,
        time: VirtualTime,
        mean_utilization: Option<f64>,
        decision: ScalingDecision,
    ) -> AdapterResult<()> {
        let registry = self.lifecycle.registry();
        let running_jobs = registry.running_count();

        let record = TickRecord {
            run_id: self.run_id.clone(),
            seq: self.ticks.len() as u64,
            time,
            active_units: registry.count(UnitStatus::Active),
            provisioning_units: registry.count(UnitStatus::Provisioning),
            mean_utilization,
            decision,
            pending_jobs: registry.pending_len() as u32,
            running_jobs,
        };

        if let Some(store) = &self.store {
            store.put_tick(&record)?;
        }
        self.ticks.push(record);
        Ok(())
    }

    fn record_event(
        &mut self,
        time: VirtualTime,
        kind: ScalingEventKind,
        units: Vec<UnitId>,
        moved: u32,
        requeued: u32,
    ) -> AdapterResult<()> {
        let record = ScalingEventRecord {
            run_id: self.run_id.clone(),
            seq: self.events.len() as u64,
            time,
            kind,
            units,
            moved,
            requeued,
        };

        if let Some(store) = &self.store {
            store.put_event(&record)?;
        }
        self.events.push(record);
        Ok(())
    }
}

fn handle_monitor_tick(
    adapter: &mut SchedulingAdapter,
    _event: SimEvent,
    kernel: &mut dyn SimKernel,
) -> AdapterResult<()> {
    adapter.on_monitor_tick(kernel).map(|_| ())
}

fn handle_job_arrival(
    adapter: &mut SchedulingAdapter,
    _event: SimEvent,
    kernel: &mut dyn SimKernel,
) -> AdapterResult<()> {
    adapter.on_job_arrival(kernel).map(|_| ())
}

fn handle_unit_create_ack(
    adapter: &mut SchedulingAdapter,
    event: SimEvent,
    kernel: &mut dyn SimKernel,
) -> AdapterResult<()> {
    if let SimEvent::UnitCreateAck { unit, success } = event {
        adapter.on_unit_create_ack(unit, success, kernel)?;
    }
    Ok(())
}

fn handle_job_complete(
    adapter: &mut SchedulingAdapter,
    event: SimEvent,
    kernel: &mut dyn SimKernel,
) -> AdapterResult<()> {
    if let SimEvent::JobComplete { job } = event {
        adapter.on_job_complete(job, kernel)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use elastisim_core::{ConfigError, PolicyConfig, SimulationConfig, UnitConfig};

    use crate::error::AdapterError;

    use crate::kernel::LocalKernel;
    use crate::workload::ScriptedSource;

    fn config(until: f64) -> ElastiConfig {
        ElastiConfig {
            policy: PolicyConfig::new(0.8, 0.2, 0.0, 1, 10.0),
            unit: UnitConfig::default(),
            workload: Some(WorkloadConfig {
                arrival_interval: 15.0,
                stop_after: Some(30.0),
                ..WorkloadConfig::default()
            }),
            simulation: SimulationConfig {
                until,
                ..SimulationConfig::default()
            },
        }
    }

    fn drain(adapter: &mut SchedulingAdapter, kernel: &mut LocalKernel) -> Vec<(VirtualTime, SimEvent)> {
        let mut seen = Vec::new();
        while let Some(event) = kernel.next_event_until(adapter.horizon()) {
            seen.push((kernel.now(), event));
            adapter.dispatch(event, kernel).unwrap();
        }
        seen
    }

    #[test]
    fn start_requests_fleet_and_arms_timers() {
        let cfg = config(100.0);
        let mut kernel = LocalKernel::new(&cfg.simulation);
        let source = ScriptedSource::new(vec![1000.0], vec![]);
        let mut adapter = SchedulingAdapter::new(&cfg, Some(Box::new(source))).unwrap();

        adapter.start(&mut kernel).unwrap();

        // One creation ack plus the monitor and arrival timers.
        assert_eq!(kernel.queued(), 3);
        assert_eq!(adapter.lifecycle().unit_count(), 1);
        assert_eq!(adapter.lifecycle().registry().pending_len(), 1);
    }

    #[test]
    fn monitor_timer_rearms_until_horizon() {
        let cfg = config(45.0);
        let mut kernel = LocalKernel::new(&cfg.simulation);
        let mut adapter = SchedulingAdapter::new(&cfg, None).unwrap();
        adapter.start(&mut kernel).unwrap();

        let seen = drain(&mut adapter, &mut kernel);

        let ticks: Vec<VirtualTime> = seen
            .iter()
            .filter(|(_, e)| *e == SimEvent::MonitorTick)
            .map(|(t, _)| *t)
            .collect();
        assert_eq!(ticks, vec![10.0, 20.0, 30.0, 40.0]);
        assert_eq!(adapter.ticks().len(), 4);
        assert_eq!(kernel.queued(), 0);
    }

    #[test]
    fn arrivals_stop_after_cutoff() {
        let cfg = config(100.0);
        let mut kernel = LocalKernel::new(&cfg.simulation);
        let source = ScriptedSource::new(vec![], vec![vec![10.0], vec![10.0], vec![10.0]]);
        let mut adapter = SchedulingAdapter::new(&cfg, Some(Box::new(source))).unwrap();
        adapter.start(&mut kernel).unwrap();

        let seen = drain(&mut adapter, &mut kernel);

        let arrivals: Vec<VirtualTime> = seen
            .iter()
            .filter(|(_, e)| *e == SimEvent::JobArrival)
            .map(|(t, _)| *t)
            .collect();
        assert_eq!(arrivals, vec![15.0, 30.0]);
        assert_eq!(adapter.lifecycle().stats().jobs_submitted, 2);
    }

    #[test]
    fn unregistered_tag_is_ignored() {
        let cfg = config(100.0);
        let mut kernel = LocalKernel::new(&cfg.simulation);
        let mut adapter = SchedulingAdapter::new(&cfg, None).unwrap();
        adapter.unregister(EventTag::MonitorTick);

        adapter.dispatch(SimEvent::MonitorTick, &mut kernel).unwrap();
        assert!(adapter.ticks().is_empty());
        assert_eq!(kernel.queued(), 0);
    }

    #[test]
    fn handlers_can_be_replaced() {
        fn count_only(
            adapter: &mut SchedulingAdapter,
            _event: SimEvent,
            _kernel: &mut dyn SimKernel,
        ) -> AdapterResult<()> {
            adapter.run_id = "replaced".to_string();
            Ok(())
        }

        let cfg = config(100.0);
        let mut kernel = LocalKernel::new(&cfg.simulation);
        let mut adapter = SchedulingAdapter::new(&cfg, None).unwrap();
        assert!(adapter.register(EventTag::JobArrival, count_only).is_some());

        adapter.dispatch(SimEvent::JobArrival, &mut kernel).unwrap();
        assert_eq!(adapter.run_id(), "replaced");
    }

    #[test]
    fn provisioning_only_tick_is_no_action() {
        let cfg = config(100.0);
        let mut kernel = LocalKernel::new(&cfg.simulation);
        let mut adapter = SchedulingAdapter::new(&cfg, None).unwrap();
        adapter.start(&mut kernel).unwrap();

        // Tick before the creation ack is delivered.
        let decision = adapter.on_monitor_tick(&mut kernel).unwrap();

        assert_eq!(decision, ScalingDecision::NoAction);
        let tick = &adapter.ticks()[0];
        assert_eq!(tick.provisioning_units, 1);
        assert_eq!(tick.mean_utilization, None);
    }

    #[test]
    fn failed_creation_is_recorded() {
        let mut cfg = config(20.0);
        cfg.simulation.fail_creates = vec![0];
        cfg.unit.initial_units = 2;
        let mut kernel = LocalKernel::new(&cfg.simulation);
        let mut adapter = SchedulingAdapter::new(&cfg, None).unwrap();
        adapter.start(&mut kernel).unwrap();

        drain(&mut adapter, &mut kernel);

        let failed: Vec<&ScalingEventRecord> = adapter
            .events()
            .iter()
            .filter(|e| e.kind == ScalingEventKind::CreateFailed)
            .collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].units, vec![UnitId(0)]);
        assert_eq!(adapter.lifecycle().unit_count(), 1);
    }

    #[test]
    fn store_receives_ticks_and_events() {
        let cfg = config(25.0);
        let store = RunStore::open_in_memory().unwrap();
        let mut kernel = LocalKernel::new(&cfg.simulation);
        let mut adapter = SchedulingAdapter::new(&cfg, None)
            .unwrap()
            .with_store(store.clone())
            .with_run_id("adapter-test");
        adapter.start(&mut kernel).unwrap();

        drain(&mut adapter, &mut kernel);

        let ticks = store.list_ticks("adapter-test").unwrap();
        assert_eq!(ticks.len(), 2);
        assert_eq!(ticks, adapter.ticks());
    }

    #[test]
    fn invalid_config_is_rejected() {
        let mut cfg = config(100.0);
        cfg.policy.upper_threshold = 0.1;
        assert!(matches!(
            SchedulingAdapter::new(&cfg, None),
            Err(AdapterError::Config(ConfigError::Thresholds { .. }))
        ));
    }
}
