//! Simulation driver and end-of-run report.

use elastisim_core::{ElastiConfig, SimKernel, UnitStatus, VirtualTime};
use elastisim_state::{RunStore, ScalingEventRecord};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::adapter::SchedulingAdapter;
use crate::error::AdapterResult;
use crate::kernel::LocalKernel;
use crate::workload::{JobSource, WorkloadGenerator};

/// Fleet size and load at one monitor tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelinePoint {
    pub time: VirtualTime,
    /// Active plus Provisioning.
    pub units: u32,
    pub mean_utilization: Option<f64>,
}

/// Summary of a finished run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationReport {
    pub run_id: String,
    pub ended_at: VirtualTime,
    pub ticks: u64,

    pub units_requested: u32,
    pub units_activated: u32,
    pub units_failed: u32,
    pub units_destroyed: u32,
    pub peak_units: u32,
    pub final_units: u32,

    pub jobs_submitted: u32,
    pub jobs_completed: u32,
    pub jobs_migrated: u32,
    pub jobs_requeued: u32,
    pub jobs_running: u32,
    pub jobs_pending: u32,

    pub timeline: Vec<TimelinePoint>,
    pub scaling_events: Vec<ScalingEventRecord>,
}

impl SimulationReport {
    /// Every submitted job is completed, running, or pending.
    pub fn accounts_for_all_jobs(&self) -> bool {
        self.jobs_completed + self.jobs_running + self.jobs_pending == self.jobs_submitted
    }
}

/// One run: the reference kernel plus the adapter it feeds.
pub struct Simulation {
    adapter: SchedulingAdapter,
    kernel: LocalKernel,
    started: bool,
}

impl Simulation {
    /// Build a run from a validated config, using the seeded workload
    /// generator when the config has a `[workload]` table.
    pub fn from_config(config: &ElastiConfig) -> AdapterResult<Self> {
        let source = config.workload.clone().map(|w| {
            Box::new(WorkloadGenerator::new(w, config.simulation.seed)) as Box<dyn JobSource>
        });
        Self::with_source(config, source)
    }

    /// Build a run fed by an arbitrary job source.
    pub fn with_source(
        config: &ElastiConfig,
        source: Option<Box<dyn JobSource>>,
    ) -> AdapterResult<Self> {
        let adapter = SchedulingAdapter::new(config, source)?;
        let kernel = LocalKernel::new(&config.simulation);
        Ok(Self {
            adapter,
            kernel,
            started: false,
        })
    }

    pub fn with_store(mut self, store: RunStore) -> Self {
        self.adapter = self.adapter.with_store(store);
        self
    }

    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.adapter = self.adapter.with_run_id(run_id);
        self
    }

    pub fn adapter(&self) -> &SchedulingAdapter {
        &self.adapter
    }

    pub fn kernel(&self) -> &LocalKernel {
        &self.kernel
    }

    /// Drive events until the queue drains or the horizon is passed.
    pub fn run(&mut self) -> AdapterResult<SimulationReport> {
        if !self.started {
            self.adapter.start(&mut self.kernel)?;
            self.started = true;
        }

        let horizon = self.adapter.horizon();
        let mut delivered = 0u64;
        while let Some(event) = self.kernel.next_event_until(horizon) {
            self.adapter.dispatch(event, &mut self.kernel)?;
            delivered += 1;
        }

        let report = self.report();
        info!(
            run_id = %report.run_id,
            events = delivered,
            ended_at = report.ended_at,
            peak_units = report.peak_units,
            completed = report.jobs_completed,
            submitted = report.jobs_submitted,
            "simulation finished"
        );
        Ok(report)
    }

    /// Snapshot of the run so far.
    pub fn report(&self) -> SimulationReport {
        let lifecycle = self.adapter.lifecycle();
        let registry = lifecycle.registry();
        let stats = lifecycle.stats();

        let timeline: Vec<TimelinePoint> = self
            .adapter
            .ticks()
            .iter()
            .map(|t| TimelinePoint {
                time: t.time,
                units: t.active_units + t.provisioning_units,
                mean_utilization: t.mean_utilization,
            })
            .collect();

        let jobs_running = registry.running_count();

        SimulationReport {
            run_id: self.adapter.run_id().to_string(),
            ended_at: self.kernel.now(),
            ticks: timeline.len() as u64,
            units_requested: stats.units_requested,
            units_activated: stats.units_activated,
            units_failed: stats.units_failed,
            units_destroyed: stats.units_destroyed,
            peak_units: timeline.iter().map(|p| p.units).max().unwrap_or(0),
            final_units: registry.count(UnitStatus::Active) + registry.count(UnitStatus::Provisioning),
            jobs_submitted: stats.jobs_submitted,
            jobs_completed: stats.jobs_completed,
            jobs_migrated: stats.jobs_migrated,
            jobs_requeued: stats.jobs_requeued,
            jobs_running,
            jobs_pending: registry.pending_len() as u32,
            timeline,
            scaling_events: self.adapter.events().to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use elastisim_core::{PolicyConfig, ScalingDecision, SimulationConfig, UnitConfig};
    use elastisim_state::ScalingEventKind;

    use crate::workload::ScriptedSource;

    fn base_config() -> ElastiConfig {
        let mut config = ElastiConfig::scaffold();
        config.simulation.until = 300.0;
        config
    }

    #[test]
    fn runs_terminate_at_horizon() {
        let mut sim = Simulation::from_config(&base_config()).unwrap();
        let report = sim.run().unwrap();

        assert!(report.ended_at <= 300.0);
        assert_eq!(report.ticks, 30);
        assert!(report.accounts_for_all_jobs());
    }

    #[test]
    fn same_seed_same_report() {
        let config = base_config();
        let a = Simulation::from_config(&config).unwrap().run().unwrap();
        let b = Simulation::from_config(&config).unwrap().run().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn burst_scales_up_then_back_down() {
        // Eight long jobs on one 4-slot unit, then silence.
        let config = ElastiConfig {
            policy: PolicyConfig::new(0.8, 0.3, 20.0, 1, 10.0).with_max_units(4),
            unit: UnitConfig::default(),
            workload: None,
            simulation: SimulationConfig {
                until: 400.0,
                ..SimulationConfig::default()
            },
        };
        let source = ScriptedSource::new(vec![40_000.0; 8], vec![]);
        let mut sim = Simulation::with_source(&config, Some(Box::new(source))).unwrap();

        let report = sim.run().unwrap();

        assert!(report.peak_units > 1, "never scaled up: {report:?}");
        assert_eq!(report.final_units, 1);
        assert_eq!(report.jobs_completed, 8);
        assert!(report.accounts_for_all_jobs());
        assert!(
            report
                .scaling_events
                .iter()
                .any(|e| e.kind == ScalingEventKind::ScaleDown)
        );
        assert!(sim.adapter().ticks().iter().any(|t| matches!(t.decision, ScalingDecision::ScaleUp { .. })));
    }
}
