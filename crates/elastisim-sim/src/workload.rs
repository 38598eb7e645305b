//! Job sources.
//!
//! The adapter pulls batches from any [`JobSource`]. [`WorkloadGenerator`]
//! is a seeded source whose batches grow in size and job length over
//! virtual time; [`ScriptedSource`] replays a fixed list.

use std::collections::VecDeque;

use elastisim_core::{VirtualTime, WorkloadConfig};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// A job to submit, before it gets an id.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JobRequest {
    pub length: f64,
}

/// External supplier of work.
pub trait JobSource {
    /// Jobs submitted once, when the simulation starts.
    fn initial_batch(&mut self) -> Vec<JobRequest> {
        Vec::new()
    }

    /// Jobs arriving at `now`.
    fn next_batch(&mut self, now: VirtualTime) -> Vec<JobRequest>;
}

/// Seeded synthetic workload.
///
/// ```text
/// batch  = base_batch + floor(now / growth_period)
/// length = base_length + now * length_growth + uniform(0, jitter)
/// ```
pub struct WorkloadGenerator {
    config: WorkloadConfig,
    rng: StdRng,
}

impl WorkloadGenerator {
    pub fn new(config: WorkloadConfig, seed: u64) -> Self {
        Self {
            config,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn config(&self) -> &WorkloadConfig {
        &self.config
    }

    /// Number of jobs in the batch arriving at `now`.
    pub fn batch_size(&self, now: VirtualTime) -> u32 {
        let growth = (now.max(0.0) / self.config.growth_period).floor() as u32;
        self.config.base_batch.saturating_add(growth)
    }

    fn job(&mut self, now: VirtualTime) -> JobRequest {
        let jitter = if self.config.jitter > 0.0 {
            self.rng.gen_range(0.0..self.config.jitter)
        } else {
            0.0
        };
        JobRequest {
            length: self.config.base_length + now.max(0.0) * self.config.length_growth + jitter,
        }
    }
}

impl JobSource for WorkloadGenerator {
    fn initial_batch(&mut self) -> Vec<JobRequest> {
        (0..self.config.initial_jobs).map(|_| self.job(0.0)).collect()
    }

    fn next_batch(&mut self, now: VirtualTime) -> Vec<JobRequest> {
        (0..self.batch_size(now)).map(|_| self.job(now)).collect()
    }
}

/// Replays predefined batches, one per arrival, then goes quiet.
#[derive(Debug, Clone, Default)]
pub struct ScriptedSource {
    initial: Vec<f64>,
    batches: VecDeque<Vec<f64>>,
}

impl ScriptedSource {
    pub fn new(initial: Vec<f64>, batches: Vec<Vec<f64>>) -> Self {
        Self {
            initial,
            batches: batches.into(),
        }
    }
}

impl JobSource for ScriptedSource {
    fn initial_batch(&mut self) -> Vec<JobRequest> {
        self.initial
            .drain(..)
            .map(|length| JobRequest { length })
            .collect()
    }

    fn next_batch(&mut self, _now: VirtualTime) -> Vec<JobRequest> {
        self.batches
            .pop_front()
            .unwrap_or_default()
            .into_iter()
            .map(|length| JobRequest { length })
            .collect()
    }
}
