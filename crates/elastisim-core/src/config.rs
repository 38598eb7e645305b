//! elastisim.toml scenario parser.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};
use crate::types::UnitSpec;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElastiConfig {
    pub policy: PolicyConfig,
    #[serde(default)]
    pub unit: UnitConfig,
    pub workload: Option<WorkloadConfig>,
    #[serde(default)]
    pub simulation: SimulationConfig,
}

/// How the lifecycle manager picks units to reclaim on scale-down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReclaimStrategy {
    /// Lowest sampled utilization first, oldest first on ties.
    #[default]
    LeastUtilized,
    /// Highest correlation with the host's utilization history.
    MaxCorrelation,
}

/// Scaling policy parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Mean utilization above which units are added.
    pub upper_threshold: f64,
    /// Mean utilization below which units are removed.
    pub lower_threshold: f64,
    /// Minimum virtual seconds between two scaling actions.
    pub cooldown: f64,
    pub min_units: u32,
    pub max_units: Option<u32>,
    /// Virtual seconds between monitor ticks.
    pub monitor_interval: f64,
    /// Units added per unit of overload above `upper_threshold`.
    #[serde(default = "default_scale_factor")]
    pub scale_factor: f64,
    #[serde(default)]
    pub reclaim: ReclaimStrategy,
}

fn default_scale_factor() -> f64 {
    10.0
}

impl PolicyConfig {
    /// Build a policy from the five core knobs; everything else defaults.
    pub fn new(
        upper_threshold: f64,
        lower_threshold: f64,
        cooldown: f64,
        min_units: u32,
        monitor_interval: f64,
    ) -> Self {
        Self {
            upper_threshold,
            lower_threshold,
            cooldown,
            min_units,
            max_units: None,
            monitor_interval,
            scale_factor: default_scale_factor(),
            reclaim: ReclaimStrategy::default(),
        }
    }

    pub fn with_max_units(mut self, max_units: u32) -> Self {
        self.max_units = Some(max_units);
        self
    }

    pub fn with_scale_factor(mut self, scale_factor: f64) -> Self {
        self.scale_factor = scale_factor;
        self
    }

    pub fn with_reclaim(mut self, reclaim: ReclaimStrategy) -> Self {
        self.reclaim = reclaim;
        self
    }

    pub fn validate(&self) -> ConfigResult<()> {
        let (lower, upper) = (self.lower_threshold, self.upper_threshold);
        // Written so that NaN fails every comparison.
        if !(lower >= 0.0 && lower < upper && upper <= 1.0) {
            return Err(ConfigError::Thresholds { lower, upper });
        }
        if !(self.cooldown.is_finite() && self.cooldown >= 0.0) {
            return Err(ConfigError::Cooldown(self.cooldown));
        }
        if !(self.scale_factor.is_finite() && self.scale_factor > 0.0) {
            return Err(ConfigError::ScaleFactor(self.scale_factor));
        }
        if self.min_units == 0 {
            return Err(ConfigError::MinUnits);
        }
        if let Some(max) = self.max_units
            && max < self.min_units
        {
            return Err(ConfigError::MaxUnits {
                min: self.min_units,
                max,
            });
        }
        if !(self.monitor_interval.is_finite() && self.monitor_interval > 0.0) {
            return Err(ConfigError::MonitorInterval(self.monitor_interval));
        }
        Ok(())
    }
}

/// Shape of every unit the scaler creates, plus the starting fleet size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UnitConfig {
    pub mips: f64,
    pub pes: u32,
    pub jobs_per_pe: u32,
    pub initial_units: u32,
}

impl Default for UnitConfig {
    fn default() -> Self {
        let spec = UnitSpec::default();
        Self {
            mips: spec.mips,
            pes: spec.pes,
            jobs_per_pe: spec.jobs_per_pe,
            initial_units: 1,
        }
    }
}

impl UnitConfig {
    pub fn spec(&self) -> UnitSpec {
        UnitSpec {
            mips: self.mips,
            pes: self.pes,
            jobs_per_pe: self.jobs_per_pe,
        }
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if !(self.mips.is_finite() && self.mips > 0.0) {
            return Err(ConfigError::UnitSpec(format!("mips must be positive, got {}", self.mips)));
        }
        if self.pes == 0 {
            return Err(ConfigError::UnitSpec("pes must be at least 1".to_string()));
        }
        if self.jobs_per_pe == 0 {
            return Err(ConfigError::UnitSpec("jobs_per_pe must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// Synthetic job source that grows load over virtual time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkloadConfig {
    /// Virtual seconds between arrival batches.
    pub arrival_interval: f64,
    /// Jobs submitted before the first tick.
    pub initial_jobs: u32,
    /// Jobs per batch at time zero.
    pub base_batch: u32,
    /// One extra job per batch for every `growth_period` seconds elapsed.
    pub growth_period: f64,
    pub base_length: f64,
    /// Extra job length per elapsed virtual second.
    pub length_growth: f64,
    /// Upper bound of the uniform random length added to each job.
    pub jitter: f64,
    /// No batches are generated after this time.
    pub stop_after: Option<f64>,
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            arrival_interval: 15.0,
            initial_jobs: 4,
            base_batch: 1,
            growth_period: 100.0,
            base_length: 20_000.0,
            length_growth: 200.0,
            jitter: 10_000.0,
            stop_after: Some(400.0),
        }
    }
}

impl WorkloadConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        if !(self.arrival_interval.is_finite() && self.arrival_interval > 0.0) {
            return Err(ConfigError::Workload(format!(
                "arrival_interval must be positive, got {}",
                self.arrival_interval
            )));
        }
        if !(self.growth_period.is_finite() && self.growth_period > 0.0) {
            return Err(ConfigError::Workload(format!(
                "growth_period must be positive, got {}",
                self.growth_period
            )));
        }
        if !(self.base_length > 0.0 && self.length_growth >= 0.0 && self.jitter >= 0.0) {
            return Err(ConfigError::Workload(
                "job lengths must be positive and growth/jitter non-negative".to_string(),
            ));
        }
        Ok(())
    }
}

/// Settings for the reference kernel and the run itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Virtual time horizon; timers stop re-arming past it.
    pub until: f64,
    pub seed: u64,
    /// Delay between a creation request and its acknowledgment.
    pub provisioning_delay: f64,
    /// Readings kept per unit for correlation scoring.
    pub history_window: usize,
    /// Unit ids whose creation the resource model rejects.
    pub fail_creates: Vec<u64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            until: 600.0,
            seed: 42,
            provisioning_delay: 1.0,
            history_window: 30,
            fail_creates: Vec::new(),
        }
    }
}

impl SimulationConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        if !(self.until.is_finite() && self.until > 0.0) {
            return Err(ConfigError::Simulation(format!("until must be positive, got {}", self.until)));
        }
        if !(self.provisioning_delay.is_finite() && self.provisioning_delay >= 0.0) {
            return Err(ConfigError::Simulation(format!(
                "provisioning_delay must be non-negative, got {}",
                self.provisioning_delay
            )));
        }
        if self.history_window < 2 {
            return Err(ConfigError::Simulation("history_window must be at least 2".to_string()));
        }
        Ok(())
    }
}

impl ElastiConfig {
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate.
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        let config: ElastiConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> ConfigResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        self.policy.validate()?;
        self.unit.validate()?;
        if let Some(workload) = &self.workload {
            workload.validate()?;
        }
        self.simulation.validate()?;
        if self.unit.initial_units < self.policy.min_units {
            return Err(ConfigError::UnitSpec(format!(
                "initial_units ({}) is below min_units ({})",
                self.unit.initial_units, self.policy.min_units
            )));
        }
        Ok(())
    }

    /// A scenario that ramps load up, then lets it drain.
    pub fn scaffold() -> Self {
        ElastiConfig {
            policy: PolicyConfig::new(0.7, 0.3, 30.0, 1, 10.0).with_max_units(8),
            unit: UnitConfig::default(),
            workload: Some(WorkloadConfig::default()),
            simulation: SimulationConfig::default(),
        }
    }
}
