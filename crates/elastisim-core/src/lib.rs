//! elastisim-core — shared types for the elastisim auto-scaling loop.
//!
//! Everything the other crates agree on lives here: unit and job records,
//! the scaling decision type, the scenario configuration, and the
//! [`SimKernel`] trait through which the core talks to the external
//! simulation kernel and resource model.

pub mod config;
pub mod error;
pub mod kernel;
pub mod types;

pub use config::{
    ElastiConfig, PolicyConfig, ReclaimStrategy, SimulationConfig, UnitConfig, WorkloadConfig,
};
pub use error::{ConfigError, ConfigResult};
pub use kernel::{SimKernel, TimerTag};
pub use types::*;
