//! elastisim-sim — runs the auto-scaling loop over virtual time.
//!
//! Wires the decision engine and the lifecycle manager to a simulation
//! kernel through an event-tag callback table, and ships a deterministic
//! reference kernel plus a seeded workload so whole scenarios can be run
//! from a config file.
//!
//! # Architecture
//!
//! ```text
//! Simulation
//!   ├── LocalKernel (virtual clock, event heap, time-shared execution)
//!   └── SchedulingAdapter
//!       ├── handlers: EventTag → Handler
//!       ├── DecisionEngine (elastisim-autoscale)
//!       ├── LifecycleManager (elastisim-scheduler)
//!       ├── JobSource (WorkloadGenerator or any other)
//!       └── RunStore (optional, elastisim-state)
//! ```
//!
//! # Monitor tick
//!
//! ```text
//! sample Active units → evaluate → scale up | scale down (drain, migrate,
//! destroy) → onboard pending → record tick → re-arm timer
//! ```

pub mod adapter;
pub mod error;
pub mod event;
pub mod kernel;
pub mod sampler;
pub mod simulation;
pub mod workload;

pub use adapter::{Handler, SchedulingAdapter};
pub use error::{AdapterError, AdapterResult};
pub use event::{EventTag, SimEvent};
pub use kernel::LocalKernel;
pub use sampler::Sampler;
pub use simulation::{Simulation, SimulationReport, TimelinePoint};
pub use workload::{JobRequest, JobSource, ScriptedSource, WorkloadGenerator};
