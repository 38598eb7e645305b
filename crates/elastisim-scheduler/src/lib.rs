//! elastisim-scheduler — unit lifecycle and job placement.
//!
//! Owns the authoritative fleet state for one simulation and applies the
//! decisions made by the autoscaler:
//!
//! - Requests new units and activates them on acknowledgment
//! - Picks units to reclaim, drains them, then destroys them
//! - Places pending jobs first-fit onto the newest active units
//! - Moves in-flight jobs off a draining unit, requeueing what does not fit
//!
//! # Architecture
//!
//! ```text
//! LifecycleManager
//!   ├── UnitRegistry (units, jobs, FIFO pending queue)
//!   ├── Migrator (drain one unit onto the survivors)
//!   └── elastisim-placement (reclaim order, destinations, consolidation)
//! ```

pub mod error;
pub mod lifecycle;
pub mod migrator;
pub mod registry;

#[cfg(test)]
mod testing;

pub use error::{SchedulerError, SchedulerResult};
pub use lifecycle::{LifecycleManager, LifecycleStats, ScaleDownReport};
pub use migrator::{MigrationResult, Migrator};
pub use registry::UnitRegistry;
