//! Events delivered by the kernel to the adapter.

use elastisim_core::{JobId, UnitId};
use serde::{Deserialize, Serialize};

/// Routing key of the adapter's callback table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventTag {
    MonitorTick,
    JobArrival,
    UnitCreateAck,
    JobComplete,
}

/// An event with its payload.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SimEvent {
    MonitorTick,
    JobArrival,
    UnitCreateAck { unit: UnitId, success: bool },
    JobComplete { job: JobId },
}

impl SimEvent {
    pub fn tag(&self) -> EventTag {
        match self {
            SimEvent::MonitorTick => EventTag::MonitorTick,
            SimEvent::JobArrival => EventTag::JobArrival,
            SimEvent::UnitCreateAck { .. } => EventTag::UnitCreateAck,
            SimEvent::JobComplete { .. } => EventTag::JobComplete,
        }
    }
}
