//! Scheduler error types.

use elastisim_core::{JobId, UnitId, UnitStatus};
use thiserror::Error;

/// Errors returned by the registry's checked operations.
#[derive(Debug, Error, PartialEq)]
pub enum SchedulerError {
    #[error("unit not found: {0}")]
    UnitNotFound(UnitId),

    #[error("job not found: {0}")]
    JobNotFound(JobId),

    #[error("invalid transition for {unit}: {from:?} -> {to:?}")]
    InvalidTransition {
        unit: UnitId,
        from: UnitStatus,
        to: UnitStatus,
    },

    #[error("{unit} is not accepting jobs (status {status:?})")]
    NotAccepting { unit: UnitId, status: UnitStatus },

    #[error("job already completed: {0}")]
    JobCompleted(JobId),
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;
