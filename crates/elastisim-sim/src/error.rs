//! Adapter error types.

use thiserror::Error;

/// Errors that stop a simulation run.
///
/// Registry failures are not among them: the lifecycle manager recovers
/// from those itself and logs them.
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("invalid configuration: {0}")]
    Config(#[from] elastisim_core::ConfigError),

    #[error("run store error: {0}")]
    State(#[from] elastisim_state::StateError),
}

pub type AdapterResult<T> = Result<T, AdapterError>;
