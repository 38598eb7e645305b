//! Configuration error types.

use thiserror::Error;

/// Result type alias for configuration loading and validation.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Invalid or unreadable scenario configuration.
///
/// Always raised before a simulation starts; never during evaluation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("thresholds must satisfy 0 <= lower < upper <= 1 (lower = {lower}, upper = {upper})")]
    Thresholds { lower: f64, upper: f64 },

    #[error("cooldown must be finite and non-negative, got {0}")]
    Cooldown(f64),

    #[error("scale factor must be finite and positive, got {0}")]
    ScaleFactor(f64),

    #[error("min_units must be at least 1")]
    MinUnits,

    #[error("max_units ({max}) must not be below min_units ({min})")]
    MaxUnits { min: u32, max: u32 },

    #[error("monitor interval must be finite and positive, got {0}")]
    MonitorInterval(f64),

    #[error("invalid unit spec: {0}")]
    UnitSpec(String),

    #[error("invalid workload: {0}")]
    Workload(String),

    #[error("invalid simulation settings: {0}")]
    Simulation(String),

    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to render config: {0}")]
    Render(#[from] toml::ser::Error),
}
