//! elastisim-autoscale — threshold-driven unit scaling.
//!
//! Consumes one tick's `UtilizationSample`, compares the mean utilization
//! of active units against the policy thresholds, and emits a
//! `ScalingDecision`. A cooldown window suppresses any further action
//! until it elapses.
//!
//! # Scaling Algorithm
//!
//! ```text
//! mean = average utilization over Active units
//!
//! if now - last_action < cooldown:
//!     NoAction
//!
//! if mean > upper:
//!     ScaleUp(max(1, ceil((mean - upper) * scale_factor)))
//!
//! if mean < lower and units > min_units:
//!     ScaleDown(min(ceil((lower - mean) * units), units - min_units))
//! ```

pub mod scaler;

pub use scaler::{CooldownState, DecisionEngine};
