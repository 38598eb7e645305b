//! Decision engine: maps a tick's utilization sample to a scaling decision.
//!
//! The engine is a pure step function over virtual time apart from one
//! observable side effect: any decision other than `NoAction` stamps the
//! cooldown state with the current time.

use elastisim_core::{ConfigResult, PolicyConfig, ScalingDecision, UtilizationSample, VirtualTime};
use tracing::debug;

/// Cooldown bookkeeping for one running policy.
#[derive(Debug, Clone, PartialEq)]
pub struct CooldownState {
    /// Virtual time of the last scaling action, if any.
    pub last_action: Option<VirtualTime>,
    /// Minimum gap between two scaling actions.
    pub cooldown: VirtualTime,
}

impl CooldownState {
    pub fn new(cooldown: VirtualTime) -> Self {
        Self {
            last_action: None,
            cooldown,
        }
    }

    /// Whether `now` still falls inside the window opened by the last action.
    pub fn is_cooling(&self, now: VirtualTime) -> bool {
        match self.last_action {
            Some(last) => now - last < self.cooldown,
            None => false,
        }
    }
}

/// Threshold-and-cooldown scaling policy.
#[derive(Debug, Clone)]
pub struct DecisionEngine {
    policy: PolicyConfig,
    cooldown: CooldownState,
}

impl DecisionEngine {
    /// Create an engine, rejecting invalid policies up front.
    pub fn new(policy: PolicyConfig) -> ConfigResult<Self> {
        policy.validate()?;
        let cooldown = CooldownState::new(policy.cooldown);
        Ok(Self { policy, cooldown })
    }

    pub fn policy(&self) -> &PolicyConfig {
        &self.policy
    }

    pub fn cooldown_state(&self) -> &CooldownState {
        &self.cooldown
    }

    /// Evaluate one monitor tick.
    ///
    /// `samples` must hold readings for Active units only; `unit_count` is
    /// the number of Active plus Provisioning units.
    pub fn evaluate(
        &mut self,
        samples: &UtilizationSample,
        unit_count: u32,
        now: VirtualTime,
    ) -> ScalingDecision {
        if unit_count == 0 {
            return ScalingDecision::NoAction;
        }

        if self.cooldown.is_cooling(now) {
            debug!(
                now,
                last_action = ?self.cooldown.last_action,
                cooldown = self.cooldown.cooldown,
                "in cooldown, skipping evaluation"
            );
            return ScalingDecision::NoAction;
        }

        // Every unit is still provisioning: nothing measured yet.
        let Some(mean) = samples.mean() else {
            return ScalingDecision::NoAction;
        };

        let decision = self.decide(mean, unit_count);

        if decision.is_action() {
            self.cooldown.last_action = Some(now);
        }

        debug!(
            now,
            mean,
            unit_count,
            active = samples.len(),
            ?decision,
            "evaluated utilization"
        );
        decision
    }

    fn decide(&self, mean: f64, unit_count: u32) -> ScalingDecision {
        let p = &self.policy;

        if mean > p.upper_threshold {
            let wanted = ((mean - p.upper_threshold) * p.scale_factor).ceil().max(1.0) as u32;
            let count = match p.max_units {
                Some(max) => wanted.min(max.saturating_sub(unit_count)),
                None => wanted,
            };
            if count == 0 {
                debug!(unit_count, max_units = ?p.max_units, "at max units, not scaling up");
                return ScalingDecision::NoAction;
            }
            return ScalingDecision::ScaleUp { count };
        }

        if mean < p.lower_threshold && unit_count > p.min_units {
            let wanted = ((p.lower_threshold - mean) * f64::from(unit_count)).ceil() as u32;
            let count = wanted.min(unit_count - p.min_units);
            if count == 0 {
                return ScalingDecision::NoAction;
            }
            return ScalingDecision::ScaleDown { count };
        }

        ScalingDecision::NoAction
    }
}
