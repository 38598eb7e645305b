//! Utilization sampler.

use elastisim_core::{SimKernel, UnitStatus, UtilizationSample};
use elastisim_scheduler::UnitRegistry;
use tracing::trace;

pub struct Sampler;

impl Sampler {
    /// Read the current load of every Active unit.
    ///
    /// Provisioning units have nothing to measure yet and Draining units are
    /// on their way out; neither appears in the sample.
    pub fn sample(registry: &UnitRegistry, kernel: &mut dyn SimKernel) -> UtilizationSample {
        let now = kernel.now();
        let mut sample = UtilizationSample::new();
        for unit in registry.units_with_status(UnitStatus::Active) {
            let utilization = kernel.sample_utilization(unit.id);
            trace!(unit = %unit.id, utilization, "sampled");
            sample.insert(unit.id, utilization, now);
        }
        sample
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use elastisim_core::{SimulationConfig, Unit, UnitId, UnitSpec};

    use crate::kernel::LocalKernel;

    #[test]
    fn samples_only_active_units() {
        let mut kernel = LocalKernel::new(&SimulationConfig::default());
        let mut registry = UnitRegistry::new();
        for status in [UnitStatus::Active, UnitStatus::Provisioning, UnitStatus::Active] {
            let id = registry.allocate_unit_id();
            registry.insert_unit(Unit::new(id, UnitSpec::default(), 0.0));
            if status == UnitStatus::Active {
                registry.transition(id, UnitStatus::Active, 0.0).unwrap();
            }
        }
        registry.transition(UnitId(2), UnitStatus::Draining, 0.0).unwrap();

        let sample = Sampler::sample(&registry, &mut kernel);

        assert_eq!(sample.len(), 1);
        assert_eq!(sample.get(UnitId(0)), Some(0.0));
        assert!(sample.get(UnitId(1)).is_none());
        assert!(sample.get(UnitId(2)).is_none());
    }
}
