//! Configuration validation.

use crate::error::{ConfigError, Error, Result};
use crate::MAX_EXTRUDERS;

use super::axis::Axis;
use super::machine::MachineConfig;

/// Validate a machine configuration.
///
/// Checks:
/// - Steps-per-millimeter are positive and finite on every axis
/// - Extruder count is within the supported channel range
/// - Step frequency ceiling and double-step threshold are consistent
/// - Feature flags agree with the endstop wiring and kinematics
pub fn validate_config(config: &MachineConfig) -> Result<()> {
    for axis in Axis::ALL {
        let spm = config.axis(axis).steps_per_mm;
        if !(spm.is_finite() && spm > 0.0) {
            return Err(Error::Config(ConfigError::InvalidStepsPerMm {
                axis: heapless::String::try_from(axis.name()).unwrap_or_default(),
                value: spm,
            }));
        }
    }

    if config.extruders == 0 || config.extruders as usize > MAX_EXTRUDERS {
        return Err(Error::Config(ConfigError::InvalidExtruderCount(
            config.extruders,
        )));
    }

    if config.max_step_frequency.value() == 0 {
        return Err(Error::Config(ConfigError::InvalidMaxStepFrequency(
            config.max_step_frequency.value(),
        )));
    }

    if config.high_speed_stepping
        && config.double_step_frequency >= config.max_step_frequency
    {
        return Err(Error::Config(ConfigError::InvalidDoubleStepFrequency {
            double: config.double_step_frequency.value(),
            max: config.max_step_frequency.value(),
        }));
    }

    // Dual-Z homing gates on the Z switches; without any there is nothing
    // to gate on.
    if config.z_dual_endstops && config.z.min_endstop.is_none() && config.z.max_endstop.is_none() {
        return Err(Error::Config(ConfigError::DualZWithoutZEndstop));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&MachineConfig::default()).is_ok());
    }

    #[test]
    fn test_invalid_steps_per_mm() {
        let mut config = MachineConfig::default();
        config.y.steps_per_mm = -80.0;

        let result = validate_config(&config);
        assert!(matches!(
            result,
            Err(Error::Config(ConfigError::InvalidStepsPerMm { .. }))
        ));
    }

    #[test]
    fn test_invalid_extruder_count() {
        let mut config = MachineConfig::default();
        config.extruders = 5;

        let result = validate_config(&config);
        assert!(matches!(
            result,
            Err(Error::Config(ConfigError::InvalidExtruderCount(5)))
        ));
    }

    #[test]
    fn test_double_step_threshold_must_be_below_max() {
        use crate::config::units::StepsPerSec;

        let mut config = MachineConfig::default();
        config.max_step_frequency = StepsPerSec(10_000);
        config.double_step_frequency = StepsPerSec(10_000);

        let result = validate_config(&config);
        assert!(matches!(
            result,
            Err(Error::Config(ConfigError::InvalidDoubleStepFrequency { .. }))
        ));
    }

    #[test]
    fn test_dual_z_requires_z_endstop() {
        let mut config = MachineConfig::default();
        config.z_dual_endstops = true;
        config.z.min_endstop = None;
        config.z.max_endstop = None;

        let result = validate_config(&config);
        assert!(matches!(
            result,
            Err(Error::Config(ConfigError::DualZWithoutZEndstop))
        ));
    }
}
