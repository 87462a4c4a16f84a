//! Configuration loading from files (std only).

use std::fs;
use std::path::Path;

use crate::error::{ConfigError, Error, Result};

use super::machine::MachineConfig;

/// Load a machine configuration from a TOML file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
///
/// # Example
///
/// ```rust,ignore
/// use stepper_executor::load_config;
///
/// let config = load_config("machine.toml")?;
/// ```
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<MachineConfig> {
    let content = fs::read_to_string(path.as_ref()).map_err(|e| {
        let msg = heapless::String::try_from(e.to_string().as_str()).unwrap_or_default();
        Error::Config(ConfigError::IoError(msg))
    })?;

    parse_config(&content)
}

/// Parse a machine configuration from a TOML string.
///
/// # Errors
///
/// Returns an error if the TOML is invalid or fails validation.
pub fn parse_config(content: &str) -> Result<MachineConfig> {
    let config: MachineConfig = toml::from_str(content).map_err(|e| {
        let msg = heapless::String::try_from(e.message()).unwrap_or_default();
        Error::Config(ConfigError::ParseError(msg))
    })?;

    // Validate the configuration
    super::validation::validate_config(&config)?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Kinematics;

    #[test]
    fn test_parse_minimal_config() {
        let toml = r#"
[x]
steps_per_mm = 80.0
[y]
steps_per_mm = 80.0
[z]
steps_per_mm = 400.0
[e]
steps_per_mm = 95.0
"#;

        let config = parse_config(toml).unwrap();
        assert!((config.z.steps_per_mm - 400.0).abs() < 1e-6);
        assert_eq!(config.kinematics, Kinematics::Cartesian);
        assert_eq!(config.extruders, 1);
    }

    #[test]
    fn test_parse_corexy_with_endstops() {
        let toml = r#"
extruders = 2
max_step_frequency = 40000
double_step_frequency = 10000

[kinematics]
mode = "core_xy"

[x]
steps_per_mm = 80.0
invert_dir = true
min_endstop = { inverting = false }

[y]
steps_per_mm = 80.0
min_endstop = { inverting = true }

[z]
steps_per_mm = 400.0
min_endstop = { inverting = false }

[e]
steps_per_mm = 95.0
"#;

        let config = parse_config(toml).unwrap();
        assert_eq!(config.kinematics, Kinematics::CoreXy);
        assert_eq!(config.extruders, 2);
        assert!(config.x.invert_dir);
        assert!(config.y.min_endstop.unwrap().inverting);
    }

    #[test]
    fn test_parse_rejects_bad_steps_per_mm() {
        let toml = r#"
[x]
steps_per_mm = 0.0
[y]
steps_per_mm = 80.0
[z]
steps_per_mm = 400.0
[e]
steps_per_mm = 95.0
"#;

        assert!(parse_config(toml).is_err());
    }
}
