//! Service configuration.
//!
//! Loaded from a JSON file and validated before the service becomes
//! operational. Unknown fields are rejected so a typo in a threshold name
//! fails loudly instead of silently using a default.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::geometry::DomeGeometry;

fn default_max_delta_azimuth() -> f64 {
    5.0
}

/// Parameters of the "simple" following algorithm.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SimpleConfig {
    /// Maximum scaled azimuth difference (deg) tolerated before moving the
    /// dome. Set to the largest value that reliably avoids vignetting.
    #[serde(default = "default_max_delta_azimuth")]
    pub max_delta_azimuth: f64,
}

impl Default for SimpleConfig {
    fn default() -> Self {
        Self {
            max_delta_azimuth: default_max_delta_azimuth(),
        }
    }
}

/// Full service configuration: algorithm selection plus the vignetting
/// model parameters.
///
/// Lengths share one unit (millimeters in the shipped configuration);
/// only their ratio enters the computation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Name of the following algorithm; must be registered.
    pub algorithm_name: String,
    /// Configuration for the "simple" algorithm.
    pub simple: SimpleConfig,
    /// Scaled azimuth difference (deg) above which the view starts to be
    /// vignetted.
    pub azimuth_vignette_partial: f64,
    /// Scaled azimuth difference (deg) above which the view is fully
    /// vignetted.
    pub azimuth_vignette_full: f64,
    /// Telescope elevation (deg) below which a closed dropout door starts
    /// to vignette the view.
    pub dropout_door_vignette_partial: f64,
    /// Telescope elevation (deg) below which a closed dropout door fully
    /// vignettes the view.
    pub dropout_door_vignette_full: f64,
    /// Dome inner radius (same length unit as the height offset).
    pub dome_inner_radius: f64,
    /// Height of the telescope vertex above the dome center.
    pub telescope_height_offset: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            algorithm_name: "simple".to_string(),
            simple: SimpleConfig::default(),
            azimuth_vignette_partial: 2.0,
            azimuth_vignette_full: 7.0,
            dropout_door_vignette_partial: 25.0,
            dropout_door_vignette_full: 20.0,
            dome_inner_radius: 5000.0,
            telescope_height_offset: 1000.0,
        }
    }
}

impl Config {
    /// Load and validate a configuration from a JSON file.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate parameter ranges and cross-field consistency.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.simple.max_delta_azimuth < 0.0 {
            return Err(ConfigError::NegativeMaxDelta(self.simple.max_delta_azimuth));
        }
        if self.azimuth_vignette_partial < 0.0 || self.azimuth_vignette_full < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "azimuth vignette thresholds must not be negative: partial={}, full={}",
                self.azimuth_vignette_partial, self.azimuth_vignette_full
            )));
        }
        if self.azimuth_vignette_partial > self.azimuth_vignette_full {
            return Err(ConfigError::Invalid(format!(
                "azimuth_vignette_partial={} must not exceed azimuth_vignette_full={}",
                self.azimuth_vignette_partial, self.azimuth_vignette_full
            )));
        }
        if self.dropout_door_vignette_full > self.dropout_door_vignette_partial {
            // Elevation thresholds: the view clears as the telescope rises,
            // so the full threshold sits below the partial one.
            return Err(ConfigError::Invalid(format!(
                "dropout_door_vignette_full={} must not exceed dropout_door_vignette_partial={}",
                self.dropout_door_vignette_full, self.dropout_door_vignette_partial
            )));
        }
        // Geometry construction performs its own domain checks.
        DomeGeometry::new(self.dome_inner_radius, self.telescope_height_offset)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_default_is_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.algorithm_name, "simple");
        assert_relative_eq!(config.simple.max_delta_azimuth, 5.0);
    }

    #[test]
    fn test_parse_full_config() {
        let text = r#"{
            "algorithm_name": "simple",
            "simple": { "max_delta_azimuth": 3.5 },
            "azimuth_vignette_partial": 2.0,
            "azimuth_vignette_full": 7.0,
            "dropout_door_vignette_partial": 25.0,
            "dropout_door_vignette_full": 20.0,
            "dome_inner_radius": 5000.0,
            "telescope_height_offset": 1000.0
        }"#;
        let config: Config = serde_json::from_str(text).unwrap();
        config.validate().unwrap();
        assert_relative_eq!(config.simple.max_delta_azimuth, 3.5);
    }

    #[test]
    fn test_max_delta_azimuth_defaults_to_five() {
        let text = r#"{
            "algorithm_name": "simple",
            "simple": {},
            "azimuth_vignette_partial": 2.0,
            "azimuth_vignette_full": 7.0,
            "dropout_door_vignette_partial": 25.0,
            "dropout_door_vignette_full": 20.0,
            "dome_inner_radius": 5000.0,
            "telescope_height_offset": 1000.0
        }"#;
        let config: Config = serde_json::from_str(text).unwrap();
        assert_relative_eq!(config.simple.max_delta_azimuth, 5.0);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let text = r#"{
            "algorithm_name": "simple",
            "simple": { "max_delta_azimuth": 5.0 },
            "azimuth_vignette_partial": 2.0,
            "azimuth_vignette_full": 7.0,
            "dropout_door_vignette_partial": 25.0,
            "dropout_door_vignette_full": 20.0,
            "dome_inner_radius": 5000.0,
            "telescope_height_offset": 1000.0,
            "unexpected": 1
        }"#;
        assert!(serde_json::from_str::<Config>(text).is_err());

        let text = r#"{
            "algorithm_name": "simple",
            "simple": { "max_delta_azimuth": 5.0, "max_daz": 5.0 },
            "azimuth_vignette_partial": 2.0,
            "azimuth_vignette_full": 7.0,
            "dropout_door_vignette_partial": 25.0,
            "dropout_door_vignette_full": 20.0,
            "dome_inner_radius": 5000.0,
            "telescope_height_offset": 1000.0
        }"#;
        assert!(serde_json::from_str::<Config>(text).is_err());
    }

    #[test]
    fn test_missing_required_field_rejected() {
        let text = r#"{
            "algorithm_name": "simple",
            "simple": { "max_delta_azimuth": 5.0 }
        }"#;
        assert!(serde_json::from_str::<Config>(text).is_err());
    }

    #[test]
    fn test_negative_max_delta_rejected() {
        let config = Config {
            simple: SimpleConfig {
                max_delta_azimuth: -1.0,
            },
            ..Config::default()
        };
        assert!(matches!(
            config.validate(),
            Err(crate::error::ConfigError::NegativeMaxDelta(_))
        ));
    }

    #[test]
    fn test_inconsistent_thresholds_rejected() {
        let config = Config {
            azimuth_vignette_partial: 8.0,
            ..Config::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            dropout_door_vignette_full: 30.0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bad_geometry_rejected() {
        let config = Config {
            telescope_height_offset: 6000.0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file_roundtrip() {
        let dir = std::env::temp_dir().join(format!(
            "dometraj_config_test_{}",
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.json");

        let config = Config::default();
        std::fs::write(&path, serde_json::to_string_pretty(&config).unwrap()).unwrap();

        let loaded = Config::load_from_file(&path).unwrap();
        assert_eq!(loaded.algorithm_name, config.algorithm_name);
        assert_relative_eq!(loaded.dome_inner_radius, config.dome_inner_radius);

        std::fs::remove_dir_all(&dir).ok();
    }
}
