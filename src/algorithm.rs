//! Following algorithms: decide when the dome should move.
//!
//! An algorithm turns "telescope target plus current dome command" into an
//! optional new dome azimuth. Algorithms are selected by name through an
//! immutable registry built at first use; adding a strategy means adding a
//! factory entry here, the controller never changes.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use serde_json::json;

use crate::config::Config;
use crate::error::ConfigError;
use crate::events::TelescopeTarget;
use crate::geometry::angle_diff;

/// A dome-following decision strategy.
pub trait FollowingAlgorithm: Send + Sync {
    /// Registry name of this algorithm.
    fn name(&self) -> &'static str;

    /// Serialized configuration, published with the algorithm event.
    fn config_summary(&self) -> String;

    /// Return a new dome target azimuth (deg) if the dome should move,
    /// else `None`.
    ///
    /// `dome_target_azimuth` is the azimuth the dome was last commanded to,
    /// or `None` if the dome has no active go-to-position command.
    /// `next_target`, when known, lets look-ahead strategies position the
    /// dome for the upcoming target; strategies may ignore it.
    fn desired_dome_azimuth(
        &self,
        dome_target_azimuth: Option<f64>,
        telescope_target: &TelescopeTarget,
        next_target: Option<&TelescopeTarget>,
    ) -> Option<f64>;
}

/// Follow the telescope target with a dead band.
///
/// Commands dome azimuth = telescope target azimuth whenever the wrapped
/// azimuth difference, scaled by cos(target elevation), reaches
/// `max_delta_azimuth`. Below that the dome stays put, which keeps small
/// pointing updates near the threshold from producing a stream of tiny,
/// oscillating dome moves.
#[derive(Debug, Clone, Copy)]
pub struct SimpleAlgorithm {
    max_delta_azimuth: f64,
}

impl SimpleAlgorithm {
    /// Create the algorithm; `max_delta_azimuth` (deg) must not be negative.
    pub fn new(max_delta_azimuth: f64) -> Result<Self, ConfigError> {
        if max_delta_azimuth < 0.0 {
            return Err(ConfigError::NegativeMaxDelta(max_delta_azimuth));
        }
        Ok(Self { max_delta_azimuth })
    }

    pub fn max_delta_azimuth(&self) -> f64 {
        self.max_delta_azimuth
    }
}

impl FollowingAlgorithm for SimpleAlgorithm {
    fn name(&self) -> &'static str {
        "simple"
    }

    fn config_summary(&self) -> String {
        json!({ "max_delta_azimuth": self.max_delta_azimuth }).to_string()
    }

    fn desired_dome_azimuth(
        &self,
        dome_target_azimuth: Option<f64>,
        telescope_target: &TelescopeTarget,
        _next_target: Option<&TelescopeTarget>,
    ) -> Option<f64> {
        let Some(dome_target_azimuth) = dome_target_azimuth else {
            // No active dome command: claim a target immediately so later
            // calls have a baseline to compare against.
            return Some(telescope_target.azimuth.position);
        };

        let scaled_delta_azimuth =
            angle_diff(telescope_target.azimuth.position, dome_target_azimuth)
                * telescope_target.elevation.position.to_radians().cos();
        if scaled_delta_azimuth.abs() < self.max_delta_azimuth {
            None
        } else {
            Some(telescope_target.azimuth.position)
        }
    }
}

impl std::fmt::Debug for dyn FollowingAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FollowingAlgorithm")
            .field("name", &self.name())
            .finish()
    }
}

type AlgorithmFactory = fn(&Config) -> Result<Box<dyn FollowingAlgorithm>, ConfigError>;

fn make_simple(config: &Config) -> Result<Box<dyn FollowingAlgorithm>, ConfigError> {
    Ok(Box::new(SimpleAlgorithm::new(
        config.simple.max_delta_azimuth,
    )?))
}

/// Name-to-factory table, built once and never mutated afterwards.
static ALGORITHM_REGISTRY: Lazy<HashMap<&'static str, AlgorithmFactory>> = Lazy::new(|| {
    let mut registry: HashMap<&'static str, AlgorithmFactory> = HashMap::new();
    registry.insert("simple", make_simple);
    registry
});

/// Instantiate the named algorithm from its configuration block.
pub fn make_algorithm(
    name: &str,
    config: &Config,
) -> Result<Box<dyn FollowingAlgorithm>, ConfigError> {
    let factory = ALGORITHM_REGISTRY
        .get(name)
        .ok_or_else(|| ConfigError::UnknownAlgorithm(name.to_string()))?;
    factory(config)
}

/// Names of all registered algorithms, sorted.
pub fn algorithm_names() -> Vec<&'static str> {
    let mut names: Vec<&'static str> = ALGORITHM_REGISTRY.keys().copied().collect();
    names.sort_unstable();
    names
}
