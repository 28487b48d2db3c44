use std::time::Duration;

use thiserror::Error;

/// Errors raised while validating or applying configuration.
///
/// Configuration errors are surfaced to the caller of `Config::load_from_file`
/// or `make_algorithm`; they are never silently defaulted.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The requested following algorithm is not in the registry.
    #[error("unknown algorithm {0:?}")]
    UnknownAlgorithm(String),

    /// `max_delta_azimuth` must not be negative.
    #[error("max_delta_azimuth={0} must not be negative")]
    NegativeMaxDelta(f64),

    /// Dome geometry parameters outside the valid triangle domain.
    #[error("invalid dome geometry: {0}")]
    InvalidGeometry(String),

    /// Any other invalid parameter combination.
    #[error("invalid configuration: {0}")]
    Invalid(String),

    /// The configuration file could not be read.
    #[error("failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration file could not be parsed.
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Errors raised while dispatching a dome move command.
///
/// Dispatch failures are logged and dropped; the next qualifying telescope
/// target event triggers a fresh decision. There is no automatic retry.
#[derive(Error, Debug)]
pub enum DispatchError {
    /// The command channel to the dome actuator is closed.
    #[error("dome actuator is unavailable")]
    ActuatorUnavailable,

    /// The actuator did not acknowledge the command in time.
    #[error("moveAzimuth not acknowledged within {0:?}")]
    AckTimeout(Duration),

    /// The actuator rejected the command.
    #[error("dome rejected moveAzimuth: {0}")]
    Rejected(String),
}
