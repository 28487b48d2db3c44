//! DOMETRAJ - Dome Trajectory Following Service
//!
//! Keeps a dome slit aligned with a telescope's pointing target and reports
//! how badly the view is vignetted. Telescope targets and dome telemetry
//! come in as events, a pluggable algorithm decides when the dome should
//! move, and a 10 Hz monitor publishes vignetting verdicts.

pub mod algorithm;
pub mod config;
pub mod controller;
pub mod error;
pub mod events;
pub mod geometry;
pub mod mock_dome;
pub mod monitor;
pub mod vignetting;

// Re-export commonly used types for external use
pub use crate::algorithm::{algorithm_names, make_algorithm, FollowingAlgorithm, SimpleAlgorithm};
pub use crate::config::Config;
pub use crate::controller::{TelemetrySnapshot, TrajectoryController, STD_TIMEOUT};
pub use crate::error::{ConfigError, DispatchError};
pub use crate::events::{ControllerEvent, MoveAzimuth, OutboundEvent, VignettingStatus};
pub use crate::mock_dome::MockDome;
pub use crate::monitor::{VignettingMonitor, VIGNETTING_MONITOR_INTERVAL};
pub use crate::vignetting::{Vignetted, VignettingModel};
