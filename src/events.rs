//! Event and command types exchanged with the telescope and dome.
//!
//! These are the transport-agnostic shapes of the inbound events the
//! controller consumes, the outbound move command, and the events the
//! service publishes. The pub/sub transport itself lives outside this crate;
//! tests and the demo binary drive these types over tokio channels.

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use crate::config::Config;
use crate::error::DispatchError;
use crate::vignetting::Vignetted;

/// One axis of a telescope path target: position (deg), velocity (deg/s)
/// and the TAI timestamp (unix seconds) the pair refers to.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PathTarget {
    pub position: f64,
    pub velocity: f64,
    pub tai: f64,
}

impl PathTarget {
    pub fn new(position: f64, velocity: f64, tai: f64) -> Self {
        Self {
            position,
            velocity,
            tai,
        }
    }
}

/// Telescope target from the pointing kernel: azimuth and elevation paths.
///
/// Replaced wholesale on every target event; the controller owns the cached
/// copy between updates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TelescopeTarget {
    pub azimuth: PathTarget,
    pub elevation: PathTarget,
}

impl TelescopeTarget {
    /// Convenience constructor for a stationary target at the given
    /// azimuth and elevation (deg).
    pub fn stationary(azimuth: f64, elevation: f64, tai: f64) -> Self {
        Self {
            azimuth: PathTarget::new(azimuth, 0.0, tai),
            elevation: PathTarget::new(elevation, 0.0, tai),
        }
    }
}

/// Commanded state reported by the dome azimuth axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AzimuthCommandedState {
    /// Not currently executing a go-to-position command (idle, homing, ...).
    Unknown,
    /// Moving to (or holding) a commanded azimuth.
    GoToPosition,
}

/// Dome azimuthCommandedState event.
///
/// `azimuth` is only meaningful when `commanded_state` is `GoToPosition`;
/// the unknown case is an explicit `None`, never a sentinel value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DomeCommandedAzimuth {
    pub commanded_state: AzimuthCommandedState,
    pub azimuth: Option<f64>,
}

impl DomeCommandedAzimuth {
    pub fn goto(azimuth: f64) -> Self {
        Self {
            commanded_state: AzimuthCommandedState::GoToPosition,
            azimuth: Some(azimuth),
        }
    }

    pub fn unknown() -> Self {
        Self {
            commanded_state: AzimuthCommandedState::Unknown,
            azimuth: None,
        }
    }
}

/// Dome position telemetry sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DomePosition {
    pub azimuth_position: f64,
}

/// Operational state of a dome shutter door.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShutterDoorState {
    Opened,
    Opening,
    Closed,
    Closing,
}

/// Which shutter door an event refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Door {
    Main,
    Dropout,
}

/// Door state event for one of the two shutter doors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoorState {
    pub door: Door,
    pub state: ShutterDoorState,
}

/// Summary state of a remote component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SummaryState {
    Offline,
    Standby,
    Disabled,
    Enabled,
    Fault,
}

impl SummaryState {
    /// States in which a component's telemetry is trusted for vignetting
    /// computation: fully initialized (Disabled) or commandable (Enabled).
    pub fn is_operational(self) -> bool {
        matches!(self, SummaryState::Disabled | SummaryState::Enabled)
    }
}

/// Which remote component a summary state event refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Component {
    Dome,
    Telescope,
}

/// Summary state event for a remote component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentState {
    pub component: Component,
    pub state: SummaryState,
}

/// Inbound events consumed by the controller's single-consumer loop.
///
/// Handlers run to completion in arrival order; no two handlers ever run
/// concurrently on the same controller, which is what makes the cached
/// state and the single-flight move check safe without locks.
#[derive(Debug)]
pub enum ControllerEvent {
    TelescopeTarget(TelescopeTarget),
    DomeCommandedAzimuth(DomeCommandedAzimuth),
    DomePosition(DomePosition),
    DoorState(DoorState),
    ComponentState(ComponentState),
    SetFollowingMode(bool),
    Reconfigure(Box<Config>),
    Shutdown,
}

/// Dome move command: fire and await acknowledgement.
///
/// The receiver acks with `Ok(())` once the command has been accepted, or
/// an error if it was rejected. Dropping the ack sender counts as a
/// dispatch failure.
#[derive(Debug)]
pub struct MoveAzimuth {
    pub azimuth: f64,
    pub ack: oneshot::Sender<Result<(), DispatchError>>,
}

/// The three vignetting verdicts published together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VignettingStatus {
    /// Combined verdict.
    pub vignetted: Vignetted,
    /// Verdict from dome/telescope azimuth mismatch alone.
    pub azimuth: Vignetted,
    /// Verdict from the shutter doors alone.
    pub shutter: Vignetted,
}

impl VignettingStatus {
    /// The all-unknown status published at startup and on shutdown.
    pub const UNKNOWN: VignettingStatus = VignettingStatus {
        vignetted: Vignetted::Unknown,
        azimuth: Vignetted::Unknown,
        shutter: Vignetted::Unknown,
    };
}

/// Events published by the service.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundEvent {
    /// The active algorithm and its serialized configuration.
    AlgorithmApplied { name: String, config: String },
    /// Whether dome following is enabled.
    FollowingMode { enabled: bool },
    /// Current vignetting verdicts; republished every monitor tick.
    TelescopeVignetted(VignettingStatus),
}
