//! Simulated dome actuator for tests and the demo binary.
//!
//! Accepts move commands, slews at a fixed rate along the shortest wrapped
//! path and reports position telemetry, commanded-state events, door states
//! and its summary state the way the real dome controller does. Fidelity is
//! limited to what the trajectory service observes: constant-rate motion,
//! no acceleration profile.

use std::time::Duration;

use log::{debug, info};
use tokio::sync::mpsc;

use crate::error::DispatchError;
use crate::events::{
    Component, ComponentState, ControllerEvent, Door, DoorState, DomeCommandedAzimuth,
    DomePosition, MoveAzimuth, ShutterDoorState, SummaryState,
};
use crate::geometry::angle_diff;

/// Azimuth slew rate of the simulated dome (deg/s).
pub const MOCK_AZIMUTH_RATE: f64 = 3.0;

/// Telemetry reporting interval of the simulated dome.
pub const MOCK_TELEMETRY_INTERVAL: Duration = Duration::from_millis(200);

/// A minimal dome simulator.
pub struct MockDome {
    azimuth: f64,
    target_azimuth: Option<f64>,
    azimuth_rate: f64,
    telemetry_interval: Duration,
    events_tx: mpsc::Sender<ControllerEvent>,
}

impl MockDome {
    /// Create a dome at the given azimuth (deg), reporting events into the
    /// controller's channel at the production rates.
    pub fn new(initial_azimuth: f64, events_tx: mpsc::Sender<ControllerEvent>) -> Self {
        Self {
            azimuth: initial_azimuth.rem_euclid(360.0),
            target_azimuth: None,
            azimuth_rate: MOCK_AZIMUTH_RATE,
            telemetry_interval: MOCK_TELEMETRY_INTERVAL,
            events_tx,
        }
    }

    /// Override slew rate (deg/s) and telemetry interval, for fast tests.
    pub fn with_rates(mut self, azimuth_rate: f64, telemetry_interval: Duration) -> Self {
        self.azimuth_rate = azimuth_rate;
        self.telemetry_interval = telemetry_interval;
        self
    }

    /// Serve move commands until the command channel closes.
    pub async fn run(mut self, mut commands: mpsc::Receiver<MoveAzimuth>) {
        info!("mock dome begins at azimuth {:.3}", self.azimuth);
        self.report_startup().await;
        let mut ticker = tokio::time::interval(self.telemetry_interval);
        loop {
            tokio::select! {
                command = commands.recv() => {
                    match command {
                        Some(command) => self.handle_move(command).await,
                        None => break,
                    }
                }
                _ = ticker.tick() => {
                    self.step(self.telemetry_interval.as_secs_f64());
                    self.report_position().await;
                }
            }
        }
        info!("mock dome ends");
    }

    /// Initial event burst: summary state, commanded state, door states and
    /// one position sample, matching what a freshly started dome reports.
    async fn report_startup(&self) {
        self.send(ControllerEvent::ComponentState(ComponentState {
            component: Component::Dome,
            state: SummaryState::Enabled,
        }))
        .await;
        self.send(ControllerEvent::DomeCommandedAzimuth(
            DomeCommandedAzimuth::unknown(),
        ))
        .await;
        for door in [Door::Main, Door::Dropout] {
            self.send(ControllerEvent::DoorState(DoorState {
                door,
                state: ShutterDoorState::Opened,
            }))
            .await;
        }
        self.report_position().await;
    }

    async fn handle_move(&mut self, command: MoveAzimuth) {
        if !command.azimuth.is_finite() {
            let _ = command.ack.send(Err(DispatchError::Rejected(format!(
                "azimuth {} is not finite",
                command.azimuth
            ))));
            return;
        }
        let azimuth = command.azimuth.rem_euclid(360.0);
        debug!("mock dome commanded to azimuth {azimuth:.3}");
        self.target_azimuth = Some(azimuth);
        self.send(ControllerEvent::DomeCommandedAzimuth(
            DomeCommandedAzimuth::goto(azimuth),
        ))
        .await;
        let _ = command.ack.send(Ok(()));
    }

    /// Advance the azimuth by `dt` seconds of slewing toward the target,
    /// along the shortest wrapped path.
    fn step(&mut self, dt: f64) {
        let Some(target) = self.target_azimuth else {
            return;
        };
        let remaining = angle_diff(target, self.azimuth);
        let max_step = self.azimuth_rate * dt;
        if remaining.abs() <= max_step {
            self.azimuth = target;
        } else {
            self.azimuth = (self.azimuth + max_step.copysign(remaining)).rem_euclid(360.0);
        }
    }

    async fn report_position(&self) {
        self.send(ControllerEvent::DomePosition(DomePosition {
            azimuth_position: self.azimuth,
        }))
        .await;
    }

    async fn send(&self, event: ControllerEvent) {
        // The consumer shutting down first is a normal exit path.
        let _ = self.events_tx.send(event).await;
    }
}
