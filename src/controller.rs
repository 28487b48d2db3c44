//! Trajectory controller: reacts to telescope and dome events and issues
//! dome move commands.
//!
//! The controller is a single-consumer event loop. Handlers run to
//! completion in arrival order, so the cached telescope target, the cached
//! dome command and the "move in flight" check never race each other. The
//! one concurrent reader is the vignetting monitor, which samples the
//! telemetry snapshot through a lock with copy-on-read semantics.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use log::{info, warn};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::algorithm::{make_algorithm, FollowingAlgorithm};
use crate::config::Config;
use crate::error::{ConfigError, DispatchError};
use crate::events::{
    AzimuthCommandedState, Component, ComponentState, ControllerEvent, Door, DoorState,
    DomeCommandedAzimuth, DomePosition, MoveAzimuth, OutboundEvent, ShutterDoorState,
    SummaryState, TelescopeTarget,
};

/// Timeout for commands that should be executed quickly.
pub const STD_TIMEOUT: Duration = Duration::from_secs(5);

/// Last-observed telemetry, written only by the controller's event loop and
/// read by the vignetting monitor.
///
/// Every field is optional: `None` means the corresponding source has not
/// reported yet (or has become stale by going non-operational), and maps to
/// an Unknown verdict downstream.
#[derive(Debug, Clone, Copy, Default)]
pub struct TelemetrySnapshot {
    pub dome_azimuth: Option<f64>,
    pub dropout_door_state: Option<ShutterDoorState>,
    pub main_door_state: Option<ShutterDoorState>,
    pub dome_summary_state: Option<SummaryState>,
    pub telescope_azimuth: Option<f64>,
    pub telescope_elevation: Option<f64>,
    pub telescope_summary_state: Option<SummaryState>,
}

impl TelemetrySnapshot {
    /// True when both remote components are in a state whose telemetry can
    /// be trusted for vignetting computation.
    pub fn components_operational(&self) -> bool {
        matches!(self.dome_summary_state, Some(state) if state.is_operational())
            && matches!(self.telescope_summary_state, Some(state) if state.is_operational())
    }
}

/// Shared, lock-guarded snapshot handle.
pub type SharedSnapshot = Arc<RwLock<TelemetrySnapshot>>;

/// The dome-following controller.
///
/// Owns the last-known telescope target, the last-known dome commanded
/// azimuth, the active following algorithm and the single in-flight move
/// task. Consumes [`ControllerEvent`]s from one channel, sends
/// [`MoveAzimuth`] commands on another and publishes [`OutboundEvent`]s on
/// a broadcast channel.
pub struct TrajectoryController {
    config: Config,
    algorithm: Box<dyn FollowingAlgorithm>,
    telescope_target: Option<TelescopeTarget>,
    next_telescope_target: Option<TelescopeTarget>,
    dome_target_azimuth: Option<f64>,
    following_enabled: bool,
    /// In-flight move task; at most one is live at any time. The presence
    /// check and replacement both happen inside the event loop, which is
    /// what keeps check-then-set atomic. A multi-threaded port would need
    /// a mutex around this pair.
    move_task: Option<JoinHandle<()>>,
    snapshot: SharedSnapshot,
    dome_command_tx: mpsc::Sender<MoveAzimuth>,
    outbound_tx: broadcast::Sender<OutboundEvent>,
}

impl TrajectoryController {
    /// Create a controller from a validated configuration.
    ///
    /// Publishes the algorithm event; fails if the configuration names an
    /// unregistered algorithm or carries invalid parameters. Following
    /// starts disabled.
    pub fn new(
        config: Config,
        dome_command_tx: mpsc::Sender<MoveAzimuth>,
        outbound_tx: broadcast::Sender<OutboundEvent>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let algorithm = make_algorithm(&config.algorithm_name, &config)?;
        let controller = Self {
            config,
            algorithm,
            telescope_target: None,
            next_telescope_target: None,
            dome_target_azimuth: None,
            following_enabled: false,
            move_task: None,
            snapshot: Arc::new(RwLock::new(TelemetrySnapshot::default())),
            dome_command_tx,
            outbound_tx,
        };
        controller.publish_algorithm();
        Ok(controller)
    }

    /// Handle to the telemetry snapshot, for the vignetting monitor.
    pub fn snapshot(&self) -> SharedSnapshot {
        Arc::clone(&self.snapshot)
    }

    /// Consume events until `Shutdown` or until all senders are dropped.
    pub async fn run(mut self, mut events: mpsc::Receiver<ControllerEvent>) {
        info!("trajectory controller begins");
        while let Some(event) = events.recv().await {
            match event {
                ControllerEvent::TelescopeTarget(target) => self.on_telescope_target(target),
                ControllerEvent::DomeCommandedAzimuth(event) => {
                    self.on_dome_commanded_azimuth(event)
                }
                ControllerEvent::DomePosition(telemetry) => self.on_dome_position(telemetry),
                ControllerEvent::DoorState(event) => self.on_door_state(event),
                ControllerEvent::ComponentState(event) => self.on_component_state(event),
                ControllerEvent::SetFollowingMode(enabled) => self.set_following_mode(enabled),
                ControllerEvent::Reconfigure(config) => {
                    if let Err(error) = self.apply_config(*config) {
                        warn!("reconfiguration rejected: {error}");
                    }
                }
                ControllerEvent::Shutdown => break,
            }
        }
        self.cancel_move_task();
        info!("trajectory controller ends");
    }

    /// Replace the algorithm and configuration atomically.
    ///
    /// An in-flight move is left alone; the new algorithm applies from the
    /// next decision onward.
    pub fn apply_config(&mut self, config: Config) -> Result<(), ConfigError> {
        config.validate()?;
        self.algorithm = make_algorithm(&config.algorithm_name, &config)?;
        self.config = config;
        self.publish_algorithm();
        Ok(())
    }

    fn publish_algorithm(&self) {
        // Send failure just means nobody is subscribed yet.
        let _ = self.outbound_tx.send(OutboundEvent::AlgorithmApplied {
            name: self.algorithm.name().to_string(),
            config: self.algorithm.config_summary(),
        });
    }

    fn on_telescope_target(&mut self, target: TelescopeTarget) {
        self.telescope_target = Some(target);
        {
            let mut snapshot = self.snapshot.write().unwrap();
            snapshot.telescope_azimuth = Some(target.azimuth.position);
            snapshot.telescope_elevation = Some(target.elevation.position);
        }
        self.follow_target();
    }

    fn on_dome_commanded_azimuth(&mut self, event: DomeCommandedAzimuth) {
        if event.commanded_state == AzimuthCommandedState::GoToPosition {
            self.dome_target_azimuth = event.azimuth;
        } else {
            self.dome_target_azimuth = None;
        }
        match self.dome_target_azimuth {
            Some(azimuth) => info!("dome_target_azimuth={azimuth}"),
            None => info!("dome_target_azimuth=None"),
        }
        self.follow_target();
    }

    fn on_dome_position(&mut self, telemetry: DomePosition) {
        self.snapshot.write().unwrap().dome_azimuth = Some(telemetry.azimuth_position);
    }

    fn on_door_state(&mut self, event: DoorState) {
        let mut snapshot = self.snapshot.write().unwrap();
        match event.door {
            Door::Main => snapshot.main_door_state = Some(event.state),
            Door::Dropout => snapshot.dropout_door_state = Some(event.state),
        }
    }

    fn on_component_state(&mut self, event: ComponentState) {
        let mut snapshot = self.snapshot.write().unwrap();
        match event.component {
            Component::Dome => snapshot.dome_summary_state = Some(event.state),
            Component::Telescope => snapshot.telescope_summary_state = Some(event.state),
        }
    }

    fn set_following_mode(&mut self, enabled: bool) {
        self.following_enabled = enabled;
        let _ = self
            .outbound_tx
            .send(OutboundEvent::FollowingMode { enabled });
        if enabled {
            self.follow_target();
        } else {
            self.cancel_move_task();
        }
    }

    /// Command the dome to a new position, if appropriate.
    ///
    /// No effect unless following is enabled and a telescope target has
    /// been seen. While a move is in flight new target data is dropped,
    /// not queued: commanding the dome again before it has reported its
    /// new commanded state would cause spurious extra moves. A dropped
    /// update is recovered by the next event after the move completes.
    fn follow_target(&mut self) {
        if !self.following_enabled {
            return;
        }
        let Some(telescope_target) = self.telescope_target else {
            return;
        };
        if let Some(task) = &self.move_task {
            if !task.is_finished() {
                return;
            }
        }
        let desired_dome_azimuth = self.algorithm.desired_dome_azimuth(
            self.dome_target_azimuth,
            &telescope_target,
            self.next_telescope_target.as_ref(),
        );
        if let Some(azimuth) = desired_dome_azimuth {
            let command_tx = self.dome_command_tx.clone();
            self.move_task = Some(tokio::spawn(async move {
                if let Err(error) = dispatch_move(command_tx, azimuth).await {
                    warn!("moveAzimuth({azimuth:.3}) failed: {error}");
                }
            }));
        }
    }

    fn cancel_move_task(&mut self) {
        // Best effort: the actuator may still complete the physical motion.
        if let Some(task) = self.move_task.take() {
            task.abort();
        }
    }
}

/// Send one move command and await its acknowledgement.
async fn dispatch_move(
    command_tx: mpsc::Sender<MoveAzimuth>,
    azimuth: f64,
) -> Result<(), DispatchError> {
    let (ack_tx, ack_rx) = oneshot::channel();
    command_tx
        .send(MoveAzimuth {
            azimuth,
            ack: ack_tx,
        })
        .await
        .map_err(|_| DispatchError::ActuatorUnavailable)?;
    match tokio::time::timeout(STD_TIMEOUT, ack_rx).await {
        Err(_) => Err(DispatchError::AckTimeout(STD_TIMEOUT)),
        Ok(Err(_)) => Err(DispatchError::ActuatorUnavailable),
        Ok(Ok(result)) => result,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{DomeCommandedAzimuth, TelescopeTarget};
    use std::time::Duration;
    use tokio::sync::broadcast::error::TryRecvError;
    use tokio::time::timeout;

    const SHORT: Duration = Duration::from_millis(100);
    const LONG: Duration = Duration::from_secs(2);

    struct Fixture {
        events: mpsc::Sender<ControllerEvent>,
        commands: mpsc::Receiver<MoveAzimuth>,
        outbound: broadcast::Receiver<OutboundEvent>,
        controller_task: JoinHandle<()>,
    }

    fn spawn_controller() -> Fixture {
        let _ = env_logger::builder().is_test(true).try_init();
        let (command_tx, commands) = mpsc::channel(8);
        let (outbound_tx, outbound) = broadcast::channel(64);
        let controller =
            TrajectoryController::new(Config::default(), command_tx, outbound_tx).unwrap();
        let (events, event_rx) = mpsc::channel(64);
        let controller_task = tokio::spawn(controller.run(event_rx));
        Fixture {
            events,
            commands,
            outbound,
            controller_task,
        }
    }

    async fn send(fixture: &Fixture, event: ControllerEvent) {
        fixture.events.send(event).await.unwrap();
    }

    fn target(azimuth: f64, elevation: f64) -> ControllerEvent {
        ControllerEvent::TelescopeTarget(TelescopeTarget::stationary(azimuth, elevation, 0.0))
    }

    #[tokio::test]
    async fn test_no_commands_while_disabled() {
        let mut fixture = spawn_controller();
        send(&fixture, target(180.0, 40.0)).await;
        assert!(timeout(SHORT, fixture.commands.recv()).await.is_err());
    }

    #[tokio::test]
    async fn test_first_target_claims_telescope_azimuth() {
        let mut fixture = spawn_controller();
        send(&fixture, ControllerEvent::SetFollowingMode(true)).await;
        send(&fixture, target(180.0, 40.0)).await;
        let command = timeout(LONG, fixture.commands.recv()).await.unwrap().unwrap();
        assert_eq!(command.azimuth, 180.0);
        command.ack.send(Ok(())).unwrap();
    }

    #[tokio::test]
    async fn test_single_flight_drops_targets_mid_move() {
        let mut fixture = spawn_controller();
        send(&fixture, ControllerEvent::SetFollowingMode(true)).await;
        send(&fixture, target(100.0, 0.0)).await;

        // Hold the ack: the move stays in flight.
        let held = timeout(LONG, fixture.commands.recv()).await.unwrap().unwrap();
        assert_eq!(held.azimuth, 100.0);

        // Targets arriving mid-move are dropped, not queued.
        send(&fixture, target(120.0, 0.0)).await;
        send(&fixture, target(140.0, 0.0)).await;
        assert!(timeout(SHORT, fixture.commands.recv()).await.is_err());

        // Completing the move alone does not re-evaluate; the next event
        // after completion does.
        held.ack.send(Ok(())).unwrap();
        tokio::time::sleep(SHORT).await;
        assert!(fixture.commands.try_recv().is_err());

        send(&fixture, target(140.0, 0.0)).await;
        let command = timeout(LONG, fixture.commands.recv()).await.unwrap().unwrap();
        assert_eq!(command.azimuth, 140.0);
        command.ack.send(Ok(())).unwrap();
    }

    #[tokio::test]
    async fn test_small_delta_does_not_move_dome() {
        let mut fixture = spawn_controller();
        send(&fixture, ControllerEvent::SetFollowingMode(true)).await;
        // Establish the dome command baseline without a move of our own.
        send(
            &fixture,
            ControllerEvent::DomeCommandedAzimuth(DomeCommandedAzimuth::goto(10.0)),
        )
        .await;
        // Scaled delta = 2 * cos(60 deg) = 1 < 5: hold position.
        send(&fixture, target(12.0, 60.0)).await;
        assert!(timeout(SHORT, fixture.commands.recv()).await.is_err());
    }

    #[tokio::test]
    async fn test_lost_dome_command_state_resets_baseline() {
        let mut fixture = spawn_controller();
        send(&fixture, ControllerEvent::SetFollowingMode(true)).await;
        send(
            &fixture,
            ControllerEvent::DomeCommandedAzimuth(DomeCommandedAzimuth::goto(10.0)),
        )
        .await;
        send(&fixture, target(12.0, 60.0)).await;
        assert!(timeout(SHORT, fixture.commands.recv()).await.is_err());

        // The dome leaves go-to-position (e.g. homing): the cached command
        // clears and the next decision claims the telescope azimuth.
        send(
            &fixture,
            ControllerEvent::DomeCommandedAzimuth(DomeCommandedAzimuth::unknown()),
        )
        .await;
        let command = timeout(LONG, fixture.commands.recv()).await.unwrap().unwrap();
        assert_eq!(command.azimuth, 12.0);
        command.ack.send(Ok(())).unwrap();
    }

    #[tokio::test]
    async fn test_disable_cancels_move_and_suppresses_following() {
        let mut fixture = spawn_controller();
        send(&fixture, ControllerEvent::SetFollowingMode(true)).await;
        send(&fixture, target(100.0, 0.0)).await;
        let mut held = timeout(LONG, fixture.commands.recv()).await.unwrap().unwrap();

        send(&fixture, ControllerEvent::SetFollowingMode(false)).await;
        // The in-flight dispatch task is aborted; its ack channel closes.
        timeout(LONG, held.ack.closed()).await.unwrap();

        // Disabled: new targets are ignored.
        send(&fixture, target(200.0, 0.0)).await;
        assert!(timeout(SHORT, fixture.commands.recv()).await.is_err());

        // Re-enabling recomputes from the cached target.
        send(&fixture, ControllerEvent::SetFollowingMode(true)).await;
        let command = timeout(LONG, fixture.commands.recv()).await.unwrap().unwrap();
        assert_eq!(command.azimuth, 200.0);
        command.ack.send(Ok(())).unwrap();
    }

    #[tokio::test]
    async fn test_dispatch_failure_clears_in_flight_marker() {
        let mut fixture = spawn_controller();
        send(&fixture, ControllerEvent::SetFollowingMode(true)).await;
        send(&fixture, target(100.0, 0.0)).await;
        let command = timeout(LONG, fixture.commands.recv()).await.unwrap().unwrap();
        command
            .ack
            .send(Err(DispatchError::Rejected("not enabled".into())))
            .unwrap();

        // No automatic retry, but the next qualifying event re-triggers.
        tokio::time::sleep(SHORT).await;
        send(&fixture, target(150.0, 0.0)).await;
        let command = timeout(LONG, fixture.commands.recv()).await.unwrap().unwrap();
        assert_eq!(command.azimuth, 150.0);
        command.ack.send(Ok(())).unwrap();
    }

    #[tokio::test]
    async fn test_following_mode_events_published() {
        let mut fixture = spawn_controller();

        // The algorithm event was published at construction, before this
        // receiver subscribed or the loop started; drain anything pending.
        loop {
            match fixture.outbound.try_recv() {
                Ok(_) => continue,
                Err(TryRecvError::Empty) => break,
                Err(error) => panic!("unexpected broadcast state: {error:?}"),
            }
        }

        send(&fixture, ControllerEvent::SetFollowingMode(true)).await;
        send(&fixture, ControllerEvent::SetFollowingMode(false)).await;
        let first = timeout(LONG, fixture.outbound.recv()).await.unwrap().unwrap();
        let second = timeout(LONG, fixture.outbound.recv()).await.unwrap().unwrap();
        assert_eq!(first, OutboundEvent::FollowingMode { enabled: true });
        assert_eq!(second, OutboundEvent::FollowingMode { enabled: false });
    }

    #[tokio::test]
    async fn test_reconfigure_replaces_algorithm() {
        let mut fixture = spawn_controller();
        send(&fixture, ControllerEvent::SetFollowingMode(true)).await;
        send(
            &fixture,
            ControllerEvent::DomeCommandedAzimuth(DomeCommandedAzimuth::goto(10.0)),
        )
        .await;
        // Delta of 4 deg at the horizon: below the default threshold of 5.
        send(&fixture, target(14.0, 0.0)).await;
        assert!(timeout(SHORT, fixture.commands.recv()).await.is_err());

        // Tighten the dead band to 3 deg; the same target now moves.
        let mut config = Config::default();
        config.simple.max_delta_azimuth = 3.0;
        send(&fixture, ControllerEvent::Reconfigure(Box::new(config))).await;
        send(&fixture, target(14.0, 0.0)).await;
        let command = timeout(LONG, fixture.commands.recv()).await.unwrap().unwrap();
        assert_eq!(command.azimuth, 14.0);
        command.ack.send(Ok(())).unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_stops_loop() {
        let fixture = spawn_controller();
        send(&fixture, ControllerEvent::Shutdown).await;
        timeout(LONG, fixture.controller_task).await.unwrap().unwrap();
    }
}
