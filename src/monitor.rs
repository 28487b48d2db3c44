//! Periodic vignetting monitor.
//!
//! Samples the telemetry snapshot on a fixed cadence, evaluates the
//! vignetting model and publishes the three verdicts on every tick. The
//! broadcast channel deduplicates nothing: downstream consumers that only
//! care about transitions filter for themselves.

use std::time::Duration;

use log::info;
use tokio::sync::{broadcast, watch};

use crate::controller::SharedSnapshot;
use crate::events::{OutboundEvent, VignettingStatus};
use crate::vignetting::{Vignetted, VignettingModel};

/// Cadence of the vignetting evaluation loop.
pub const VIGNETTING_MONITOR_INTERVAL: Duration = Duration::from_millis(100);

/// Evaluates vignetting on a timer until told to shut down.
pub struct VignettingMonitor {
    model: VignettingModel,
    snapshot: SharedSnapshot,
    outbound_tx: broadcast::Sender<OutboundEvent>,
    interval: Duration,
}

impl VignettingMonitor {
    pub fn new(
        model: VignettingModel,
        snapshot: SharedSnapshot,
        outbound_tx: broadcast::Sender<OutboundEvent>,
    ) -> Self {
        Self {
            model,
            snapshot,
            outbound_tx,
            interval: VIGNETTING_MONITOR_INTERVAL,
        }
    }

    /// Override the evaluation cadence. Tests use this to run faster than
    /// the production 10 Hz.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Run until `shutdown` flips to true (or its sender is dropped).
    ///
    /// On exit an all-unknown status is published so consumers never act on
    /// the last determinate verdict of a dead monitor.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!("vignetting monitor begins");
        let mut ticker = tokio::time::interval(self.interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.publish(self.evaluate());
                }
                changed = shutdown.changed() => {
                    match changed {
                        Ok(()) if !*shutdown.borrow_and_update() => continue,
                        _ => break,
                    }
                }
            }
        }
        self.publish(VignettingStatus::UNKNOWN);
        info!("vignetting monitor ends");
    }

    /// One evaluation over a copy of the current snapshot.
    fn evaluate(&self) -> VignettingStatus {
        let snapshot = *self.snapshot.read().unwrap();
        if !snapshot.components_operational() {
            return VignettingStatus::UNKNOWN;
        }
        let azimuth = self.model.vignetted_by_azimuth(
            snapshot.dome_azimuth,
            snapshot.telescope_azimuth,
            snapshot.telescope_elevation,
        );
        let shutter = self.model.vignetted_by_shutter(
            snapshot.dropout_door_state,
            snapshot.main_door_state,
            snapshot.telescope_elevation,
        );
        VignettingStatus {
            vignetted: Vignetted::combine(azimuth, shutter),
            azimuth,
            shutter,
        }
    }

    fn publish(&self, status: VignettingStatus) {
        let _ = self
            .outbound_tx
            .send(OutboundEvent::TelescopeVignetted(status));
    }
}
