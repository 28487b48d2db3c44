use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use dometraj::{
    events::{Component, ComponentState, SummaryState, TelescopeTarget},
    Config, ControllerEvent, MockDome, OutboundEvent, TrajectoryController, VignettingMonitor,
    VignettingModel,
};
use tokio::sync::{broadcast, mpsc, watch};

/// Command line arguments for the dome trajectory demo
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Dome trajectory following demo against a simulated dome"
)]
struct Args {
    /// Path to a JSON configuration file (defaults built in if omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Simulation duration in seconds
    #[arg(short = 't', long, default_value_t = 30.0)]
    duration: f64,

    /// Initial dome azimuth in degrees
    #[arg(long, default_value_t = 0.0)]
    dome_azimuth: f64,

    /// Initial telescope target azimuth in degrees
    #[arg(long, default_value_t = 20.0)]
    telescope_azimuth: f64,

    /// Telescope target elevation in degrees
    #[arg(long, default_value_t = 40.0)]
    telescope_elevation: f64,

    /// Telescope azimuth drift rate in degrees per second
    #[arg(long, default_value_t = 1.0)]
    drift_rate: f64,

    /// Start with dome following disabled
    #[arg(long)]
    no_follow: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::load_from_file(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => Config::default(),
    };
    let model = VignettingModel::new(&config)?;

    let (events_tx, events_rx) = mpsc::channel(64);
    let (commands_tx, commands_rx) = mpsc::channel(8);
    let (outbound_tx, outbound_rx) = broadcast::channel(256);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let controller = TrajectoryController::new(config, commands_tx, outbound_tx.clone())?;
    let snapshot = controller.snapshot();

    let controller_task = tokio::spawn(controller.run(events_rx));
    let dome_task = tokio::spawn(MockDome::new(args.dome_azimuth, events_tx.clone()).run(commands_rx));
    let monitor_task =
        tokio::spawn(VignettingMonitor::new(model, snapshot, outbound_tx).run(shutdown_rx));
    let printer_task = tokio::spawn(print_outbound(outbound_rx));

    events_tx
        .send(ControllerEvent::ComponentState(ComponentState {
            component: Component::Telescope,
            state: SummaryState::Enabled,
        }))
        .await?;
    events_tx
        .send(ControllerEvent::SetFollowingMode(!args.no_follow))
        .await?;

    println!("Dome Trajectory Demo");
    println!("====================");

    // Drive a slowly drifting telescope target, one update per second.
    let mut azimuth = args.telescope_azimuth;
    let start = std::time::Instant::now();
    let mut ticker = tokio::time::interval(Duration::from_secs(1));
    while start.elapsed().as_secs_f64() < args.duration {
        ticker.tick().await;
        let tai = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)?
            .as_secs_f64();
        events_tx
            .send(ControllerEvent::TelescopeTarget(TelescopeTarget::stationary(
                azimuth.rem_euclid(360.0),
                args.telescope_elevation,
                tai,
            )))
            .await?;
        azimuth += args.drift_rate;
    }

    shutdown_tx.send(true)?;
    events_tx.send(ControllerEvent::Shutdown).await?;
    drop(events_tx);

    controller_task.await?;
    monitor_task.await?;
    dome_task.await?;
    printer_task.await?;
    Ok(())
}

/// Print algorithm and following events, and vignetting status transitions.
async fn print_outbound(mut outbound: broadcast::Receiver<OutboundEvent>) {
    let mut last_status = None;
    loop {
        match outbound.recv().await {
            Ok(OutboundEvent::AlgorithmApplied { name, config }) => {
                println!("algorithm: {name} {config}");
            }
            Ok(OutboundEvent::FollowingMode { enabled }) => {
                println!("following mode: {enabled}");
            }
            Ok(OutboundEvent::TelescopeVignetted(status)) => {
                if last_status != Some(status) {
                    println!(
                        "vignetted: {:?} (azimuth {:?}, shutter {:?})",
                        status.vignetted, status.azimuth, status.shutter
                    );
                    last_status = Some(status);
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                log::warn!("printer lagged, skipped {skipped} events");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
