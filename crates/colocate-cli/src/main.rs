//! Colocation bench runner.
//!
//! Runs several simulated devices through colocation startup against shared
//! in-process collaborators, then aligns each Ready device's camera rig to
//! its room floor and logs the calibration result.

use std::{
    path::PathBuf,
    process::ExitCode,
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use clap::Parser;
use colocate_core::{
    CalibrationConfig, ColocationConfig, ColocationOutcome,
    calibration::{CalibrationMonitor, CameraAlignment, TrackingEvent},
    discovery::RoleBias,
    error::RecordError,
    orchestrator::ColocationOrchestrator,
    pose::{Pose, Vec3},
    records::DatabaseRecordStore,
    services::RoomRecordStore,
};
use colocate_harness::{DeviceSpec, SimEnv, Testbed, fixtures};
use futures::future::join_all;
use thiserror::Error;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "colocate-sim")]
#[command(about = "Run simulated devices through colocation startup", long_about = None)]
struct Args {
    /// Number of devices
    #[arg(short = 'n', long, default_value = "2")]
    devices: usize,

    /// Delay between consecutive device starts, in milliseconds
    #[arg(long, default_value = "1000")]
    stagger_ms: u64,

    /// Derive the group from this session name instead of the radio
    #[arg(long)]
    offline: Option<String>,

    /// Discovery window in milliseconds
    #[arg(long, default_value = "3000")]
    discovery_wait_ms: u64,

    /// How long a client waits for the host's room, in milliseconds
    #[arg(long, default_value = "30000")]
    shared_room_wait_ms: u64,

    /// Commit to host without probing the session first
    #[arg(long)]
    no_probe: bool,

    /// Delay on every relay start-or-join, in milliseconds
    #[arg(long, default_value = "0")]
    join_delay_ms: u64,

    /// Persist room records in this database
    #[arg(long)]
    record_db: Option<PathBuf>,

    /// Seed for device randomness
    #[arg(long, default_value = "0")]
    seed: u64,

    /// Run on the wall clock instead of virtual time
    #[arg(long)]
    real_time: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Error)]
enum BenchError {
    #[error("failed to build runtime: {0}")]
    Runtime(#[from] std::io::Error),

    #[error("failed to open room records: {0}")]
    Records(#[from] RecordError),
}

fn main() -> ExitCode {
    let args = Args::parse();

    let level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .init();

    match run(&args) {
        Ok(0) => ExitCode::SUCCESS,
        Ok(failed) => {
            warn!(failed, devices = args.devices, "not every device reached Ready");
            ExitCode::FAILURE
        },
        Err(e) => {
            error!(error = %e, "bench aborted");
            ExitCode::FAILURE
        },
    }
}

/// Returns the number of devices that failed.
fn run(args: &Args) -> Result<usize, BenchError> {
    let records: Option<Arc<dyn RoomRecordStore>> = match &args.record_db {
        Some(path) => Some(Arc::new(DatabaseRecordStore::open(path)?)),
        None => None,
    };

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .start_paused(!args.real_time)
        .build()?;

    Ok(runtime.block_on(bench(args, records)))
}

async fn bench(args: &Args, records: Option<Arc<dyn RoomRecordStore>>) -> usize {
    let config = ColocationConfig {
        discovery_wait: Duration::from_millis(args.discovery_wait_ms),
        shared_room_wait: Duration::from_millis(args.shared_room_wait_ms),
        session_probe: !args.no_probe,
        ..ColocationConfig::default()
    };
    info!(
        devices = args.devices,
        seed = args.seed,
        offline = args.offline.as_deref().unwrap_or("-"),
        budget_ms = config.phase_budget().as_millis() as u64,
        "starting bench"
    );

    let testbed = Testbed::new(args.seed);
    testbed.relay().set_join_delay(Duration::from_millis(args.join_delay_ms));

    let runs = (0..args.devices).map(|index| {
        let name = format!("device-{index}");
        let spec = device_spec(args, index);
        let env = testbed.env(index as u64);

        let mut services = testbed.services(&name, &spec, &env);
        if let Some(records) = &records {
            services.records = Arc::clone(records);
        }

        let orchestrator = ColocationOrchestrator::new(services, config.clone(), env.clone());
        run_device(name, spec.start_after, orchestrator, env)
    });

    let ready = join_all(runs).await;
    let failed = ready.iter().filter(|ok| !**ok).count();
    info!(live_sessions = ?testbed.relay().live_sessions(), failed, "bench finished");
    failed
}

fn device_spec(args: &Args, index: usize) -> DeviceSpec {
    let offset = index as f32;
    let mut spec = DeviceSpec::default()
        .room(fixtures::room(0x1000 + index as u128, Pose::from_yaw(Vec3::new(0.5 * offset, 0.0, 0.0), 0.0)))
        .frame(Pose::from_yaw(Vec3::new(offset, 0.0, -offset), 0.3 * offset))
        .start_after(Duration::from_millis(args.stagger_ms.saturating_mul(index as u64)));
    if let Some(session) = &args.offline {
        spec = spec.offline(session.clone(), RoleBias::Auto);
    }
    spec
}

async fn run_device(
    name: String,
    start_after: Duration,
    mut orchestrator: ColocationOrchestrator<SimEnv>,
    env: SimEnv,
) -> bool {
    tokio::time::sleep(start_after).await;

    let result = orchestrator.run().await;
    let session = orchestrator.session_descriptor().map(|descriptor| descriptor.name);

    match result {
        Ok(outcome) => {
            info!(
                device = %name,
                role = %outcome.role,
                session = session.as_deref().unwrap_or("-"),
                degraded = outcome.degraded,
                anchors = outcome.room.anchors.len(),
                "device ready"
            );
            calibrate(&name, &outcome, env).await;
            true
        },
        Err(e) => {
            error!(device = %name, cause = %e.cause(), error = %e, "device failed");
            false
        },
    }
}

async fn calibrate(name: &str, outcome: &ColocationOutcome, env: SimEnv) {
    let config = CalibrationConfig::default();
    let monitor = Arc::new(Mutex::new(CalibrationMonitor::new(config.clone())));
    let rig = monitor.lock().unwrap_or_else(PoisonError::into_inner).align_to_anchor(outcome.room.floor);

    // A recenter right after Ready must land the rig back where it was.
    let alignment = CameraAlignment::new(Arc::clone(&monitor), config, env);
    if alignment.handle(TrackingEvent::Recentered).await != Some(rig) {
        warn!(device = name, "realignment moved the rig");
    }

    let status = {
        let mut monitor = monitor.lock().unwrap_or_else(PoisonError::into_inner);
        monitor.validate(rig.position);
        monitor.status()
    };
    info!(device = name, %status, "calibration checked");
}

#[cfg(test)]
mod tests {
    use colocate_harness::DiscoveryMode;

    use super::*;

    #[test]
    fn stagger_scales_with_device_index() {
        let args = Args::parse_from(["colocate-sim", "--stagger-ms", "250"]);
        assert_eq!(device_spec(&args, 0).start_after, Duration::ZERO);
        assert_eq!(device_spec(&args, 3).start_after, Duration::from_millis(750));
    }

    #[test]
    fn huge_stagger_saturates() {
        let args = Args::parse_from(["colocate-sim", "--stagger-ms", "18446744073709551615"]);
        assert_eq!(device_spec(&args, 2).start_after, Duration::from_millis(u64::MAX));
    }

    #[test]
    fn offline_devices_share_the_session() {
        let args = Args::parse_from(["colocate-sim", "--offline", "lab"]);
        assert!(matches!(
            device_spec(&args, 1).discovery,
            DiscoveryMode::Offline { ref session, bias: RoleBias::Auto } if session == "lab"
        ));
    }
}
