//! Post-ready calibration.
//!
//! [`CalibrationMonitor`] aligns the camera rig to an anchor and measures how
//! far the rig has drifted from it since. [`CameraAlignment`] reapplies the
//! last alignment whenever tracking is reset.

use std::{
    fmt,
    sync::{Arc, Mutex, PoisonError},
};

use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::{
    config::CalibrationConfig,
    env::Environment,
    pose::{Pose, Vec3},
};

/// Camera rig placement produced by an alignment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RigAlignment {
    /// Rig position in metres.
    pub position: Vec3,
    /// Rig heading in radians.
    pub yaw: f32,
}

impl RigAlignment {
    /// Placement that puts `anchor` at the rig's origin.
    pub fn to_anchor(anchor: &Pose) -> Self {
        Self { position: anchor.inverse_transform_point(Vec3::ZERO), yaw: -anchor.yaw() }
    }
}

/// Calibration health.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CalibrationStatus {
    /// No alignment yet.
    NotCalibrated,
    /// Error below the pass threshold.
    Pass {
        /// Calibration error in millimetres.
        error_mm: f32,
    },
    /// Error at or above the pass threshold.
    Warning {
        /// Calibration error in millimetres.
        error_mm: f32,
    },
}

impl fmt::Display for CalibrationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotCalibrated => f.write_str("No alignment performed yet."),
            Self::Pass { error_mm } => write!(f, "Calibration Error: {error_mm:.2}mm, Status: PASS"),
            Self::Warning { error_mm } => write!(f, "Calibration Error: {error_mm:.2}mm, Status: WARNING"),
        }
    }
}

/// Rig alignment and drift measurement.
#[derive(Debug, Clone)]
pub struct CalibrationMonitor {
    config: CalibrationConfig,
    anchor: Option<Pose>,
    error_mm: f32,
}

impl CalibrationMonitor {
    /// Monitor with no alignment.
    pub fn new(config: CalibrationConfig) -> Self {
        Self { config, anchor: None, error_mm: 0.0 }
    }

    /// Align the rig to `anchor` and record the resulting error.
    pub fn align_to_anchor(&mut self, anchor: Pose) -> RigAlignment {
        let rig = RigAlignment::to_anchor(&anchor);
        self.error_mm = millimetres(rig.position, anchor.position);
        self.anchor = Some(anchor);
        info!(error_mm = self.error_mm, "rig aligned to anchor");
        rig
    }

    /// Reapply the last alignment. `None` before the first one.
    pub fn realign(&mut self) -> Option<RigAlignment> {
        let anchor = self.anchor?;
        Some(self.align_to_anchor(anchor))
    }

    /// Whether an alignment has been performed since the last reset.
    pub fn is_calibrated(&self) -> bool {
        self.anchor.is_some()
    }

    /// Last measured error in millimetres.
    pub fn error_mm(&self) -> f32 {
        self.error_mm
    }

    /// Re-measure drift of `rig_position` from the anchor.
    pub fn validate(&mut self, rig_position: Vec3) -> Option<f32> {
        let Some(anchor) = self.anchor else {
            warn!("cannot validate calibration before alignment");
            return None;
        };
        self.error_mm = millimetres(rig_position, anchor.position);
        debug!(error_mm = self.error_mm, "calibration validated");
        Some(self.error_mm)
    }

    /// Current status against the pass threshold.
    pub fn status(&self) -> CalibrationStatus {
        match self.anchor {
            None => CalibrationStatus::NotCalibrated,
            Some(_) if self.error_mm < self.config.pass_threshold_mm => {
                CalibrationStatus::Pass { error_mm: self.error_mm }
            },
            Some(_) => CalibrationStatus::Warning { error_mm: self.error_mm },
        }
    }

    /// Forget the alignment.
    pub fn reset(&mut self) {
        self.anchor = None;
        self.error_mm = 0.0;
        info!("calibration reset");
    }
}

fn millimetres(a: Vec3, b: Vec3) -> f32 {
    (a - b).length() * 1000.0
}

/// Tracking reset notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackingEvent {
    /// User recentred the view.
    Recentered,
    /// Headset was put on.
    HeadsetMounted,
}

/// Reapplies the rig alignment after tracking resets.
pub struct CameraAlignment<E> {
    monitor: Arc<Mutex<CalibrationMonitor>>,
    rig: watch::Sender<Option<RigAlignment>>,
    env: E,
    config: CalibrationConfig,
}

impl<E: Environment> CameraAlignment<E> {
    /// Alignment task over a shared monitor.
    pub fn new(monitor: Arc<Mutex<CalibrationMonitor>>, config: CalibrationConfig, env: E) -> Self {
        let (rig, _) = watch::channel(None);
        Self { monitor, rig, env, config }
    }

    /// Latest rig placement this task applied.
    pub fn rig(&self) -> watch::Receiver<Option<RigAlignment>> {
        self.rig.subscribe()
    }

    /// Handle one tracking event.
    ///
    /// Skipped before the first calibration. Otherwise waits the settle delay
    /// and realigns, provided calibration was not reset meanwhile.
    pub async fn handle(&self, event: TrackingEvent) -> Option<RigAlignment> {
        if !self.lock().is_calibrated() {
            debug!(?event, "not yet calibrated, skipping realignment");
            return None;
        }

        self.env.sleep(self.config.settle_delay).await;

        let rig = self.lock().realign()?;
        info!(?event, x = rig.position.x, z = rig.position.z, yaw = rig.yaw, "realigned after tracking reset");
        self.rig.send_replace(Some(rig));
        Some(rig)
    }

    /// Consume tracking events until every sender is dropped.
    pub async fn run(self, mut events: mpsc::Receiver<TrackingEvent>) {
        while let Some(event) = events.recv().await {
            self.handle(event).await;
        }
        debug!("tracking events closed, camera alignment stopped");
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CalibrationMonitor> {
        self.monitor.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
