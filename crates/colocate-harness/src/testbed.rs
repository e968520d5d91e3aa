//! Shared simulated world and per-device wiring.
//!
//! A [`Testbed`] owns the collaborators every device shares (radio medium,
//! relay, anchor cloud). [`DeviceSpec`] describes one device; the testbed
//! turns it into a ready-to-run orchestrator.

use std::{sync::Arc, time::Duration};

use colocate_core::{
    config::ColocationConfig,
    discovery::{OfflineChannel, RoleBias},
    orchestrator::ColocationOrchestrator,
    pose::Pose,
    records::MemoryRecordStore,
    room::RoomSnapshot,
    services::{DiscoveryChannel, RoomRecordStore, Services},
};

use crate::{
    SimEnv, fixtures,
    sim_air::{RadioFaults, SimAir},
    sim_anchors::SimAnchorCloud,
    sim_relay::SimRelay,
    sim_scanner::{Capture, SimRoomScanner},
};

/// How a device discovers its group.
#[derive(Debug, Clone)]
pub enum DiscoveryMode {
    /// Through the shared [`SimAir`].
    Air(RadioFaults),
    /// Radio-free, keyed by a session name.
    Offline {
        /// Session name the group is derived from.
        session: String,
        /// Role bias.
        bias: RoleBias,
    },
}

/// One simulated device.
#[derive(Debug, Clone)]
pub struct DeviceSpec {
    /// Room already on the device.
    pub room: Option<RoomSnapshot>,
    /// Capture flow behaviour when no room exists.
    pub capture: Capture,
    /// Device tracking frame in the world.
    pub frame: Pose,
    /// Discovery wiring.
    pub discovery: DiscoveryMode,
    /// Delay before the device starts its run.
    pub start_after: Duration,
    /// Per-device configuration override.
    pub config: Option<ColocationConfig>,
    /// Room-record store kept across runs. A fresh one per run when unset.
    pub records: Option<Arc<MemoryRecordStore>>,
}

impl Default for DeviceSpec {
    fn default() -> Self {
        Self {
            room: Some(fixtures::room(0x100, Pose::IDENTITY)),
            capture: Capture::Cancelled { after: Duration::ZERO },
            frame: Pose::IDENTITY,
            discovery: DiscoveryMode::Air(RadioFaults::default()),
            start_after: Duration::ZERO,
            config: None,
            records: None,
        }
    }
}

impl DeviceSpec {
    /// Device with no room whose capture flow behaves as `capture`.
    pub fn without_room(capture: Capture) -> Self {
        Self { room: None, capture, ..Self::default() }
    }

    /// Set the room already on the device.
    pub fn room(mut self, room: RoomSnapshot) -> Self {
        self.room = Some(room);
        self
    }

    /// Place the device's tracking frame at `frame`.
    pub fn frame(mut self, frame: Pose) -> Self {
        self.frame = frame;
        self
    }

    /// Start the run `delay` after the scenario begins.
    pub fn start_after(mut self, delay: Duration) -> Self {
        self.start_after = delay;
        self
    }

    /// Inject radio faults.
    pub fn radio(mut self, faults: RadioFaults) -> Self {
        self.discovery = DiscoveryMode::Air(faults);
        self
    }

    /// Use offline discovery for `session` with `bias`.
    pub fn offline(mut self, session: impl Into<String>, bias: RoleBias) -> Self {
        self.discovery = DiscoveryMode::Offline { session: session.into(), bias };
        self
    }

    /// Override the scenario configuration for this device.
    pub fn config(mut self, config: ColocationConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Persist room records in `store`.
    pub fn records(mut self, store: Arc<MemoryRecordStore>) -> Self {
        self.records = Some(store);
        self
    }
}

/// Collaborators shared by every device.
#[derive(Debug, Clone)]
pub struct Testbed {
    seed: u64,
    air: SimAir,
    relay: SimRelay,
    cloud: SimAnchorCloud,
}

impl Testbed {
    /// Empty world whose device RNGs derive from `seed`.
    pub fn new(seed: u64) -> Self {
        Self { seed, air: SimAir::new(), relay: SimRelay::new(), cloud: SimAnchorCloud::new() }
    }

    /// Radio medium.
    pub fn air(&self) -> &SimAir {
        &self.air
    }

    /// Session relay.
    pub fn relay(&self) -> &SimRelay {
        &self.relay
    }

    /// Anchor cloud.
    pub fn cloud(&self) -> &SimAnchorCloud {
        &self.cloud
    }

    /// Environment for the `index`th device.
    pub fn env(&self, index: u64) -> SimEnv {
        SimEnv::with_seed(self.seed.wrapping_mul(0x9e37_79b9_7f4a_7c15).wrapping_add(index))
    }

    /// Collaborators for device `name`.
    pub fn services(&self, name: &str, spec: &DeviceSpec, env: &SimEnv) -> Services {
        let scanner = match &spec.room {
            Some(room) => SimRoomScanner::with_room(room.clone(), env.clone()),
            None => SimRoomScanner::empty(spec.capture.clone(), env.clone()),
        };
        let discovery: Arc<dyn DiscoveryChannel> = match &spec.discovery {
            DiscoveryMode::Air(faults) => Arc::new(self.air.radio(name, env.clone(), *faults)),
            DiscoveryMode::Offline { session, bias } => {
                Arc::new(OfflineChannel::new(session, *bias, env.clone()))
            },
        };

        let records: Arc<dyn RoomRecordStore> = match &spec.records {
            Some(store) => store.clone(),
            None => Arc::new(MemoryRecordStore::new()),
        };

        Services {
            scanner: Arc::new(scanner),
            discovery,
            transport: Arc::new(self.relay.endpoint(env.clone())),
            anchors: Arc::new(self.cloud.device(spec.frame, env.clone())),
            records,
        }
    }

    /// Orchestrator for device `name`, in Init.
    pub fn orchestrator(
        &self,
        name: &str,
        index: u64,
        spec: &DeviceSpec,
        config: ColocationConfig,
    ) -> ColocationOrchestrator<SimEnv> {
        let env = self.env(index);
        let services = self.services(name, spec, &env);
        ColocationOrchestrator::new(services, spec.config.clone().unwrap_or(config), env)
    }
}
