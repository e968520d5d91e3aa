//! Scenario builder API.
//!
//! Provides a declarative API for constructing scenario tests that enforce
//! the oracle pattern.

use std::{collections::BTreeMap, time::Duration};

use colocate_core::config::ColocationConfig;
use futures::future::join_all;
use tokio::time::Instant;
use tracing::info;

use crate::{
    scenario::{DeviceReport, OracleFn, World},
    testbed::{DeviceSpec, Testbed},
};

/// Faults applied to the shared collaborators.
#[derive(Debug, Clone, Default)]
pub struct Faults {
    /// Delay on every session start-or-join.
    pub join_delay: Duration,
    /// Number of share calls the anchor cloud rejects.
    pub share_failures: usize,
    /// Delay on every shared-room load.
    pub load_delay: Duration,
    /// Error every shared-room load returns.
    pub load_error: Option<String>,
}

/// Scenario builder.
///
/// Add devices and faults, then call `.oracle()` to get a
/// [`RunnableScenario`].
pub struct Scenario {
    name: String,
    seed: u64,
    config: ColocationConfig,
    devices: Vec<(String, DeviceSpec)>,
    faults: Faults,
}

impl Scenario {
    /// Create a new scenario with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            seed: 0,
            config: ColocationConfig::default(),
            devices: Vec::new(),
            faults: Faults::default(),
        }
    }

    /// Seed for every device's RNG.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Configuration shared by devices without their own.
    pub fn config(mut self, config: ColocationConfig) -> Self {
        self.config = config;
        self
    }

    /// Add a device.
    pub fn device(mut self, name: impl Into<String>, spec: DeviceSpec) -> Self {
        self.devices.push((name.into(), spec));
        self
    }

    /// Inject faults into the shared collaborators.
    pub fn faults(mut self, faults: Faults) -> Self {
        self.faults = faults;
        self
    }

    /// Set the oracle function and return a runnable scenario.
    ///
    /// A scenario without an oracle cannot be run.
    pub fn oracle(self, oracle: OracleFn) -> RunnableScenario {
        RunnableScenario { scenario: self, oracle }
    }
}

/// A scenario with an oracle function that can be executed.
pub struct RunnableScenario {
    scenario: Scenario,
    oracle: OracleFn,
}

impl RunnableScenario {
    /// Execute the scenario.
    ///
    /// Runs every device's orchestrator concurrently, each starting after its
    /// own delay, then invokes the oracle on the resulting world. Must run on
    /// a paused tokio clock for timings to be exact.
    pub async fn run(self) -> Result<(), String> {
        let Self { scenario, oracle } = self;
        let world = Self::simulate(scenario.seed, &scenario.config, scenario.devices, &scenario.faults).await;
        oracle(&world).map_err(|e| format!("Scenario '{}': {e}", scenario.name))
    }

    async fn simulate(
        seed: u64,
        config: &ColocationConfig,
        devices: Vec<(String, DeviceSpec)>,
        faults: &Faults,
    ) -> World {
        let testbed = Testbed::new(seed);
        testbed.relay().set_join_delay(faults.join_delay);
        testbed.cloud().fail_shares(faults.share_failures);
        testbed.cloud().set_load_delay(faults.load_delay);
        if let Some(reason) = &faults.load_error {
            testbed.cloud().fail_loads(reason.clone());
        }

        let runs = devices.into_iter().enumerate().map(|(index, (name, spec))| {
            let mut orchestrator = testbed.orchestrator(&name, index as u64, &spec, config.clone());
            let mut events = orchestrator.subscribe();

            async move {
                tokio::time::sleep(spec.start_after).await;
                let started = Instant::now();
                let result = orchestrator.run().await;
                let elapsed = started.elapsed();

                let mut log = Vec::new();
                while let Ok(event) = events.try_recv() {
                    log.push(event);
                }

                info!(device = %name, state = %orchestrator.current_state(), elapsed_ms = elapsed.as_millis() as u64, "device finished");
                let report = DeviceReport {
                    state: orchestrator.current_state(),
                    role: orchestrator.role(),
                    group_id: orchestrator.group_id(),
                    outcome: result.as_ref().ok().cloned(),
                    error: result.err(),
                    events: log,
                    elapsed,
                };
                (name, report)
            }
        });

        let reports: BTreeMap<_, _> = join_all(runs).await.into_iter().collect();
        World::new(reports, testbed)
    }
}
