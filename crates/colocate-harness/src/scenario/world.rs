//! World state after a scenario run.
//!
//! Holds a report per device and the shared simulated collaborators, and
//! provides the checks oracles are built from.

use std::{collections::BTreeMap, time::Duration};

use colocate_core::{
    error::ColocationError,
    event::ColocationEvent,
    group::{GroupId, Role},
    orchestrator::ColocationOutcome,
    state::ColocationState,
};

use crate::testbed::Testbed;

/// How one device's run ended.
#[derive(Debug, Clone)]
pub struct DeviceReport {
    /// Final state.
    pub state: ColocationState,
    /// Negotiated role, if any.
    pub role: Option<Role>,
    /// Determined group, if any.
    pub group_id: Option<GroupId>,
    /// Outcome on Ready.
    pub outcome: Option<ColocationOutcome>,
    /// Error on failure.
    pub error: Option<ColocationError>,
    /// Every event the orchestrator emitted, in order.
    pub events: Vec<ColocationEvent>,
    /// Time from the device's start to the end of its run.
    pub elapsed: Duration,
}

impl DeviceReport {
    /// States entered, in order.
    pub fn states(&self) -> Vec<ColocationState> {
        self.events
            .iter()
            .filter_map(|event| match event {
                ColocationEvent::StatusChanged { state, .. } => Some(*state),
                _ => None,
            })
            .collect()
    }

    /// Number of terminal events emitted.
    pub fn terminal_events(&self) -> usize {
        self.events.iter().filter(|event| event.is_terminal()).count()
    }
}

/// Devices and shared collaborators after a run.
pub struct World {
    devices: BTreeMap<String, DeviceReport>,
    testbed: Testbed,
}

impl World {
    /// World from finished device reports.
    pub fn new(devices: BTreeMap<String, DeviceReport>, testbed: Testbed) -> Self {
        Self { devices, testbed }
    }

    /// Report for device `name`.
    pub fn device(&self, name: &str) -> Option<&DeviceReport> {
        self.devices.get(name)
    }

    /// Every device report, by name.
    pub fn devices(&self) -> impl Iterator<Item = (&str, &DeviceReport)> {
        self.devices.iter().map(|(name, report)| (name.as_str(), report))
    }

    /// Shared collaborators.
    pub fn testbed(&self) -> &Testbed {
        &self.testbed
    }

    /// Whether every device reached Ready.
    pub fn all_ready(&self) -> bool {
        self.devices.values().all(|d| d.state == ColocationState::Ready)
    }

    /// Whether every device determined the same group.
    pub fn group_ids_match(&self) -> bool {
        let mut groups = self.devices.values().map(|d| d.group_id);
        match groups.next() {
            Some(Some(first)) => groups.all(|g| g == Some(first)),
            _ => false,
        }
    }

    /// Number of devices that ended as HOST.
    pub fn host_count(&self) -> usize {
        self.devices.values().filter(|d| d.role == Some(Role::Host)).count()
    }
}
