//! Deterministic simulation harness for colocation testing.
//!
//! In-process implementations of every collaborator trait in
//! `colocate_core::services`, a seeded [`Environment`](colocate_core::env::Environment),
//! and a scenario framework that runs several devices side by side on
//! tokio's paused clock.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod scenario;
pub mod sim_air;
pub mod sim_anchors;
pub mod sim_env;
pub mod sim_relay;
pub mod sim_scanner;
pub mod testbed;

pub use sim_air::{RadioFaults, SimAir};
pub use sim_anchors::SimAnchorCloud;
pub use sim_env::SimEnv;
pub use sim_relay::SimRelay;
pub use sim_scanner::{Capture, SimRoomScanner};
pub use testbed::{DeviceSpec, DiscoveryMode, Testbed};
