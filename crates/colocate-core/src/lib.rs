//! Colocation startup and room sharing.
//!
//! Decides whether a device is HOST or CLIENT, puts it in a relayed session
//! keyed by a discovered group identifier, and synchronizes a captured room
//! so every device shares one coordinate frame and one set of collision
//! surfaces.
//!
//! # Architecture
//!
//! The crate performs no device I/O. Discovery, the relayed session, the
//! anchor cloud and the room scanner are collaborator traits in
//! [`services`]; time and randomness come from an [`env::Environment`]. The
//! same orchestrator runs against platform services in production and
//! against the deterministic fakes in `colocate-harness` under test.
//!
//! Every wait on a collaborator is bounded by an environment timer through
//! [`wait`], and each phase has its own failure or fallback for the case
//! where the timer wins.
//!
//! # Components
//!
//! - [`orchestrator`]: top-level state machine and its events
//! - [`negotiate`]: HOST/CLIENT decision with the session probe
//! - [`room_share`]: host share and client load/align phases
//! - [`anchors`]: current room and anchor primitives
//! - [`discovery`]: timed discovery and the offline channel
//! - [`transport`]: bounded session start/join
//! - [`calibration`]: post-ready rig alignment and drift
//! - [`records`]: advisory room-record persistence
//! - [`state`]: state graph and orchestration context

pub mod anchors;
pub mod calibration;
pub mod config;
pub mod discovery;
pub mod env;
pub mod error;
pub mod event;
pub mod group;
pub mod negotiate;
pub mod orchestrator;
pub mod pose;
pub mod records;
pub mod room;
pub mod room_share;
pub mod services;
pub mod state;
pub mod transport;
pub mod wait;

pub use config::{CalibrationConfig, ColocationConfig};
pub use env::{Environment, SystemEnv};
pub use error::{ColocationError, FailureCause};
pub use event::ColocationEvent;
pub use group::{GroupId, GroupIdProvider, Role};
pub use orchestrator::{ColocationOrchestrator, ColocationOutcome, GroupIdWatch};
pub use services::Services;
pub use state::{ColocationState, OrchestrationContext};
