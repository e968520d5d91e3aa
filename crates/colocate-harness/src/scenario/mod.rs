//! Scenario testing with mandatory oracles.
//!
//! A scenario declares a set of devices and faults, runs every device's
//! orchestrator side by side on simulated time, and then hands the resulting
//! [`World`] to an oracle. A scenario cannot run without one.
//!
//! ```ignore
//! Scenario::new("host and client")
//!     .device("host", DeviceSpec::default())
//!     .device("client", DeviceSpec::default().start_after(Duration::from_secs(1)))
//!     .oracle(oracle::all_of(vec![oracle::all_ready(), oracle::group_ids_match()]))
//!     .run()
//!     .await?;
//! ```

mod builder;
pub mod oracle;
mod world;

pub use builder::{Faults, RunnableScenario, Scenario};
pub use world::{DeviceReport, World};

/// Verification run against the final world.
pub type OracleFn = Box<dyn Fn(&World) -> Result<(), String>>;
