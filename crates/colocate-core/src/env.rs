//! Environment abstraction for time and randomness.
//!
//! Every component that waits, timestamps or draws a fresh identifier does so
//! through an [`Environment`]. Production code uses [`SystemEnv`]; the
//! simulation harness supplies a seeded implementation so that two simulated
//! devices replay identically from the same seed.

use std::{future::Future, time::Duration};

use rand::RngCore;
use tokio::time::Instant;

/// Source of time, delays and randomness.
pub trait Environment: Clone + Send + Sync + 'static {
    /// Current instant.
    ///
    /// Implementations must agree with [`Environment::sleep`]: sleeping for
    /// `d` advances `now()` by at least `d`.
    fn now(&self) -> Instant;

    /// Suspend for `duration`.
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send;

    /// Fill `buffer` with random bytes.
    fn random_bytes(&self, buffer: &mut [u8]);
}

/// Environment backed by the tokio clock and the thread-local RNG.
///
/// Under a paused tokio clock (`start_paused = true`) this environment follows
/// virtual time, which keeps timing tests deterministic.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnv;

impl Environment for SystemEnv {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        rand::thread_rng().fill_bytes(buffer);
    }
}
