//! Bounded waits.
//!
//! Every phase that waits on an external system races the operation against
//! an [`Environment`] delay. Three shapes cover every phase:
//!
//! - [`bounded`]: the operation is dropped when the timer wins.
//! - [`detached`]: the operation keeps running on the runtime; a late result
//!   is handed to a cleanup hook instead of being returned.
//! - [`poll`]: a synchronous probe is re-checked at a fixed interval until it
//!   yields a value or the budget runs out.

use std::{future::Future, time::Duration};

use thiserror::Error;
use tokio::sync::oneshot;
use tracing::debug;

use crate::env::Environment;

/// Why a bounded wait ended without a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum WaitError {
    /// Timer fired first.
    #[error("{operation} timed out after {}ms", .after.as_millis())]
    TimedOut {
        /// Operation name.
        operation: &'static str,
        /// Configured bound.
        after: Duration,
    },

    /// Operation task ended without producing a value.
    #[error("{operation} ended without a result")]
    Abandoned {
        /// Operation name.
        operation: &'static str,
    },
}

impl WaitError {
    /// Whether the timer won the race.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::TimedOut { .. })
    }
}

/// Await `future` for at most `timeout`.
///
/// The future is dropped if the timer fires first.
pub async fn bounded<E, F, T>(
    env: &E,
    operation: &'static str,
    timeout: Duration,
    future: F,
) -> Result<T, WaitError>
where
    E: Environment,
    F: Future<Output = T>,
{
    tokio::select! {
        biased;
        value = future => Ok(value),
        () = env.sleep(timeout) => {
            debug!(operation, timeout_ms = timeout.as_millis() as u64, "operation timed out");
            Err(WaitError::TimedOut { operation, after: timeout })
        },
    }
}

/// Await `future` for at most `timeout` without cancelling it.
///
/// The future runs on its own task. If it completes after the waiter gave
/// up, its value goes to `on_late`, which must release whatever the value
/// owns. A value that lands in the same instant the timer fires is still
/// returned to the waiter, so exactly one of the two sides ever sees it.
pub async fn detached<E, F, T, L, LF>(
    env: &E,
    operation: &'static str,
    timeout: Duration,
    future: F,
    on_late: L,
) -> Result<T, WaitError>
where
    E: Environment,
    F: Future<Output = T> + Send + 'static,
    T: Send + 'static,
    L: FnOnce(T) -> LF + Send + 'static,
    LF: Future<Output = ()> + Send,
{
    let (tx, mut rx) = oneshot::channel();

    tokio::spawn(async move {
        let value = future.await;
        if let Err(value) = tx.send(value) {
            debug!(operation, "late result handed to cleanup");
            on_late(value).await;
        }
    });

    tokio::select! {
        biased;
        result = &mut rx => result.map_err(|_| WaitError::Abandoned { operation }),
        () = env.sleep(timeout) => {
            rx.close();
            match rx.try_recv() {
                Ok(value) => Ok(value),
                Err(_) => {
                    debug!(operation, timeout_ms = timeout.as_millis() as u64, "operation timed out, left running");
                    Err(WaitError::TimedOut { operation, after: timeout })
                },
            }
        },
    }
}

/// Re-check `probe` every `interval` until it yields a value.
///
/// The probe runs once immediately. The last check happens at the deadline,
/// so a value that appears just before it is not missed.
pub async fn poll<E, T, P>(
    env: &E,
    operation: &'static str,
    interval: Duration,
    timeout: Duration,
    mut probe: P,
) -> Result<T, WaitError>
where
    E: Environment,
    P: FnMut() -> Option<T>,
{
    let deadline = env.now() + timeout;

    loop {
        if let Some(value) = probe() {
            return Ok(value);
        }

        let now = env.now();
        if now >= deadline {
            debug!(operation, timeout_ms = timeout.as_millis() as u64, "poll timed out");
            return Err(WaitError::TimedOut { operation, after: timeout });
        }

        env.sleep(interval.min(deadline - now)).await;
    }
}
