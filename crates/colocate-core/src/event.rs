//! Notifications emitted by the orchestrator.

use crate::{error::FailureCause, orchestrator::ColocationOutcome, state::ColocationState};

/// Orchestrator notification.
///
/// `StatusChanged` fires on every transition. `Ready` and `Failed` fire at
/// most once per run, after the matching status change.
#[derive(Debug, Clone)]
pub enum ColocationEvent {
    /// State changed.
    StatusChanged {
        /// New state.
        state: ColocationState,
        /// Human-readable status line.
        text: String,
    },

    /// Run reached Ready.
    Ready {
        /// What the run produced.
        outcome: ColocationOutcome,
    },

    /// Run reached Error.
    Failed {
        /// Failure tag.
        cause: FailureCause,
        /// Detail for a retry affordance.
        detail: String,
    },
}

impl ColocationEvent {
    /// Whether the event ends a run.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Ready { .. } | Self::Failed { .. })
    }
}
