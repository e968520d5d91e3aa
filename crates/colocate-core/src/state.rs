//! Colocation state graph and the orchestration context.
//!
//! ```text
//! Init ─> Discovering ─┬─(found)──────────────────────────> JoiningTransport ─> LoadingRoom ─┐
//!                      └─(none)─> Advertising ─┬─(probe: peers)─┘                             │
//!                                              └─> ScanningRoom ─> StartingTransport          │
//!                                                                   └─> SharingRoom ──────────┴─> Ready
//!
//! any non-terminal state ─> Error
//! ```
//!
//! Transitions only move forward along these edges. Ready and Error are
//! terminal; leaving them requires a restart, which builds a fresh context.

use std::{fmt, time::Duration};

use tokio::time::Instant;
use tracing::warn;

use crate::{
    error::ColocationError,
    group::{GroupId, Role},
};

/// Colocation state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColocationState {
    /// Nothing started yet.
    Init,
    /// Listening for a nearby advertisement.
    Discovering,
    /// Host candidate advertising its own group.
    Advertising,
    /// Host obtaining a room snapshot.
    ScanningRoom,
    /// Host starting the relayed session.
    StartingTransport,
    /// Client joining the relayed session.
    JoiningTransport,
    /// Host sharing its room with the group.
    SharingRoom,
    /// Client loading and aligning the shared room.
    LoadingRoom,
    /// Colocation complete.
    Ready,
    /// Run failed.
    Error,
}

impl ColocationState {
    /// Whether the state ends a run.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Ready | Self::Error)
    }

    /// Whether `next` is a legal successor.
    pub fn can_transition_to(self, next: Self) -> bool {
        use ColocationState as S;

        if next == S::Error {
            return !self.is_terminal();
        }

        matches!(
            (self, next),
            (S::Init, S::Discovering)
                | (S::Discovering, S::JoiningTransport | S::Advertising)
                | (S::Advertising, S::ScanningRoom | S::JoiningTransport)
                | (S::ScanningRoom, S::StartingTransport)
                | (S::StartingTransport, S::SharingRoom)
                | (S::SharingRoom | S::LoadingRoom, S::Ready)
                | (S::JoiningTransport, S::LoadingRoom)
        )
    }

    /// Status line shown while in this state.
    pub fn status_text(self) -> &'static str {
        match self {
            Self::Init => "Initializing colocation...",
            Self::Discovering => "Looking for nearby sessions...",
            Self::Advertising => "Starting session advertisement...",
            Self::ScanningRoom => "Scanning room...",
            Self::StartingTransport => "Starting network...",
            Self::JoiningTransport => "Joining session...",
            Self::SharingRoom => "Sharing room data...",
            Self::LoadingRoom => "Loading shared room...",
            Self::Ready => "Ready",
            Self::Error => "Error",
        }
    }
}

impl fmt::Display for ColocationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Per-run orchestration state.
///
/// Only the orchestrator mutates it; everyone else gets a shared reference.
#[derive(Debug, Clone)]
pub struct OrchestrationContext {
    state: ColocationState,
    role: Option<Role>,
    group_id: Option<GroupId>,
    last_error: Option<ColocationError>,
    state_entered_at: Instant,
}

impl OrchestrationContext {
    /// Fresh context in [`ColocationState::Init`].
    pub fn new(now: Instant) -> Self {
        Self {
            state: ColocationState::Init,
            role: None,
            group_id: None,
            last_error: None,
            state_entered_at: now,
        }
    }

    /// Current state.
    pub fn state(&self) -> ColocationState {
        self.state
    }

    /// Role, once negotiated.
    pub fn role(&self) -> Option<Role> {
        self.role
    }

    /// Group identifier, once determined.
    pub fn group_id(&self) -> Option<GroupId> {
        self.group_id
    }

    /// Error that ended the run, if it failed.
    pub fn last_error(&self) -> Option<&ColocationError> {
        self.last_error.as_ref()
    }

    /// When the current state was entered.
    pub fn state_entered_at(&self) -> Instant {
        self.state_entered_at
    }

    /// Time spent in the current state.
    pub fn elapsed_in_state(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.state_entered_at)
    }

    /// Move to `to`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransition` if `to` is not a successor of the current
    /// state. The context is left unchanged.
    pub(crate) fn transition(
        &mut self,
        to: ColocationState,
        now: Instant,
    ) -> Result<(), ColocationError> {
        if !self.state.can_transition_to(to) {
            return Err(ColocationError::InvalidTransition { from: self.state, to });
        }

        self.state = to;
        self.state_entered_at = now;
        Ok(())
    }

    /// Enter Error, recording `error`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransition` if the run already ended.
    pub(crate) fn fail(
        &mut self,
        error: ColocationError,
        now: Instant,
    ) -> Result<(), ColocationError> {
        self.transition(ColocationState::Error, now)?;
        self.last_error = Some(error);
        Ok(())
    }

    /// Record the negotiated role. The first assignment wins.
    pub(crate) fn assign_role(&mut self, role: Role) {
        match self.role {
            None => self.role = Some(role),
            Some(existing) if existing != role => {
                warn!(%existing, requested = %role, "role already assigned, keeping first");
            },
            Some(_) => {},
        }
    }

    /// Record the group identifier. The first assignment wins.
    pub(crate) fn assign_group(&mut self, group_id: GroupId) {
        match self.group_id {
            None => self.group_id = Some(group_id),
            Some(existing) if existing != group_id => {
                warn!(%existing, requested = %group_id, "group id already assigned, keeping first");
            },
            Some(_) => {},
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [ColocationState; 10] = [
        ColocationState::Init,
        ColocationState::Discovering,
        ColocationState::Advertising,
        ColocationState::ScanningRoom,
        ColocationState::StartingTransport,
        ColocationState::JoiningTransport,
        ColocationState::SharingRoom,
        ColocationState::LoadingRoom,
        ColocationState::Ready,
        ColocationState::Error,
    ];

    #[test]
    fn host_path_is_legal() {
        let t0 = Instant::now();
        let mut ctx = OrchestrationContext::new(t0);
        for next in [
            ColocationState::Discovering,
            ColocationState::Advertising,
            ColocationState::ScanningRoom,
            ColocationState::StartingTransport,
            ColocationState::SharingRoom,
            ColocationState::Ready,
        ] {
            ctx.transition(next, t0).unwrap();
        }
        assert_eq!(ctx.state(), ColocationState::Ready);
    }

    #[test]
    fn client_path_is_legal() {
        let t0 = Instant::now();
        let mut ctx = OrchestrationContext::new(t0);
        for next in [
            ColocationState::Discovering,
            ColocationState::JoiningTransport,
            ColocationState::LoadingRoom,
            ColocationState::Ready,
        ] {
            ctx.transition(next, t0).unwrap();
        }
        assert_eq!(ctx.state(), ColocationState::Ready);
    }

    #[test]
    fn terminal_states_have_no_successors() {
        for from in [ColocationState::Ready, ColocationState::Error] {
            for to in ALL {
                assert!(!from.can_transition_to(to), "{from} -> {to} should be rejected");
            }
        }
    }

    #[test]
    fn every_live_state_can_fail() {
        for from in ALL.into_iter().filter(|s| !s.is_terminal()) {
            assert!(from.can_transition_to(ColocationState::Error));
        }
    }

    #[test]
    fn invalid_transition_leaves_context_untouched() {
        let t0 = Instant::now();
        let mut ctx = OrchestrationContext::new(t0);
        let result = ctx.transition(ColocationState::SharingRoom, t0);
        assert!(matches!(
            result,
            Err(ColocationError::InvalidTransition {
                from: ColocationState::Init,
                to: ColocationState::SharingRoom
            })
        ));
        assert_eq!(ctx.state(), ColocationState::Init);
    }

    #[test]
    fn no_backward_edges() {
        assert!(!ColocationState::LoadingRoom.can_transition_to(ColocationState::JoiningTransport));
        assert!(!ColocationState::SharingRoom.can_transition_to(ColocationState::ScanningRoom));
        assert!(!ColocationState::Advertising.can_transition_to(ColocationState::Discovering));
    }

    #[test]
    fn first_group_assignment_wins() {
        let mut ctx = OrchestrationContext::new(Instant::now());
        let first = GroupId::from_u128(1);
        ctx.assign_group(first);
        ctx.assign_group(GroupId::from_u128(2));
        assert_eq!(ctx.group_id(), Some(first));

        ctx.assign_role(Role::Host);
        ctx.assign_role(Role::Client);
        assert_eq!(ctx.role(), Some(Role::Host));
    }

    #[test]
    fn fail_records_error() {
        let t0 = Instant::now();
        let mut ctx = OrchestrationContext::new(t0);
        ctx.transition(ColocationState::Discovering, t0).unwrap();
        ctx.fail(ColocationError::AdvertisementFailed("ble off".into()), t0).unwrap();
        assert_eq!(ctx.state(), ColocationState::Error);
        assert!(matches!(ctx.last_error(), Some(ColocationError::AdvertisementFailed(_))));
    }
}
