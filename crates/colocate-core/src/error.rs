//! Error types.
//!
//! [`ColocationError`] is what the orchestrator reports when a run ends in
//! the Error state. The collaborator errors below it are what the external
//! services return; each phase converts them into the matching
//! [`ColocationError`] variant at its boundary.

use std::fmt;

use thiserror::Error;

use crate::{group::GroupId, state::ColocationState};

/// Tag identifying why a run failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureCause {
    /// Short-range discovery could not be used at all.
    DiscoveryUnavailable,
    /// Self-advertisement could not be started.
    AdvertisementFailed,
    /// No room existed and the capture flow did not produce one.
    RoomCaptureFailed,
    /// Host could not start the relayed session.
    TransportStartFailed,
    /// Client could not join the relayed session.
    TransportJoinFailed,
    /// Host room could not be shared with the group.
    RoomShareFailed,
    /// Client failed to load the shared room.
    RoomLoadFailed,
    /// State machine was asked to take an edge outside its graph.
    InvalidTransition,
}

impl fmt::Display for FailureCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            Self::DiscoveryUnavailable => "DiscoveryUnavailable",
            Self::AdvertisementFailed => "AdvertisementFailed",
            Self::RoomCaptureFailed => "RoomCaptureFailed",
            Self::TransportStartFailed => "TransportStartFailed",
            Self::TransportJoinFailed => "TransportJoinFailed",
            Self::RoomShareFailed => "RoomShareFailed",
            Self::RoomLoadFailed => "RoomLoadFailed",
            Self::InvalidTransition => "InvalidTransition",
        };
        f.write_str(tag)
    }
}

/// Terminal failure of a colocation run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ColocationError {
    /// Discovery could not be started.
    #[error("discovery unavailable: {0}")]
    DiscoveryUnavailable(String),

    /// Advertisement could not be started.
    #[error("failed to start advertisement: {0}")]
    AdvertisementFailed(String),

    /// Room capture was cancelled or failed.
    #[error("room capture failed: {0}")]
    RoomCaptureFailed(String),

    /// Session start failed or timed out.
    #[error("failed to start session: {0}")]
    TransportStartFailed(String),

    /// Session join failed or timed out.
    #[error("failed to join session: {0}")]
    TransportJoinFailed(String),

    /// Room share failed after its retry.
    #[error("failed to share room: {0}")]
    RoomShareFailed(String),

    /// Shared room load returned an error.
    #[error("failed to load shared room: {0}")]
    RoomLoadFailed(String),

    /// Transition outside the state graph.
    #[error("invalid transition from {from:?} to {to:?}")]
    InvalidTransition {
        /// State the machine was in.
        from: ColocationState,
        /// State that was requested.
        to: ColocationState,
    },
}

impl ColocationError {
    /// Cause tag for this error.
    pub fn cause(&self) -> FailureCause {
        match self {
            Self::DiscoveryUnavailable(_) => FailureCause::DiscoveryUnavailable,
            Self::AdvertisementFailed(_) => FailureCause::AdvertisementFailed,
            Self::RoomCaptureFailed(_) => FailureCause::RoomCaptureFailed,
            Self::TransportStartFailed(_) => FailureCause::TransportStartFailed,
            Self::TransportJoinFailed(_) => FailureCause::TransportJoinFailed,
            Self::RoomShareFailed(_) => FailureCause::RoomShareFailed,
            Self::RoomLoadFailed(_) => FailureCause::RoomLoadFailed,
            Self::InvalidTransition { .. } => FailureCause::InvalidTransition,
        }
    }
}

/// Errors from the short-range discovery channel.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiscoveryError {
    /// Discovery or advertisement is not available on this device.
    #[error("discovery unavailable: {0}")]
    Unavailable(String),

    /// Advertisement start was rejected.
    #[error("advertisement rejected: {0}")]
    AdvertisementRejected(String),
}

/// Errors from the relayed session transport.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Relay refused to start or join the session.
    #[error("session {name} rejected: {reason}")]
    Rejected {
        /// Session name.
        name: String,
        /// Reason reported by the relay.
        reason: String,
    },

    /// Session was shut down.
    #[error("session closed")]
    Closed,
}

/// Errors from the spatial anchor service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnchorError {
    /// Nothing has been shared with this group.
    #[error("no room shared with group {0}")]
    NothingShared(GroupId),

    /// Share was rejected, typically because the group is not yet known.
    #[error("share to group {group} rejected: {reason}")]
    ShareRejected {
        /// Target group.
        group: GroupId,
        /// Reason reported by the service.
        reason: String,
    },

    /// Anchors could not be localized on this device.
    #[error("localization failed: {0}")]
    Localization(String),
}

/// Errors from the room record store.
#[derive(Debug, Error)]
pub enum RecordError {
    /// Backing storage failed.
    #[error("storage error: {0}")]
    Storage(String),

    /// Stored bytes could not be encoded or decoded.
    #[error("encoding error: {0}")]
    Encoding(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cause_tags_match_variants() {
        let cases = [
            (ColocationError::AdvertisementFailed(String::new()), FailureCause::AdvertisementFailed),
            (ColocationError::RoomCaptureFailed(String::new()), FailureCause::RoomCaptureFailed),
            (ColocationError::TransportStartFailed(String::new()), FailureCause::TransportStartFailed),
            (ColocationError::TransportJoinFailed(String::new()), FailureCause::TransportJoinFailed),
            (ColocationError::RoomShareFailed(String::new()), FailureCause::RoomShareFailed),
            (ColocationError::RoomLoadFailed(String::new()), FailureCause::RoomLoadFailed),
        ];
        for (error, cause) in cases {
            assert_eq!(error.cause(), cause);
        }
    }

    #[test]
    fn messages_carry_detail() {
        let error = ColocationError::TransportJoinFailed("relay refused".to_string());
        assert_eq!(error.to_string(), "failed to join session: relay refused");
        assert_eq!(error.cause().to_string(), "TransportJoinFailed");
    }
}
