//! Collaborator contracts.
//!
//! The orchestrator never talks to device APIs directly. Everything it needs
//! from the outside world comes through these traits: production wires them
//! to platform services, the simulation harness wires them to in-process
//! fakes.
//!
//! All traits are object-safe and are held as `Arc<dyn Trait>` so a single
//! [`Services`] bundle can be cloned into every phase.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;

use crate::{
    error::{AnchorError, DiscoveryError, RecordError, TransportError},
    group::GroupId,
    records::RoomRecord,
    room::{RoomSnapshot, SharedRoomRecord},
};

/// Local room scan data.
#[async_trait]
pub trait RoomScanner: Send + Sync + 'static {
    /// Whether the device already holds a room scan.
    fn has_room(&self) -> bool;

    /// Current room scan, if any.
    fn current_room(&self) -> Option<RoomSnapshot>;

    /// Run the user-paced capture flow.
    ///
    /// Resolves `true` once a room exists, `false` if the user cancelled.
    /// Callers must not bound this wait.
    async fn request_capture(&self) -> bool;
}

/// Short-range advertise/discover of a group identifier.
#[async_trait]
pub trait DiscoveryChannel: Send + Sync + 'static {
    /// Start advertising. Resolves to the advertised group identifier.
    async fn advertise(&self) -> Result<GroupId, DiscoveryError>;

    /// Listen for an advertisement for at most `timeout`.
    ///
    /// `Ok(None)` means nothing was heard in time. Implementations resolve no
    /// earlier than `timeout` in that case.
    async fn discover(&self, timeout: Duration) -> Result<Option<GroupId>, DiscoveryError>;

    /// Stop a running advertisement. No-op if none is running.
    async fn stop_advertising(&self);

    /// Whether this device hosts no matter who already joined the session.
    fn forces_host(&self) -> bool {
        false
    }
}

/// Relayed multi-device session.
#[async_trait]
pub trait SessionTransport: Send + Sync + 'static {
    /// Start the session `name`, or join it if it already exists.
    async fn start_or_join(&self, name: &str) -> Result<Box<dyn SessionHandle>, TransportError>;
}

/// Live membership in a relayed session.
#[async_trait]
pub trait SessionHandle: Send + Sync + std::fmt::Debug {
    /// Session name.
    fn name(&self) -> &str;

    /// Participants present when this handle entered, including itself.
    fn participant_count(&self) -> usize;

    /// Replicate the room-shared record to every participant.
    async fn publish_shared_room(&self, record: SharedRoomRecord) -> Result<(), TransportError>;

    /// Latest replicated room-shared record, if the host published one.
    fn shared_room(&self) -> Option<SharedRoomRecord>;

    /// Leave the session.
    async fn shutdown(&self);
}

/// Cloud spatial-anchor load/share keyed by group.
#[async_trait]
pub trait AnchorService: Send + Sync + 'static {
    /// Load and localize the room shared with `group`.
    ///
    /// Loaded anchors may arrive with collision disabled.
    async fn load(&self, group: GroupId) -> Result<RoomSnapshot, AnchorError>;

    /// Share `room` with `group`.
    async fn share(&self, group: GroupId, room: &RoomSnapshot) -> Result<(), AnchorError>;
}

/// Advisory room-record persistence.
pub trait RoomRecordStore: Send + Sync + 'static {
    /// Insert or replace the record under its name.
    fn save(&self, record: &RoomRecord) -> Result<(), RecordError>;

    /// Record stored under `name`.
    fn get(&self, name: &str) -> Result<Option<RoomRecord>, RecordError>;

    /// Remove the record under `name`. Returns whether one existed.
    fn remove(&self, name: &str) -> Result<bool, RecordError>;

    /// Every stored record, sorted by name.
    fn list(&self) -> Result<Vec<RoomRecord>, RecordError>;
}

/// Collaborators a colocation run needs.
#[derive(Clone)]
pub struct Services {
    /// Local room scan.
    pub scanner: Arc<dyn RoomScanner>,
    /// Short-range discovery.
    pub discovery: Arc<dyn DiscoveryChannel>,
    /// Relayed session.
    pub transport: Arc<dyn SessionTransport>,
    /// Spatial anchors.
    pub anchors: Arc<dyn AnchorService>,
    /// Room-record persistence.
    pub records: Arc<dyn RoomRecordStore>,
}

impl std::fmt::Debug for Services {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Services").finish_non_exhaustive()
    }
}
