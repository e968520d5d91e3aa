//! Spatial anchor store.
//!
//! Holds the device's current room and the primitive operations on it:
//! obtaining a local room, sharing it, loading a shared one, aligning it into
//! the host's frame and switching on collision. Sequencing and fallback
//! policy live in [`crate::room_share`].

use std::{
    sync::Arc,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use tracing::{debug, info, warn};

use crate::{
    env::Environment,
    error::{AnchorError, ColocationError},
    group::GroupId,
    pose::Pose,
    records::RoomRecord,
    room::{RoomId, RoomSnapshot, alignment_transform},
    services::{AnchorService, RoomRecordStore, RoomScanner},
    wait::{self, WaitError},
};

/// Why a shared-room load produced no room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadFailure {
    /// Load did not finish within its bound.
    TimedOut,
    /// Anchor service reported an error.
    Failed(String),
}

/// Current room plus the collaborators that produce and share it.
pub struct SpatialAnchorStore<E> {
    scanner: Arc<dyn RoomScanner>,
    anchors: Arc<dyn AnchorService>,
    records: Arc<dyn RoomRecordStore>,
    env: E,
    current: Option<RoomSnapshot>,
}

impl<E: Environment> SpatialAnchorStore<E> {
    /// Store over the given collaborators, with no current room.
    pub fn new(
        scanner: Arc<dyn RoomScanner>,
        anchors: Arc<dyn AnchorService>,
        records: Arc<dyn RoomRecordStore>,
        env: E,
    ) -> Self {
        Self { scanner, anchors, records, env, current: None }
    }

    /// Current room, if one has been obtained or loaded.
    pub fn current_room(&self) -> Option<&RoomSnapshot> {
        self.current.as_ref()
    }

    /// Replace the current room.
    pub fn set_current(&mut self, room: RoomSnapshot) {
        self.current = Some(room);
    }

    /// Drop the current room.
    pub fn clear(&mut self) {
        if let Some(room) = self.current.take() {
            debug!(room_id = %room.room_id, "cleared local room");
        }
    }

    /// Make the local scan current, running the capture flow if none exists.
    ///
    /// The capture flow is user-paced and is awaited without a bound.
    pub async fn obtain_local_room(&mut self, record_name: &str) -> Result<&RoomSnapshot, ColocationError> {
        if self.scanner.has_room() {
            if let Some(room) = self.scanner.current_room() {
                info!(room_id = %room.room_id, anchors = room.anchors.len(), "reusing existing room");
                self.check_record(record_name, &room);
                self.save_record(record_name, &room);
                return Ok(self.current.insert(room));
            }
        }

        info!("no room on device, requesting capture");
        if !self.scanner.request_capture().await {
            return Err(ColocationError::RoomCaptureFailed("capture cancelled".to_string()));
        }

        let room = self.scanner.current_room().ok_or_else(|| {
            ColocationError::RoomCaptureFailed("capture finished without a room".to_string())
        })?;
        info!(room_id = %room.room_id, anchors = room.anchors.len(), "room captured");
        self.save_record(record_name, &room);
        Ok(self.current.insert(room))
    }

    /// Room to proceed with when the shared room is unavailable.
    ///
    /// The local scan if one exists, otherwise an empty room.
    pub fn use_local_fallback(&mut self) -> &RoomSnapshot {
        let room = self.scanner.current_room().unwrap_or_else(RoomSnapshot::local_fallback);
        info!(room_id = %room.room_id, anchors = room.anchors.len(), "using local room data");
        self.current.insert(room)
    }

    /// Share `room` with `group` once.
    pub async fn share(&self, group: GroupId, room: &RoomSnapshot) -> Result<(), AnchorError> {
        self.anchors.share(group, room).await?;
        info!(%group, room_id = %room.room_id, anchors = room.anchors.len(), "room shared");
        Ok(())
    }

    /// Load the room shared with `group`, bounded by `timeout`.
    ///
    /// A load that outlives the bound keeps running and its result is
    /// discarded.
    pub async fn load(&self, group: GroupId, timeout: Duration) -> Result<RoomSnapshot, LoadFailure> {
        let anchors = Arc::clone(&self.anchors);
        let result = wait::detached(
            &self.env,
            "room load",
            timeout,
            async move { anchors.load(group).await },
            move |late| async move {
                debug!(%group, loaded = late.is_ok(), "discarding late room load");
            },
        )
        .await;

        match result {
            Ok(Ok(room)) => {
                info!(%group, room_id = %room.room_id, anchors = room.anchors.len(), "shared room loaded");
                Ok(room)
            },
            Ok(Err(e)) => Err(LoadFailure::Failed(e.to_string())),
            Err(WaitError::TimedOut { .. }) => Err(LoadFailure::TimedOut),
            Err(e @ WaitError::Abandoned { .. }) => Err(LoadFailure::Failed(e.to_string())),
        }
    }

    /// Re-express the current room in the host's frame.
    ///
    /// Returns the applied transform, or `None` with no current room.
    pub fn align_to(&mut self, host_floor: &Pose) -> Option<Pose> {
        let room = self.current.as_mut()?;
        let transform = alignment_transform(host_floor, &room.floor);
        room.apply_transform(&transform);
        info!(
            dx = transform.position.x,
            dz = transform.position.z,
            yaw = transform.yaw(),
            "aligned to host frame"
        );
        Some(transform)
    }

    /// Switch on collision for every anchor in the current room.
    pub fn enable_collision(&mut self) -> usize {
        let switched = self.current.as_mut().map_or(0, RoomSnapshot::enable_collision);
        debug!(switched, "collision enabled");
        switched
    }

    /// Saved room identifiers under `name` that `room` no longer covers.
    fn check_record(&self, name: &str, room: &RoomSnapshot) -> Vec<RoomId> {
        match self.records.get(name) {
            Ok(Some(record)) => {
                let missing = record.missing_from(&[room.room_id]);
                if !missing.is_empty() {
                    warn!(record = name, missing = missing.len(), "saved rooms no longer on device");
                }
                missing
            },
            Ok(None) => {
                debug!(record = name, "no saved room record");
                Vec::new()
            },
            Err(e) => {
                warn!(record = name, error = %e, "room record unreadable");
                Vec::new()
            },
        }
    }

    fn save_record(&self, name: &str, room: &RoomSnapshot) {
        let saved_at_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_millis() as u64);
        let record = RoomRecord::new(name, vec![room.room_id], saved_at_ms);
        if let Err(e) = self.records.save(&record) {
            warn!(record = name, error = %e, "failed to save room record");
        }
    }
}
