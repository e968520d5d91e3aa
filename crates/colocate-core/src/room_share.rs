//! Room sharing between host and clients.
//!
//! Host: obtain a room, share it with the group, publish the room-shared
//! record over the session. Client: wait for that record, load the shared
//! room, align it into the host's frame. Both end with collision switched on
//! for every anchor.
//!
//! The client has one degraded path: if the record never shows up, or the
//! load outlives its bound, it carries on with local scan data and still
//! reaches Ready. Only a load that returns an error fails the run.

use std::time::Duration;

use tracing::{info, warn};

use crate::{
    anchors::{LoadFailure, SpatialAnchorStore},
    config::ColocationConfig,
    env::Environment,
    error::ColocationError,
    group::GroupId,
    pose::Pose,
    room::{RoomSnapshot, SharedRoomRecord},
    services::SessionHandle,
    wait,
};

/// Room a phase finished with.
#[derive(Debug, Clone, PartialEq)]
pub struct SharedRoom {
    /// Room in this device's final frame, collision enabled.
    pub room: RoomSnapshot,
    /// Transform applied to bring the room into the host's frame.
    pub alignment: Pose,
    /// Whether local data stood in for the shared room.
    pub degraded: bool,
}

/// Host and client room phases.
pub struct RoomShareCoordinator<E> {
    store: SpatialAnchorStore<E>,
    env: E,
    record_name: String,
    share_retry_backoff: Duration,
    shared_room_wait: Duration,
    shared_room_poll_interval: Duration,
    room_load_timeout: Duration,
}

impl<E: Environment> RoomShareCoordinator<E> {
    /// Coordinator over `store` with timings from `config`.
    pub fn new(store: SpatialAnchorStore<E>, env: E, config: &ColocationConfig) -> Self {
        Self {
            store,
            env,
            record_name: config.record_name.clone(),
            share_retry_backoff: config.share_retry_backoff,
            shared_room_wait: config.shared_room_wait,
            shared_room_poll_interval: config.shared_room_poll_interval,
            room_load_timeout: config.room_load_timeout,
        }
    }

    /// Forget the current room.
    pub fn reset(&mut self) {
        self.store.clear();
    }

    /// Host: reuse the local room or capture one.
    pub async fn prepare_host_room(&mut self) -> Result<RoomSnapshot, ColocationError> {
        let room = self.store.obtain_local_room(&self.record_name).await?;
        Ok(room.clone())
    }

    /// Host: share the current room with `group` and announce it.
    ///
    /// A rejected share is retried once after the backoff. The group may not
    /// have settled on the anchor service yet when the first attempt lands.
    pub async fn share_host_room(
        &mut self,
        group: GroupId,
        session: &dyn SessionHandle,
    ) -> Result<SharedRoom, ColocationError> {
        let Some(room) = self.store.current_room().cloned() else {
            return Err(ColocationError::RoomShareFailed("no room to share".to_string()));
        };

        if let Err(first) = self.store.share(group, &room).await {
            warn!(
                %group,
                error = %first,
                backoff_ms = self.share_retry_backoff.as_millis() as u64,
                "share rejected, retrying once"
            );
            self.env.sleep(self.share_retry_backoff).await;
            self.store
                .share(group, &room)
                .await
                .map_err(|e| ColocationError::RoomShareFailed(e.to_string()))?;
        }

        let record = SharedRoomRecord { group_id: group, room_id: room.room_id, host_floor: room.floor };
        session
            .publish_shared_room(record)
            .await
            .map_err(|e| ColocationError::RoomShareFailed(e.to_string()))?;
        info!(%group, room_id = %room.room_id, "room-shared record published");

        self.store.enable_collision();
        Ok(self.finish(Pose::IDENTITY, false))
    }

    /// Client: wait for the host's room, load it and align to it.
    pub async fn receive_shared_room(
        &mut self,
        group: GroupId,
        session: &dyn SessionHandle,
    ) -> Result<SharedRoom, ColocationError> {
        let started = self.env.now();
        let record = wait::poll(
            &self.env,
            "shared room wait",
            self.shared_room_poll_interval,
            self.shared_room_wait,
            || session.shared_room(),
        )
        .await;

        let record = match record {
            Ok(record) => record,
            Err(e) => {
                warn!(%group, error = %e, "host room never announced, continuing with local data");
                return Ok(self.degrade());
            },
        };

        let waited_ms = self.env.now().saturating_duration_since(started).as_millis() as u64;
        info!(%group, room_id = %record.room_id, waited_ms, "host announced shared room");
        if record.group_id != group {
            warn!(expected = %group, announced = %record.group_id, "room-shared record names another group");
        }

        self.store.clear();
        let room = match self.store.load(group, self.room_load_timeout).await {
            Ok(room) => room,
            Err(LoadFailure::TimedOut) => {
                warn!(%group, "shared room load timed out, continuing with local data");
                return Ok(self.degrade());
            },
            Err(LoadFailure::Failed(detail)) => return Err(ColocationError::RoomLoadFailed(detail)),
        };

        self.store.set_current(room);
        let alignment = self.store.align_to(&record.host_floor).unwrap_or(Pose::IDENTITY);
        self.store.enable_collision();
        Ok(self.finish(alignment, false))
    }

    fn degrade(&mut self) -> SharedRoom {
        self.store.use_local_fallback();
        self.store.enable_collision();
        self.finish(Pose::IDENTITY, true)
    }

    fn finish(&self, alignment: Pose, degraded: bool) -> SharedRoom {
        let room = self.store.current_room().cloned().unwrap_or_else(RoomSnapshot::local_fallback);
        SharedRoom { room, alignment, degraded }
    }
}
