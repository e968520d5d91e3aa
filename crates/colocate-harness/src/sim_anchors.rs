//! Simulated spatial-anchor cloud.
//!
//! Each device has its own tracking frame, related to a common world frame
//! by a fixed offset pose. Shared rooms are stored in world coordinates and
//! handed back in the loading device's frame, with collision switched off,
//! the way freshly localized anchors arrive on a real device.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use async_trait::async_trait;
use colocate_core::{
    env::Environment,
    error::AnchorError,
    group::GroupId,
    pose::Pose,
    room::RoomSnapshot,
    services::AnchorService,
};
use tracing::debug;

#[derive(Debug, Default)]
struct CloudState {
    shared: HashMap<GroupId, RoomSnapshot>,
    share_failures: usize,
    share_calls: usize,
    load_delay: Duration,
    load_error: Option<String>,
}

/// Anchor cloud shared by every device in a scenario.
#[derive(Debug, Clone, Default)]
pub struct SimAnchorCloud {
    state: Arc<Mutex<CloudState>>,
}

impl SimAnchorCloud {
    /// Cloud with nothing shared.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject the next `count` share calls.
    pub fn fail_shares(&self, count: usize) {
        self.lock().share_failures = count;
    }

    /// Delay every load by `delay`.
    pub fn set_load_delay(&self, delay: Duration) {
        self.lock().load_delay = delay;
    }

    /// Make every load fail with `reason`.
    pub fn fail_loads(&self, reason: impl Into<String>) {
        self.lock().load_error = Some(reason.into());
    }

    /// Share calls made so far, failed ones included.
    pub fn share_calls(&self) -> usize {
        self.lock().share_calls
    }

    /// Room shared with `group`, in world coordinates.
    pub fn shared_room(&self, group: GroupId) -> Option<RoomSnapshot> {
        self.lock().shared.get(&group).cloned()
    }

    /// Access point for a device whose frame sits at `frame` in the world.
    pub fn device<E: Environment>(&self, frame: Pose, env: E) -> SimAnchorService<E> {
        SimAnchorService { cloud: self.clone(), frame, env }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CloudState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// One device's access to the [`SimAnchorCloud`].
#[derive(Debug, Clone)]
pub struct SimAnchorService<E> {
    cloud: SimAnchorCloud,
    frame: Pose,
    env: E,
}

#[async_trait]
impl<E: Environment> AnchorService for SimAnchorService<E> {
    async fn load(&self, group: GroupId) -> Result<RoomSnapshot, AnchorError> {
        let delay = self.cloud.lock().load_delay;
        if !delay.is_zero() {
            self.env.sleep(delay).await;
        }

        let mut room = {
            let state = self.cloud.lock();
            if let Some(reason) = &state.load_error {
                return Err(AnchorError::Localization(reason.clone()));
            }
            state.shared.get(&group).cloned().ok_or(AnchorError::NothingShared(group))?
        };

        room.apply_transform(&self.frame.inverse());
        for anchor in &mut room.anchors {
            anchor.collision_enabled = false;
        }
        debug!(%group, anchors = room.anchors.len(), "room localized");
        Ok(room)
    }

    async fn share(&self, group: GroupId, room: &RoomSnapshot) -> Result<(), AnchorError> {
        let mut state = self.cloud.lock();
        state.share_calls += 1;
        if state.share_failures > 0 {
            state.share_failures -= 1;
            return Err(AnchorError::ShareRejected { group, reason: "group not yet known".to_string() });
        }

        let mut world = room.clone();
        world.apply_transform(&self.frame);
        state.shared.insert(group, world);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use colocate_core::{env::SystemEnv, pose::Vec3};

    use super::*;
    use crate::fixtures;

    #[tokio::test(start_paused = true)]
    async fn loaded_room_is_in_loader_frame_without_collision() {
        let cloud = SimAnchorCloud::new();
        let host_frame = Pose::IDENTITY;
        let client_frame = Pose::from_yaw(Vec3::new(2.0, 0.0, 1.0), 0.9);
        let host = cloud.device(host_frame, SystemEnv);
        let client = cloud.device(client_frame, SystemEnv);

        let mut room = fixtures::room(1, Pose::from_yaw(Vec3::new(0.5, 0.0, 0.5), 0.2));
        room.enable_collision();
        let group = GroupId::from_u128(9);
        host.share(group, &room).await.unwrap();

        let loaded = client.load(group).await.unwrap();
        assert!(!loaded.collision_ready());
        assert!(client_frame.compose(&loaded.floor).approx_eq(&room.floor, 1e-4));
    }

    #[tokio::test(start_paused = true)]
    async fn share_failures_are_consumed() {
        let cloud = SimAnchorCloud::new();
        cloud.fail_shares(1);
        let device = cloud.device(Pose::IDENTITY, SystemEnv);
        let room = fixtures::room(1, Pose::IDENTITY);
        let group = GroupId::from_u128(3);

        assert!(device.share(group, &room).await.is_err());
        assert!(device.share(group, &room).await.is_ok());
        assert_eq!(cloud.share_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn loading_unshared_group_fails() {
        let cloud = SimAnchorCloud::new();
        let device = cloud.device(Pose::IDENTITY, SystemEnv);
        assert!(matches!(
            device.load(GroupId::from_u128(4)).await,
            Err(AnchorError::NothingShared(_))
        ));
    }
}
