//! Captured room descriptions and the replicated room-shared record.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{group::GroupId, pose::Pose};

/// Spatial anchor identifier.
pub type AnchorId = Uuid;

/// Room identifier (the room anchor's UUID).
pub type RoomId = Uuid;

/// Semantic label of a scene anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnchorKind {
    /// Floor plane.
    Floor,
    /// Ceiling plane.
    Ceiling,
    /// Wall face.
    Wall,
    /// Furniture volume (table, couch, ...).
    Furniture,
    /// Environment mesh covering the whole room.
    GlobalMesh,
    /// Anything else.
    Other,
}

/// Single anchor in a room snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneAnchor {
    /// Anchor identifier.
    pub id: AnchorId,
    /// Semantic label.
    pub kind: AnchorKind,
    /// Pose in the snapshot's coordinate frame.
    pub pose: Pose,
    /// Whether collision surfaces are active.
    pub collision_enabled: bool,
}

impl SceneAnchor {
    /// Anchor with collision disabled, as shared data arrives.
    pub fn new(id: AnchorId, kind: AnchorKind, pose: Pose) -> Self {
        Self { id, kind, pose, collision_enabled: false }
    }
}

/// Captured set of anchors with a designated floor pose.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomSnapshot {
    /// Room identifier.
    pub room_id: RoomId,
    /// Anchors making up the room.
    pub anchors: Vec<SceneAnchor>,
    /// Floor pose in the snapshot's coordinate frame.
    pub floor: Pose,
}

impl RoomSnapshot {
    /// Snapshot from parts.
    pub fn new(room_id: RoomId, anchors: Vec<SceneAnchor>, floor: Pose) -> Self {
        Self { room_id, anchors, floor }
    }

    /// Room used when a client proceeds without any scan data.
    ///
    /// Has no anchors and an identity floor.
    pub fn local_fallback() -> Self {
        Self { room_id: Uuid::nil(), anchors: Vec::new(), floor: Pose::IDENTITY }
    }

    /// Whether every anchor has collision enabled.
    pub fn collision_ready(&self) -> bool {
        self.anchors.iter().all(|a| a.collision_enabled)
    }

    /// Turn on collision for every anchor. Returns how many were switched.
    pub fn enable_collision(&mut self) -> usize {
        let mut switched = 0;
        for anchor in self.anchors.iter_mut().filter(|a| !a.collision_enabled) {
            anchor.collision_enabled = true;
            switched += 1;
        }
        switched
    }

    /// Re-express the snapshot through `transform`.
    ///
    /// Every anchor pose and the floor pose become `transform ∘ pose`.
    pub fn apply_transform(&mut self, transform: &Pose) {
        for anchor in &mut self.anchors {
            anchor.pose = transform.compose(&anchor.pose);
        }
        self.floor = transform.compose(&self.floor);
    }
}

/// Transform mapping the local frame onto the host's frame.
///
/// `host_floor = transform ∘ local_floor`.
pub fn alignment_transform(host_floor: &Pose, local_floor: &Pose) -> Pose {
    host_floor.compose(&local_floor.inverse())
}

/// Replicated payload the host writes once its room is shared.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SharedRoomRecord {
    /// Sharing group.
    pub group_id: GroupId,
    /// Shared room.
    pub room_id: RoomId,
    /// Host floor pose in the host's frame.
    pub host_floor: Pose,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::Vec3;

    fn room() -> RoomSnapshot {
        let floor = Pose::from_yaw(Vec3::new(0.5, 0.0, 0.5), 0.3);
        RoomSnapshot::new(
            Uuid::from_u128(7),
            vec![
                SceneAnchor::new(Uuid::from_u128(1), AnchorKind::Floor, floor),
                SceneAnchor::new(
                    Uuid::from_u128(2),
                    AnchorKind::Wall,
                    Pose::from_yaw(Vec3::new(2.0, 1.2, 0.0), 1.0),
                ),
            ],
            floor,
        )
    }

    #[test]
    fn enable_collision_switches_each_anchor_once() {
        let mut room = room();
        assert!(!room.collision_ready());
        assert_eq!(room.enable_collision(), 2);
        assert!(room.collision_ready());
        assert_eq!(room.enable_collision(), 0);
    }

    #[test]
    fn alignment_maps_local_floor_onto_host_floor() {
        let host_floor = Pose::from_yaw(Vec3::new(1.0, 0.0, -3.0), -0.8);
        let mut room = room();
        let transform = alignment_transform(&host_floor, &room.floor);
        room.apply_transform(&transform);
        assert!(room.floor.approx_eq(&host_floor, 1e-4));
    }

    #[test]
    fn fallback_room_is_empty_but_present() {
        let room = RoomSnapshot::local_fallback();
        assert!(room.anchors.is_empty());
        assert!(room.collision_ready());
        assert_eq!(room.floor, Pose::IDENTITY);
    }
}
