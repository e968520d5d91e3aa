//! Canned rooms.

use colocate_core::{
    pose::{Pose, Vec3},
    room::{AnchorKind, RoomSnapshot, SceneAnchor},
};
use uuid::Uuid;

/// Small room: floor, ceiling, four walls, a table and the global mesh.
///
/// Anchor identifiers are derived from `id`, so two rooms built from the
/// same `id` compare equal.
pub fn room(id: u128, floor: Pose) -> RoomSnapshot {
    let base = id << 16;
    let at = |x: f32, y: f32, z: f32, yaw: f32| floor.compose(&Pose::from_yaw(Vec3::new(x, y, z), yaw));
    let anchor = |n: u128, kind: AnchorKind, pose: Pose| SceneAnchor::new(Uuid::from_u128(base + n), kind, pose);

    let anchors = vec![
        anchor(1, AnchorKind::Floor, floor),
        anchor(2, AnchorKind::Ceiling, at(0.0, 2.6, 0.0, 0.0)),
        anchor(3, AnchorKind::Wall, at(0.0, 1.3, 3.0, std::f32::consts::PI)),
        anchor(4, AnchorKind::Wall, at(0.0, 1.3, -3.0, 0.0)),
        anchor(5, AnchorKind::Wall, at(2.5, 1.3, 0.0, -std::f32::consts::FRAC_PI_2)),
        anchor(6, AnchorKind::Wall, at(-2.5, 1.3, 0.0, std::f32::consts::FRAC_PI_2)),
        anchor(7, AnchorKind::Furniture, at(1.0, 0.4, 1.0, 0.3)),
        anchor(8, AnchorKind::GlobalMesh, floor),
    ];

    RoomSnapshot::new(Uuid::from_u128(id), anchors, floor)
}
