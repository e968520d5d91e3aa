//! Rigid-body poses for anchors, floors and the camera rig.
//!
//! Y is up. Rotations are unit quaternions; yaw is the rotation about +Y in
//! radians. Only what alignment needs is here: composition, inversion and
//! point transforms.

use std::ops::{Add, Mul, Neg, Sub};

use serde::{Deserialize, Serialize};

/// 3-component vector in metres.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    /// X component.
    pub x: f32,
    /// Y component (up).
    pub y: f32,
    /// Z component.
    pub z: f32,
}

impl Vec3 {
    /// Origin.
    pub const ZERO: Self = Self { x: 0.0, y: 0.0, z: 0.0 };

    /// Construct from components.
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Euclidean length.
    pub fn length(self) -> f32 {
        self.dot(self).sqrt()
    }

    /// Dot product.
    pub fn dot(self, other: Self) -> f32 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    /// Cross product.
    pub fn cross(self, other: Self) -> Self {
        Self {
            x: self.y * other.z - self.z * other.y,
            y: self.z * other.x - self.x * other.z,
            z: self.x * other.y - self.y * other.x,
        }
    }

    /// Scale by `factor`.
    pub fn scale(self, factor: f32) -> Self {
        Self { x: self.x * factor, y: self.y * factor, z: self.z * factor }
    }
}

impl Add for Vec3 {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self { x: self.x + rhs.x, y: self.y + rhs.y, z: self.z + rhs.z }
    }
}

impl Sub for Vec3 {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self { x: self.x - rhs.x, y: self.y - rhs.y, z: self.z - rhs.z }
    }
}

impl Neg for Vec3 {
    type Output = Self;

    fn neg(self) -> Self {
        Self { x: -self.x, y: -self.y, z: -self.z }
    }
}

/// Unit quaternion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quat {
    /// X component.
    pub x: f32,
    /// Y component.
    pub y: f32,
    /// Z component.
    pub z: f32,
    /// Scalar component.
    pub w: f32,
}

impl Default for Quat {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Quat {
    /// No rotation.
    pub const IDENTITY: Self = Self { x: 0.0, y: 0.0, z: 0.0, w: 1.0 };

    /// Rotation of `yaw` radians about +Y.
    pub fn from_yaw(yaw: f32) -> Self {
        let (s, c) = (yaw * 0.5).sin_cos();
        Self { x: 0.0, y: s, z: 0.0, w: c }
    }

    /// Heading about +Y, in radians within `(-π, π]`.
    pub fn yaw(self) -> f32 {
        let m02 = 2.0 * (self.x * self.z + self.w * self.y);
        let m22 = 1.0 - 2.0 * (self.x * self.x + self.y * self.y);
        m02.atan2(m22)
    }

    /// Inverse of a unit quaternion.
    pub fn conjugate(self) -> Self {
        Self { x: -self.x, y: -self.y, z: -self.z, w: self.w }
    }

    /// Rescale to unit length. Degenerate input yields identity.
    pub fn normalize(self) -> Self {
        let len = (self.x * self.x + self.y * self.y + self.z * self.z + self.w * self.w).sqrt();
        if len <= f32::EPSILON {
            return Self::IDENTITY;
        }
        Self { x: self.x / len, y: self.y / len, z: self.z / len, w: self.w / len }
    }

    /// Rotate `v` by this quaternion.
    pub fn rotate(self, v: Vec3) -> Vec3 {
        let u = Vec3::new(self.x, self.y, self.z);
        let uv = u.cross(v);
        let uuv = u.cross(uv);
        v + uv.scale(2.0 * self.w) + uuv.scale(2.0)
    }
}

impl Mul for Quat {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        Self {
            x: self.w * rhs.x + self.x * rhs.w + self.y * rhs.z - self.z * rhs.y,
            y: self.w * rhs.y - self.x * rhs.z + self.y * rhs.w + self.z * rhs.x,
            z: self.w * rhs.z + self.x * rhs.y - self.y * rhs.x + self.z * rhs.w,
            w: self.w * rhs.w - self.x * rhs.x - self.y * rhs.y - self.z * rhs.z,
        }
    }
}

/// Position and orientation.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Pose {
    /// Position in metres.
    pub position: Vec3,
    /// Orientation.
    pub rotation: Quat,
}

impl Pose {
    /// Origin, no rotation.
    pub const IDENTITY: Self = Self { position: Vec3::ZERO, rotation: Quat::IDENTITY };

    /// Construct from parts.
    pub const fn new(position: Vec3, rotation: Quat) -> Self {
        Self { position, rotation }
    }

    /// Pose at `position` facing `yaw` radians.
    pub fn from_yaw(position: Vec3, yaw: f32) -> Self {
        Self { position, rotation: Quat::from_yaw(yaw) }
    }

    /// Heading of this pose.
    pub fn yaw(&self) -> f32 {
        self.rotation.yaw()
    }

    /// `self ∘ other`: express `other`, given in this pose's space, in the
    /// parent space.
    pub fn compose(&self, other: &Self) -> Self {
        Self {
            position: self.position + self.rotation.rotate(other.position),
            rotation: (self.rotation * other.rotation).normalize(),
        }
    }

    /// Inverse transform.
    pub fn inverse(&self) -> Self {
        let rotation = self.rotation.conjugate();
        Self { position: -rotation.rotate(self.position), rotation }
    }

    /// Map a point from this pose's space to the parent space.
    pub fn transform_point(&self, point: Vec3) -> Vec3 {
        self.position + self.rotation.rotate(point)
    }

    /// Map a point from the parent space into this pose's space.
    pub fn inverse_transform_point(&self, point: Vec3) -> Vec3 {
        self.rotation.conjugate().rotate(point - self.position)
    }

    /// Component-wise comparison within `epsilon`.
    ///
    /// `q` and `-q` describe the same rotation and compare equal.
    pub fn approx_eq(&self, other: &Self, epsilon: f32) -> bool {
        let close = |a: f32, b: f32| (a - b).abs() <= epsilon;
        let position = close(self.position.x, other.position.x)
            && close(self.position.y, other.position.y)
            && close(self.position.z, other.position.z);
        let (a, b) = (self.rotation, other.rotation);
        let same = close(a.x, b.x) && close(a.y, b.y) && close(a.z, b.z) && close(a.w, b.w);
        let flipped = close(a.x, -b.x) && close(a.y, -b.y) && close(a.z, -b.z) && close(a.w, -b.w);
        position && (same || flipped)
    }
}

#[cfg(test)]
mod tests {
    use std::f32::consts::{FRAC_PI_2, PI};

    use proptest::prelude::*;

    use super::*;

    const EPS: f32 = 1e-4;

    #[test]
    fn quarter_turn_rotates_forward_to_right() {
        let q = Quat::from_yaw(FRAC_PI_2);
        let v = q.rotate(Vec3::new(0.0, 0.0, 1.0));
        assert!((v.x - 1.0).abs() < EPS);
        assert!(v.z.abs() < EPS);
    }

    #[test]
    fn compose_with_inverse_is_identity() {
        let pose = Pose::from_yaw(Vec3::new(1.0, 0.5, -2.0), 0.7);
        assert!(pose.compose(&pose.inverse()).approx_eq(&Pose::IDENTITY, EPS));
        assert!(pose.inverse().compose(&pose).approx_eq(&Pose::IDENTITY, EPS));
    }

    #[test]
    fn inverse_transform_undoes_transform() {
        let pose = Pose::from_yaw(Vec3::new(3.0, 0.0, 1.0), -1.2);
        let p = Vec3::new(0.25, 1.5, -0.75);
        let back = pose.inverse_transform_point(pose.transform_point(p));
        assert!((back - p).length() < EPS);
    }

    proptest! {
        #[test]
        fn yaw_round_trips(yaw in -3.1f32..3.1) {
            prop_assert!((Quat::from_yaw(yaw).yaw() - yaw).abs() < EPS);
        }

        #[test]
        fn rotation_preserves_length(yaw in -PI..PI, x in -10f32..10.0, z in -10f32..10.0) {
            let v = Vec3::new(x, 1.0, z);
            let r = Quat::from_yaw(yaw).rotate(v);
            prop_assert!((r.length() - v.length()).abs() < 1e-3);
        }
    }
}
