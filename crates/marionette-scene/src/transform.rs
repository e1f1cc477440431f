// SPDX-License-Identifier: Apache-2.0
//! TRS transform value type.

use glam::{DMat4, DQuat, DVec3, EulerRot};

/// Rigid transform with non-uniform scale.
///
/// Conventions:
/// - `translation` in scene units (world space when composed).
/// - `rotation` as a unit quaternion; channel access converts through XYZ
///   euler degrees.
/// - `scale` applied before rotation/translation (`M = T * R * S`).
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Transform {
    /// Translation component.
    pub translation: DVec3,
    /// Rotation component.
    pub rotation: DQuat,
    /// Scale component.
    pub scale: DVec3,
}

impl Transform {
    /// Identity transform (no translation, no rotation, unit scale).
    #[must_use]
    pub const fn identity() -> Self {
        Self {
            translation: DVec3::ZERO,
            rotation: DQuat::IDENTITY,
            scale: DVec3::ONE,
        }
    }

    /// Creates a transform from components.
    #[must_use]
    pub const fn new(translation: DVec3, rotation: DQuat, scale: DVec3) -> Self {
        Self {
            translation,
            rotation,
            scale,
        }
    }

    /// Translation-only transform.
    #[must_use]
    pub const fn from_translation(translation: DVec3) -> Self {
        Self {
            translation,
            rotation: DQuat::IDENTITY,
            scale: DVec3::ONE,
        }
    }

    /// Builds the equivalent affine matrix (`T * R * S`).
    #[must_use]
    pub fn to_mat4(&self) -> DMat4 {
        DMat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }

    /// Decomposes an affine matrix back into TRS form.
    #[must_use]
    pub fn from_mat4(m: &DMat4) -> Self {
        let (scale, rotation, translation) = m.to_scale_rotation_translation();
        Self {
            translation,
            rotation,
            scale,
        }
    }

    /// Composes `self * other` (apply `other` in `self`'s space).
    #[must_use]
    pub fn mul(&self, other: &Self) -> Self {
        Self::from_mat4(&(self.to_mat4() * other.to_mat4()))
    }

    /// Inverse transform.
    #[must_use]
    pub fn inverse(&self) -> Self {
        Self::from_mat4(&self.to_mat4().inverse())
    }

    /// Rotation as XYZ euler angles in degrees.
    #[must_use]
    pub fn euler_deg(&self) -> DVec3 {
        let (x, y, z) = self.rotation.to_euler(EulerRot::XYZ);
        DVec3::new(x.to_degrees(), y.to_degrees(), z.to_degrees())
    }

    /// Replaces the rotation from XYZ euler angles in degrees.
    pub fn set_euler_deg(&mut self, euler: DVec3) {
        self.rotation = DQuat::from_euler(
            EulerRot::XYZ,
            euler.x.to_radians(),
            euler.y.to_radians(),
            euler.z.to_radians(),
        );
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compose_then_invert_round_trips() {
        let mut a = Transform::from_translation(DVec3::new(1.0, 2.0, 3.0));
        a.set_euler_deg(DVec3::new(0.0, 45.0, 0.0));
        let b = Transform::from_translation(DVec3::new(0.0, 1.0, 0.0));
        let ab = a.mul(&b);
        let back = a.inverse().mul(&ab);
        assert!((back.translation - b.translation).length() < 1e-9);
    }

    #[test]
    fn euler_channel_round_trip() {
        let mut t = Transform::identity();
        t.set_euler_deg(DVec3::new(30.0, 0.0, -15.0));
        let e = t.euler_deg();
        assert!((e.x - 30.0).abs() < 1e-9);
        assert!((e.z + 15.0).abs() < 1e-9);
    }
}
