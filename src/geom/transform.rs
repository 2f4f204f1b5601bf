//! Model-to-world transform: position + unit quaternion rotation + diagonal scale.

use crate::core::types::{Number, Quat, Vec3};
use crate::geom::validate;

/// A diagonal 3x3 matrix, stored as its three diagonal entries.
///
/// The data model only ever needs componentwise scale, its inverse, and
/// mat-vec — a full 3x3 matrix type would carry unused generality.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Diag3x3(Vec3);

impl Diag3x3 {
    pub const IDENTITY: Diag3x3 = Diag3x3(Vec3::ONE);

    pub fn new(diag: Vec3) -> Self {
        validate::vector3(diag);
        Self(diag)
    }

    pub fn diag(&self) -> Vec3 { self.0 }

    pub fn mul_vec(&self, v: Vec3) -> Vec3 { v * self.0 }

    pub fn inverse(&self) -> Diag3x3 { Diag3x3(1.0 / self.0) }

    pub fn is_all_zero(&self) -> bool { self.0 == Vec3::ZERO }
}

impl Default for Diag3x3 {
    fn default() -> Self { Self::IDENTITY }
}

/// A model-to-world rigid-plus-scale transform: `world = pos + R * (S * local)`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Trs {
    pos: Vec3,
    rot: Quat,
    scale: Diag3x3,
}

impl Trs {
    pub fn new(pos: Vec3, rot: Quat, scale: Diag3x3) -> Self {
        validate::vector3(pos);
        validate::unit_quat(rot);
        Self { pos, rot, scale }
    }

    pub fn identity() -> Self { Self::new(Vec3::ZERO, Quat::IDENTITY, Diag3x3::IDENTITY) }

    pub fn pos(&self) -> Vec3 { self.pos }
    pub fn rot(&self) -> Quat { self.rot }
    pub fn scale(&self) -> Diag3x3 { self.scale }

    pub fn transform_point(&self, p: Vec3) -> Vec3 { self.pos + self.rot * self.scale.mul_vec(p) }

    /// Transforms a direction vector: rotation and scale only, no translation.
    pub fn transform_vector(&self, v: Vec3) -> Vec3 { self.rot * self.scale.mul_vec(v) }

    /// Transforms a surface normal: `R * S^-1`, which keeps the normal
    /// perpendicular to the surface under non-uniform scale (unlike
    /// transforming it the same way as a regular vector).
    pub fn transform_normal(&self, n: Vec3) -> Vec3 { self.rot * self.scale.inverse().mul_vec(n) }

    pub fn inverse_transform_point(&self, p: Vec3) -> Vec3 {
        self.scale.inverse().mul_vec(self.rot.conjugate() * (p - self.pos))
    }

    pub fn inverse_transform_vector(&self, v: Vec3) -> Vec3 {
        self.scale.inverse().mul_vec(self.rot.conjugate() * v)
    }
}

/// `| |a . b| - 1 | < 1e-4`
pub const PARALLEL_EPSILON: Number = 1e-4;

pub fn are_parallel(a: Vec3, b: Vec3) -> bool { (a.normalize().dot(b.normalize()).abs() - 1.0).abs() < PARALLEL_EPSILON }

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn diag_inverse_round_trips() {
        let d = Diag3x3::new(Vec3::new(2.0, 4.0, 0.5));
        let v = Vec3::new(1.0, 1.0, 1.0);
        let round = d.inverse().mul_vec(d.mul_vec(v));
        assert_relative_eq!(round.x, v.x, epsilon = 1e-12);
        assert_relative_eq!(round.y, v.y, epsilon = 1e-12);
        assert_relative_eq!(round.z, v.z, epsilon = 1e-12);
    }

    #[test]
    fn parallel_vectors_detected_regardless_of_orientation() {
        assert!(are_parallel(Vec3::X, Vec3::X));
        assert!(are_parallel(Vec3::X, -Vec3::X));
        assert!(!are_parallel(Vec3::X, Vec3::Y));
    }
}
