//! Infinite plane primitive: `normal . p == d`.

use crate::core::types::{Number, Vec3};
use crate::geom::validate;

pub const NEAR_ZERO: Number = 1e-6;
/// Denominator threshold below which a line-plane intersection is treated as degenerate.
pub const DEGENERATE_DENOM: Number = 1e-5;

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Plane {
    pub normal: Vec3,
    pub d: Number,
}

impl Plane {
    pub fn new(normal: Vec3, d: Number) -> Self {
        validate::vector3(normal);
        validate::number(d);
        Self { normal, d }
    }

    /// `normal` isn't required to be unit length here — callers like the
    /// SAT clipper build side planes from un-normalized edge crosses, where
    /// only the sign of `signed_distance` matters.
    pub fn from_point_normal(point: Vec3, normal: Vec3) -> Self {
        validate::vector3(point);
        validate::vector3(normal);
        Self {
            normal,
            d: normal.dot(point),
        }
    }

    /// Positive in front of the plane (in the direction of `normal`), negative behind.
    pub fn signed_distance(&self, point: Vec3) -> Number { self.normal.dot(point) - self.d }

    /// The point on segment `p1 -> p2` where the plane's signed distance is zero.
    ///
    /// Assumes the segment isn't (near-)parallel to the plane; callers must
    /// check that separately (see [`crate::geom::transform::are_parallel`]).
    pub fn line_intersection(&self, p1: Vec3, p2: Vec3) -> Vec3 {
        let d1 = self.signed_distance(p1);
        let d2 = self.signed_distance(p2);
        let denom = d1 - d2;
        if denom.abs() < DEGENERATE_DENOM {
            return p1;
        }
        let t = d1 / denom;
        p1 + (p2 - p1) * t
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn signed_distance_matches_canonical_form() {
        let plane = Plane::new(Vec3::Z, 0.0);
        assert_relative_eq!(plane.signed_distance(Vec3::new(0.0, 0.0, 0.4)), 0.4);
        assert_relative_eq!(plane.signed_distance(Vec3::new(5.0, -3.0, -1.0)), -1.0);
    }

    #[test]
    fn line_intersection_finds_zero_crossing() {
        let plane = Plane::new(Vec3::Z, 1.0);
        let hit = plane.line_intersection(Vec3::new(0.0, 0.0, 0.0), Vec3::new(0.0, 0.0, 2.0));
        assert_relative_eq!(hit.z, 1.0);
    }
}
