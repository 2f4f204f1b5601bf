//! Axis-aligned bounding boxes.

use crate::core::types::{Number, Vec3};
use crate::geom::transform::{Diag3x3, Trs};

/// An axis-aligned bounding box, stored as its lower and upper corners.
///
/// # Invariants
/// `p_min <= p_max` componentwise.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Aabb {
    p_min: Vec3,
    p_max: Vec3,
}

impl Aabb {
    pub fn new(a: Vec3, b: Vec3) -> Self {
        Self {
            p_min: a.min(b),
            p_max: a.max(b),
        }
    }

    pub const fn from_min_max(p_min: Vec3, p_max: Vec3) -> Self { Self { p_min, p_max } }

    pub fn p_min(&self) -> Vec3 { self.p_min }
    pub fn p_max(&self) -> Vec3 { self.p_max }
    pub fn center(&self) -> Vec3 { (self.p_min + self.p_max) * 0.5 }
    pub fn extents(&self) -> Vec3 { (self.p_max - self.p_min) * 0.5 }
    pub fn size(&self) -> Vec3 { self.p_max - self.p_min }

    pub fn area(&self) -> Number {
        let s = self.size();
        2.0 * (s.x * s.y + s.y * s.z + s.z * s.x)
    }

    /// The 8 corners of the box, in a fixed, deterministic order.
    pub fn corners(&self) -> [Vec3; 8] {
        let (l, h) = (self.p_min, self.p_max);
        [
            Vec3::new(l.x, l.y, l.z),
            Vec3::new(l.x, l.y, h.z),
            Vec3::new(l.x, h.y, l.z),
            Vec3::new(l.x, h.y, h.z),
            Vec3::new(h.x, l.y, l.z),
            Vec3::new(h.x, l.y, h.z),
            Vec3::new(h.x, h.y, l.z),
            Vec3::new(h.x, h.y, h.z),
        ]
    }

    pub fn overlaps(&self, other: &Aabb) -> bool {
        self.p_min.x <= other.p_max.x
            && self.p_max.x >= other.p_min.x
            && self.p_min.y <= other.p_max.y
            && self.p_max.y >= other.p_min.y
            && self.p_min.z <= other.p_max.z
            && self.p_max.z >= other.p_min.z
    }

    pub fn contains_point(&self, p: Vec3) -> bool {
        (self.p_min.cmple(p) & self.p_max.cmpge(p)).all()
    }

    pub fn union(&self, other: &Aabb) -> Aabb {
        Aabb::new(self.p_min.min(other.p_min), self.p_max.max(other.p_max))
    }

    pub fn union_point(&self, p: Vec3) -> Aabb { Aabb::new(self.p_min.min(p), self.p_max.max(p)) }

    pub fn encompass<'a>(boxes: impl IntoIterator<Item = &'a Aabb>) -> Aabb {
        boxes
            .into_iter()
            .fold(Aabb::new(Vec3::splat(Number::INFINITY), Vec3::splat(Number::NEG_INFINITY)), |a, b| a.union(b))
    }

    pub fn encompass_points_slice(points: &[Vec3]) -> Aabb {
        points.iter().fold(Aabb::default(), |a, &p| a.union_point(p))
    }

    pub fn expand(&self, margin: Number) -> Aabb {
        let m = Vec3::splat(margin);
        Aabb::new(self.p_min - m, self.p_max + m)
    }

    /// Transforms the box by `(t, r, s)` and returns the AABB of the 8
    /// transformed corners.
    ///
    /// This is *not* the minimal enclosing box of the rotated box: a rotated
    /// box may have a smaller true bounding volume than what's computed
    /// here, but recomputing the corners is the only way to stay
    /// conservative without doing a full OBB fit, which the rest of the
    /// pipeline doesn't need.
    pub fn apply_trs(&self, trs: &Trs) -> Aabb {
        let mut p_min = Vec3::splat(Number::INFINITY);
        let mut p_max = Vec3::splat(Number::NEG_INFINITY);
        for corner in self.corners() {
            let world = trs.transform_point(corner);
            p_min = p_min.min(world);
            p_max = p_max.max(world);
        }
        Aabb::new(p_min, p_max)
    }

    pub fn apply_scale(&self, scale: Diag3x3) -> Aabb {
        Aabb::new(scale.mul_vec(self.p_min), scale.mul_vec(self.p_max))
    }
}

impl Aabb {
    /// Sentinel for unbounded shapes (e.g. an infinite plane). Always
    /// returned as-is, never combined into a finite box by further
    /// transforms.
    pub const INFINITE: Aabb = Aabb {
        p_min: Vec3::splat(Number::NEG_INFINITY),
        p_max: Vec3::splat(Number::INFINITY),
    };

    pub fn is_infinite(&self) -> bool { *self == Self::INFINITE }
}

impl Default for Aabb {
    /// An empty box; the identity element of [`Aabb::union`].
    fn default() -> Self {
        Aabb {
            p_min: Vec3::splat(Number::INFINITY),
            p_max: Vec3::splat(Number::NEG_INFINITY),
        }
    }
}
