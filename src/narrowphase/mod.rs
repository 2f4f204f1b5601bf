//! Exact narrow-phase contact generation (spec.md §4.D).
//!
//! Candidate pairs from the broad-phase still need an AABB gate and exact
//! SAT before they can become a [`Manifold`]: a broad-phase hit only means
//! the fattened leaf boxes overlapped, not that the primitives inside them
//! do.

pub mod manifold;
pub mod sat;

pub use manifold::{ContactBuffer, ContactConstraint, ContactPoint, Manifold};

use crate::core::targets::NARROWPHASE;
use crate::entity::EntityId;
use crate::geom::transform::Trs;
use crate::geom::Aabb;
use crate::object::primitive::{Kind, Primitive};
use tracing::error;

/// Skips primitive pairs whose world-space AABBs don't actually touch,
/// cheaper than running SAT on a pair the broad-phase only approximately matched.
pub fn aabb_gate(a_world: Aabb, b_world: Aabb) -> bool { a_world.overlaps(&b_world) }

/// Tests one primitive pair and returns a manifold if they touch.
///
/// Internally reorders the pair to the canonical `Sphere < Hull < Plane`
/// dispatch order (spec.md §4.D) and flips the resulting normal back to
/// the caller's original `(shape_a, shape_b)` convention if it had to
/// swap. `Plane`-`Plane` has no finite separating axis and is a
/// configuration error rather than a case with a sensible outcome.
pub fn test_primitive_pair(trs_a: &Trs, shape_a: &Primitive, trs_b: &Trs, shape_b: &Primitive) -> Option<Manifold> {
    let swapped = shape_a.kind() > shape_b.kind();
    let (lo_trs, lo_shape, hi_trs, hi_shape) = if swapped { (trs_b, shape_b, trs_a, shape_a) } else { (trs_a, shape_a, trs_b, shape_b) };

    let manifold = match (lo_shape.kind(), hi_shape.kind()) {
        (Kind::Sphere, Kind::Sphere) => sat::sphere_sphere(lo_trs, sphere_radius(lo_shape), hi_trs, sphere_radius(hi_shape)),
        (Kind::Sphere, Kind::Hull) => sat::sphere_hull(lo_trs, sphere_radius(lo_shape), hi_trs, hull_mesh(hi_shape)),
        (Kind::Sphere, Kind::Plane) => sat::sphere_plane(lo_trs, sphere_radius(lo_shape), hi_trs),
        (Kind::Hull, Kind::Hull) => sat::hull_hull(lo_trs, hull_mesh(lo_shape), hi_trs, hull_mesh(hi_shape)),
        (Kind::Hull, Kind::Plane) => sat::hull_plane(lo_trs, hull_mesh(lo_shape), hi_trs),
        (Kind::Plane, Kind::Plane) => panic!("plane-plane collision pair has no finite separating axis"),
        _ => unreachable!("canonical order guarantees lo.kind() <= hi.kind()"),
    };

    manifold.map(|m| if swapped { m.flipped() } else { m })
}

/// Tests every primitive pair between two objects and appends every
/// resulting contact into `buffer`, tagged with the owning entities.
/// Panics if the buffer is already full (spec.md §4.D: contact overflow
/// is fatal, unlike broad-phase candidate overflow).
pub fn generate_contacts(
    entity_a: EntityId,
    trs_a: &Trs,
    primitives_a: &[crate::object::primitive::CollisionPrimitive],
    entity_b: EntityId,
    trs_b: &Trs,
    primitives_b: &[crate::object::primitive::CollisionPrimitive],
    buffer: &ContactBuffer,
) {
    for pa in primitives_a {
        let world_a = pa.local_aabb.apply_trs(trs_a);
        for pb in primitives_b {
            let world_b = pb.local_aabb.apply_trs(trs_b);
            if !aabb_gate(world_a, world_b) {
                continue;
            }
            if let Some(manifold) = test_primitive_pair(trs_a, &pa.shape, trs_b, &pb.shape) {
                let contact = ContactConstraint { entity_a, entity_b, manifold };
                if !buffer.push(contact) {
                    error!(target: NARROWPHASE, capacity = buffer.capacity(), "contact buffer overflow");
                    panic!("contact buffer overflow: exceeded capacity {}", buffer.capacity());
                }
            }
        }
    }
}

fn sphere_radius(p: &Primitive) -> f64 {
    match p {
        Primitive::Sphere { radius } => *radius,
        _ => unreachable!("sphere_radius called on non-sphere primitive"),
    }
}

fn hull_mesh(p: &Primitive) -> &crate::geom::halfedge::HalfEdgeMesh {
    match p {
        Primitive::Hull(mesh) => mesh,
        _ => unreachable!("hull_mesh called on non-hull primitive"),
    }
}
