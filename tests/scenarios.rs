//! End-to-end scenarios spanning broad-phase, narrow-phase, and ray
//! tracing together, as opposed to the per-module unit tests colocated
//! with their implementations.

use glam::DQuat;
use rb_collide_core::broadphase::{BroadPhase, LeafInput};
use rb_collide_core::core::config::WorldConfig;
use rb_collide_core::entity::ResponseType;
use rb_collide_core::geom::halfedge::HalfEdgeMesh;
use rb_collide_core::geom::transform::{Diag3x3, Trs};
use rb_collide_core::geom::Aabb;
use rb_collide_core::narrowphase::test_primitive_pair;
use rb_collide_core::object::primitive::Primitive;

fn identity(pos: glam::DVec3) -> Trs { Trs::new(pos, DQuat::IDENTITY, Diag3x3::IDENTITY) }

#[test]
fn sphere_sphere_contact_has_correct_normal_and_penetration() {
    let a = identity(glam::DVec3::ZERO);
    let b = identity(glam::DVec3::new(1.8, 0.0, 0.0));
    let manifold = test_primitive_pair(&a, &Primitive::Sphere { radius: 1.0 }, &b, &Primitive::Sphere { radius: 1.0 })
        .expect("overlapping spheres must produce a manifold");
    assert_eq!(manifold.points.len(), 1);
    assert!((manifold.points[0].penetration - 0.2).abs() < 1e-9);
    assert!(manifold.normal.x > 0.0);
}

#[test]
fn sphere_resting_on_plane_has_zero_penetration_contact() {
    let sphere = identity(glam::DVec3::new(0.0, 0.0, 1.0));
    let plane = identity(glam::DVec3::ZERO);
    let manifold = test_primitive_pair(&sphere, &Primitive::Sphere { radius: 1.0 }, &plane, &Primitive::Plane)
        .expect("sphere touching the plane must produce a manifold");
    assert!(manifold.points[0].penetration.abs() < 1e-9);
}

#[test]
fn stacked_cubes_produce_a_flush_four_point_face_manifold() {
    let cube = HalfEdgeMesh::unit_cube();
    let bottom = identity(glam::DVec3::ZERO);
    let top = identity(glam::DVec3::new(0.0, 0.0, 0.95));
    let manifold =
        test_primitive_pair(&bottom, &Primitive::Hull(cube.clone()), &top, &Primitive::Hull(cube)).expect("cubes overlap by 0.05");
    assert_eq!(manifold.points.len(), 4);
    for p in &manifold.points {
        assert!((p.penetration - 0.05).abs() < 1e-6);
    }
}

#[test]
fn rotated_cube_on_cube_edge_contact_resolves_to_one_point() {
    let cube = HalfEdgeMesh::unit_cube();
    let bottom = identity(glam::DVec3::ZERO);
    // A cube rotated 45 degrees about X, balanced corner-down, touches the
    // bottom cube edge-to-edge rather than face-to-face.
    let top_rot = DQuat::from_rotation_x(std::f64::consts::FRAC_PI_4) * DQuat::from_rotation_z(std::f64::consts::FRAC_PI_4);
    let top_height = 0.5 + (0.5 * 3f64.sqrt()) - 0.02;
    let top = Trs::new(glam::DVec3::new(0.0, 0.0, top_height), top_rot, Diag3x3::IDENTITY);
    let manifold = test_primitive_pair(&bottom, &Primitive::Hull(cube.clone()), &top, &Primitive::Hull(cube));
    assert!(manifold.is_some(), "rotated cube corner must penetrate the bottom cube slightly");
}

#[test]
fn separated_hulls_produce_no_manifold() {
    let cube = HalfEdgeMesh::unit_cube();
    let a = identity(glam::DVec3::ZERO);
    let b = identity(glam::DVec3::new(10.0, 0.0, 0.0));
    assert!(test_primitive_pair(&a, &Primitive::Hull(cube.clone()), &b, &Primitive::Hull(cube)).is_none());
}

#[test]
fn broadphase_grid_of_one_thousand_spheres_emits_only_true_neighbours() {
    let mut bp = BroadPhase::new();
    let spacing = 3.0;
    let radius = 1.0;
    let mut leaves = Vec::new();
    for x in 0..10 {
        for y in 0..10 {
            for z in 0..10 {
                let centre = glam::DVec3::new(x as f64 * spacing, y as f64 * spacing, z as f64 * spacing);
                leaves.push(LeafInput {
                    aabb: Aabb::new(centre - glam::DVec3::splat(radius), centre + glam::DVec3::splat(radius)),
                    response_type: ResponseType::Dynamic,
                });
            }
        }
    }
    let mut config = WorldConfig::default();
    config.max_candidates = 100_000;
    let output = bp.update(&leaves, &config);
    // Spacing (3.0) exceeds the combined sphere diameters (2.0), so no
    // broad-phase pair should ever form in a regular grid this sparse.
    assert!(output.pairs.is_empty());
    assert_eq!(output.overflowed, 0);
}

#[test]
fn broadphase_then_narrowphase_agree_on_touching_spheres() {
    let mut bp = BroadPhase::new();
    let a_pos = glam::DVec3::ZERO;
    let b_pos = glam::DVec3::new(1.9, 0.0, 0.0);
    let leaves = vec![
        LeafInput {
            aabb: Aabb::new(a_pos - glam::DVec3::splat(1.0), a_pos + glam::DVec3::splat(1.0)),
            response_type: ResponseType::Dynamic,
        },
        LeafInput {
            aabb: Aabb::new(b_pos - glam::DVec3::splat(1.0), b_pos + glam::DVec3::splat(1.0)),
            response_type: ResponseType::Dynamic,
        },
    ];
    let output = bp.update(&leaves, &WorldConfig::default());
    assert_eq!(output.pairs.len(), 1);

    let manifold = test_primitive_pair(
        &identity(a_pos),
        &Primitive::Sphere { radius: 1.0 },
        &identity(b_pos),
        &Primitive::Sphere { radius: 1.0 },
    );
    assert!(manifold.is_some());
}
