//! Exact separating-axis tests and manifold construction for one primitive
//! pair (spec.md §4.D).
//!
//! Face and edge queries follow the standard "SAT with Minkowski-face Gauss
//! map" construction: the face query finds the best-separating face normal
//! on each hull, the edge query finds the best-separating cross product of
//! one edge from each hull restricted to edge pairs that actually bound a
//! face on the Minkowski difference.

use crate::core::types::Vec3;
use crate::geom::halfedge::HalfEdgeMesh;
use crate::geom::plane::Plane;
use crate::geom::transform::Trs;
use crate::narrowphase::manifold::{ContactPoint, Manifold};
use crate::object::primitive::Primitive;
use smallvec::SmallVec;

fn face_world_normal(trs: &Trs, mesh: &HalfEdgeMesh, face: u32) -> Vec3 {
    trs.transform_normal(mesh.face_planes()[face as usize].normal).normalize()
}

fn face_world_point(trs: &Trs, mesh: &HalfEdgeMesh, face: u32) -> Vec3 {
    let v0 = mesh.face_vertices(face)[0];
    trs.transform_point(mesh.vertices()[v0 as usize])
}

fn local_centroid(mesh: &HalfEdgeMesh) -> Vec3 {
    let verts = mesh.vertices();
    verts.iter().fold(Vec3::ZERO, |a, &b| a + b) / verts.len() as f64
}

fn hull_support(trs: &Trs, mesh: &HalfEdgeMesh, dir_world: Vec3) -> Vec3 {
    let dir_local = trs.inverse_transform_vector(dir_world);
    let (_, local_pt) = mesh.support(dir_local);
    trs.transform_point(local_pt)
}

/// The support point of any finite primitive in world-space direction `dir_world`.
pub fn support_world(trs: &Trs, shape: &Primitive, dir_world: Vec3) -> Vec3 {
    match shape {
        Primitive::Sphere { radius } => trs.pos() + dir_world.normalize() * *radius,
        Primitive::Hull(mesh) => hull_support(trs, mesh, dir_world),
        Primitive::Plane => unreachable!("plane has no finite support point"),
    }
}

pub struct FaceQuery {
    pub face: u32,
    pub separation: f64,
}

/// Finds the face of `mesh_self` with the largest separation against
/// whatever `other_support` returns for `-face_normal`. A positive
/// separation on the winning face means the two shapes don't overlap.
pub fn face_query(trs_self: &Trs, mesh_self: &HalfEdgeMesh, other_support: impl Fn(Vec3) -> Vec3) -> FaceQuery {
    let mut best = FaceQuery { face: 0, separation: f64::NEG_INFINITY };
    for f in 0..mesh_self.num_faces() as u32 {
        let normal = face_world_normal(trs_self, mesh_self, f);
        let point = face_world_point(trs_self, mesh_self, f);
        let support = other_support(-normal);
        let sep = normal.dot(support - point);
        if sep > best.separation {
            best = FaceQuery { face: f, separation: sep };
        }
    }
    best
}

pub struct EdgeQuery {
    pub edge_a: u32,
    pub edge_b: u32,
    pub separation: f64,
    pub normal: Vec3,
    pub point_a: Vec3,
}

/// Tests if edges `(a, b)` and `(c, d)` — given as the face normals
/// adjacent to each edge — bound a face on the Minkowski difference, i.e.
/// their great-circle arcs on the Gauss map actually cross.
fn is_minkowski_face(a: Vec3, b: Vec3, c: Vec3, d: Vec3) -> bool {
    let bxa = b.cross(a);
    let dxc = d.cross(c);
    let cba = c.dot(bxa);
    let dba = d.dot(bxa);
    let adc = a.dot(dxc);
    let bdc = b.dot(dxc);
    cba * dba < 0.0 && adc * bdc < 0.0 && cba * bdc > 0.0
}

/// Searches every canonical-edge pair `(a, b)` between the two hulls for
/// the one with the largest separation along `normalize(edgeA x edgeB)`.
pub fn edge_query(trs_a: &Trs, mesh_a: &HalfEdgeMesh, trs_b: &Trs, mesh_b: &HalfEdgeMesh) -> EdgeQuery {
    let center_a = trs_a.transform_point(local_centroid(mesh_a));
    let mut best = EdgeQuery {
        edge_a: 0,
        edge_b: 0,
        separation: f64::NEG_INFINITY,
        normal: Vec3::ZERO,
        point_a: Vec3::ZERO,
    };

    for &ea in mesh_a.canonical_edges() {
        let he_a = mesh_a.half_edges()[ea as usize];
        let twin_a = mesh_a.half_edges()[he_a.twin as usize];
        let a_n1 = face_world_normal(trs_a, mesh_a, he_a.polygon);
        let a_n2 = face_world_normal(trs_a, mesh_a, twin_a.polygon);
        let p1a = trs_a.transform_point(mesh_a.vertices()[he_a.root_vertex as usize]);
        let p2a = trs_a.transform_point(mesh_a.vertices()[twin_a.root_vertex as usize]);
        let edge_a_dir = p2a - p1a;

        for &eb in mesh_b.canonical_edges() {
            let he_b = mesh_b.half_edges()[eb as usize];
            let twin_b = mesh_b.half_edges()[he_b.twin as usize];
            let b_n1 = face_world_normal(trs_b, mesh_b, he_b.polygon);
            let b_n2 = face_world_normal(trs_b, mesh_b, twin_b.polygon);
            let p1b = trs_b.transform_point(mesh_b.vertices()[he_b.root_vertex as usize]);
            let p2b = trs_b.transform_point(mesh_b.vertices()[twin_b.root_vertex as usize]);
            let edge_b_dir = p2b - p1b;

            if !is_minkowski_face(a_n1, a_n2, -b_n1, -b_n2) {
                continue;
            }

            let cross = edge_a_dir.cross(edge_b_dir);
            if cross.length_squared() < 1e-10 {
                continue;
            }
            let mut normal = cross.normalize();
            if normal.dot(p1a - center_a) < 0.0 {
                normal = -normal;
            }
            let separation = normal.dot(p1b - p1a);
            if separation > best.separation {
                best = EdgeQuery {
                    edge_a: ea,
                    edge_b: eb,
                    separation,
                    normal,
                    point_a: p1a,
                };
            }
        }
    }
    best
}

/// Shortest segment between edge `a` (on `mesh_a`) and edge `b` (on
/// `mesh_b`), used to place the single contact point of an edge-edge
/// manifold at the midpoint of their closest approach.
fn edge_contact_point(
    trs_a: &Trs,
    mesh_a: &HalfEdgeMesh,
    edge_a: u32,
    trs_b: &Trs,
    mesh_b: &HalfEdgeMesh,
    edge_b: u32,
) -> Vec3 {
    let he_a = mesh_a.half_edges()[edge_a as usize];
    let twin_a = mesh_a.half_edges()[he_a.twin as usize];
    let p1 = trs_a.transform_point(mesh_a.vertices()[he_a.root_vertex as usize]);
    let d1 = trs_a.transform_point(mesh_a.vertices()[twin_a.root_vertex as usize]) - p1;

    let he_b = mesh_b.half_edges()[edge_b as usize];
    let twin_b = mesh_b.half_edges()[he_b.twin as usize];
    let p2 = trs_b.transform_point(mesh_b.vertices()[he_b.root_vertex as usize]);
    let d2 = trs_b.transform_point(mesh_b.vertices()[twin_b.root_vertex as usize]) - p2;

    // Standard closest-point-between-segments solve (Ericson, "Real-Time
    // Collision Detection" §5.1.9): minimize |p1 + s*d1 - p2 - t*d2|^2.
    let r = p1 - p2;
    let a = d1.length_squared();
    let e = d2.length_squared();
    let b = d1.dot(d2);
    let c = d1.dot(r);
    let f = d2.dot(r);
    let denom = a * e - b * b;

    let s = if denom.abs() > 1e-10 { ((b * f - c * e) / denom).clamp(0.0, 1.0) } else { 0.0 };
    let t = ((b * s + f) / e.max(1e-12)).clamp(0.0, 1.0);
    let closest1 = p1 + d1 * s;
    let closest2 = p2 + d2 * t;
    (closest1 + closest2) * 0.5
}

fn clip_polygon(input: &[Vec3], plane: &Plane) -> SmallVec<[Vec3; 16]> {
    let mut output: SmallVec<[Vec3; 16]> = SmallVec::new();
    if input.is_empty() {
        return output;
    }
    let n = input.len();
    for i in 0..n {
        let current = input[i];
        let next = input[(i + 1) % n];
        let cur_inside = plane.signed_distance(current) <= 0.0;
        let next_inside = plane.signed_distance(next) <= 0.0;
        if cur_inside {
            output.push(current);
        }
        if cur_inside != next_inside {
            output.push(plane.line_intersection(current, next));
        }
    }
    output
}

/// Reduces a clipped polygon down to at most 4 contact points by
/// maximizing enclosed area: keep the deepest point, the point farthest
/// from it, then the points maximizing signed area on each side of that
/// edge. Chosen candidates are removed from the working set with
/// `swap_remove` rather than filtered out, since point order in the
/// reduced manifold carries no meaning.
fn reduce_to_four(points: &mut SmallVec<[ContactPoint; 16]>, normal: Vec3) {
    if points.len() <= 4 {
        return;
    }
    let mut chosen: SmallVec<[ContactPoint; 4]> = SmallVec::new();

    let deepest_idx = points
        .iter()
        .enumerate()
        .max_by(|(_, a), (_, b)| a.penetration.total_cmp(&b.penetration))
        .map(|(i, _)| i)
        .expect("non-empty by caller");
    chosen.push(points.swap_remove(deepest_idx));

    let farthest_idx = points
        .iter()
        .enumerate()
        .max_by(|(_, a), (_, b)| {
            a.position
                .distance_squared(chosen[0].position)
                .total_cmp(&b.position.distance_squared(chosen[0].position))
        })
        .map(|(i, _)| i)
        .expect("at least one point remains after taking the deepest");
    chosen.push(points.swap_remove(farthest_idx));

    let edge = chosen[1].position - chosen[0].position;
    let signed_area = |p: Vec3| edge.cross(p - chosen[0].position).dot(normal);

    if !points.is_empty() {
        let idx = points
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| signed_area(a.position).total_cmp(&signed_area(b.position)))
            .map(|(i, _)| i)
            .expect("checked non-empty");
        chosen.push(points.swap_remove(idx));
    }
    if !points.is_empty() {
        let idx = points
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| signed_area(a.position).total_cmp(&signed_area(b.position)))
            .map(|(i, _)| i)
            .expect("checked non-empty");
        chosen.push(points.swap_remove(idx));
    }

    *points = chosen.into_iter().collect();
}

fn face_contact_manifold(trs_ref: &Trs, mesh_ref: &HalfEdgeMesh, ref_face: u32, trs_inc: &Trs, mesh_inc: &HalfEdgeMesh) -> Manifold {
    let ref_normal = face_world_normal(trs_ref, mesh_ref, ref_face);
    let ref_point = face_world_point(trs_ref, mesh_ref, ref_face);
    let ref_plane = Plane::from_point_normal(ref_point, ref_normal);

    let incident_face = (0..mesh_inc.num_faces() as u32)
        .min_by(|&f1, &f2| {
            let n1 = face_world_normal(trs_inc, mesh_inc, f1).dot(ref_normal);
            let n2 = face_world_normal(trs_inc, mesh_inc, f2).dot(ref_normal);
            n1.total_cmp(&n2)
        })
        .expect("hull must have at least one face");

    let mut polygon: SmallVec<[Vec3; 16]> = mesh_inc
        .face_vertices(incident_face)
        .into_iter()
        .map(|v| trs_inc.transform_point(mesh_inc.vertices()[v as usize]))
        .collect();

    let ref_verts = mesh_ref.face_vertices(ref_face);
    let n = ref_verts.len();
    for i in 0..n {
        let a = trs_ref.transform_point(mesh_ref.vertices()[ref_verts[i] as usize]);
        let b = trs_ref.transform_point(mesh_ref.vertices()[ref_verts[(i + 1) % n] as usize]);
        let edge_dir = (b - a).normalize();
        let side_normal = edge_dir.cross(ref_normal);
        let side_plane = Plane::from_point_normal(a, side_normal);
        let slice: Vec<Vec3> = polygon.into_iter().collect();
        polygon = clip_polygon(&slice, &side_plane);
        if polygon.is_empty() {
            break;
        }
    }

    let mut points: SmallVec<[ContactPoint; 16]> = polygon
        .into_iter()
        .filter_map(|p| {
            let sep = ref_plane.signed_distance(p);
            (sep < 0.0).then_some(ContactPoint { position: p, penetration: -sep })
        })
        .collect();

    reduce_to_four(&mut points, ref_normal);

    Manifold {
        normal: ref_normal,
        points: points.into_iter().collect(),
    }
}

fn edge_contact_manifold(query: &EdgeQuery, mesh_a: &HalfEdgeMesh, trs_a: &Trs, mesh_b: &HalfEdgeMesh, trs_b: &Trs) -> Manifold {
    let point = edge_contact_point(trs_a, mesh_a, query.edge_a, trs_b, mesh_b, query.edge_b);
    Manifold::single(query.normal, point, -query.separation)
}

/// Full hull-hull SAT: face query on each hull, then an edge query,
/// favoring face contacts within a small bias to avoid edge contacts
/// winning on float noise for flush resting contacts.
pub fn hull_hull(trs_a: &Trs, mesh_a: &HalfEdgeMesh, trs_b: &Trs, mesh_b: &HalfEdgeMesh) -> Option<Manifold> {
    let query_a = face_query(trs_a, mesh_a, |dir| hull_support(trs_b, mesh_b, dir));
    if query_a.separation > 0.0 {
        return None;
    }
    let query_b = face_query(trs_b, mesh_b, |dir| hull_support(trs_a, mesh_a, dir));
    if query_b.separation > 0.0 {
        return None;
    }
    let edge_q = edge_query(trs_a, mesh_a, trs_b, mesh_b);
    if edge_q.separation > 0.0 {
        return None;
    }

    const FACE_BIAS: f64 = 1e-3;
    let best_face_sep = query_a.separation.max(query_b.separation);

    if edge_q.separation > best_face_sep + FACE_BIAS {
        Some(edge_contact_manifold(&edge_q, mesh_a, trs_a, mesh_b, trs_b))
    } else if query_a.separation >= query_b.separation {
        Some(face_contact_manifold(trs_a, mesh_a, query_a.face, trs_b, mesh_b))
    } else {
        Some(face_contact_manifold(trs_b, mesh_b, query_b.face, trs_a, mesh_a).flipped())
    }
}

/// A plane primitive carries no parameters of its own; its world plane is
/// its entity's local `+Z` axis carried through the entity's transform.
pub fn hull_plane(trs_hull: &Trs, mesh: &HalfEdgeMesh, trs_plane: &Trs) -> Option<Manifold> {
    let normal = trs_plane.transform_normal(Vec3::Z).normalize();
    let plane = Plane::from_point_normal(trs_plane.pos(), normal);

    let mut points: SmallVec<[ContactPoint; 16]> = SmallVec::new();
    for v in mesh.vertices() {
        let world = trs_hull.transform_point(*v);
        let sep = plane.signed_distance(world);
        if sep < 0.0 {
            points.push(ContactPoint { position: world, penetration: -sep });
        }
    }
    if points.is_empty() {
        return None;
    }
    reduce_to_four(&mut points, normal);
    Some(Manifold {
        normal,
        points: points.into_iter().collect(),
    })
}

pub fn sphere_sphere(trs_a: &Trs, radius_a: f64, trs_b: &Trs, radius_b: f64) -> Option<Manifold> {
    let delta = trs_b.pos() - trs_a.pos();
    let dist_sq = delta.length_squared();
    let radius_sum = radius_a + radius_b;
    if dist_sq >= radius_sum * radius_sum {
        return None;
    }
    let dist = dist_sq.sqrt();
    let normal = if dist > 1e-9 { delta / dist } else { Vec3::Z };
    let penetration = radius_sum - dist;
    let point = trs_a.pos() + normal * radius_a;
    Some(Manifold::single(normal, point, penetration))
}

pub fn sphere_plane(trs_sphere: &Trs, radius: f64, trs_plane: &Trs) -> Option<Manifold> {
    let normal = trs_plane.transform_normal(Vec3::Z).normalize();
    let plane = Plane::from_point_normal(trs_plane.pos(), normal);
    let center = trs_sphere.pos();
    let sep = plane.signed_distance(center) - radius;
    if sep > 0.0 {
        return None;
    }
    let contact_point = center - normal * radius;
    Some(Manifold::single(normal, contact_point, -sep))
}

/// Closest point on face `face`'s polygon (in world space) to `point`.
/// Convex-polygon approximation: projects onto the face plane, then
/// clamps to the first edge whose outward half-plane the projection
/// falls outside of. Exact for points near an edge's interior; near a
/// corner it can return that edge's endpoint rather than the true
/// nearest corner a full two-edge clamp would find.
fn closest_point_on_polygon(trs: &Trs, mesh: &HalfEdgeMesh, face: u32, point: Vec3) -> Vec3 {
    let verts: Vec<Vec3> = mesh
        .face_vertices(face)
        .into_iter()
        .map(|v| trs.transform_point(mesh.vertices()[v as usize]))
        .collect();
    let normal = face_world_normal(trs, mesh, face);
    let plane_point = verts[0];
    let projected = point - normal * (point - plane_point).dot(normal);

    let n = verts.len();
    for i in 0..n {
        let a = verts[i];
        let b = verts[(i + 1) % n];
        let edge_dir = b - a;
        let edge_normal = edge_dir.cross(normal);
        if edge_normal.dot(projected - a) < 0.0 {
            let t = (projected - a).dot(edge_dir) / edge_dir.length_squared().max(1e-12);
            return a + edge_dir * t.clamp(0.0, 1.0);
        }
    }
    projected
}

pub fn sphere_hull(trs_sphere: &Trs, radius: f64, trs_hull: &Trs, mesh: &HalfEdgeMesh) -> Option<Manifold> {
    let center = trs_sphere.pos();

    let mut best_face = 0u32;
    let mut best_sep = f64::NEG_INFINITY;
    for f in 0..mesh.num_faces() as u32 {
        let normal = face_world_normal(trs_hull, mesh, f);
        let point = face_world_point(trs_hull, mesh, f);
        let sep = normal.dot(center - point);
        if sep > best_sep {
            best_sep = sep;
            best_face = f;
        }
    }

    if best_sep > radius {
        return None;
    }

    let closest = closest_point_on_polygon(trs_hull, mesh, best_face, center);
    let delta = center - closest;
    let dist = delta.length();
    if dist > radius {
        return None;
    }
    let fallback_normal = face_world_normal(trs_hull, mesh, best_face);
    let normal = if dist > 1e-9 { delta / dist } else { fallback_normal };
    let penetration = radius - dist;
    Some(Manifold::single(normal, closest, penetration))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::transform::Diag3x3;
    use approx::assert_relative_eq;

    fn identity(pos: Vec3) -> Trs { Trs::new(pos, glam::DQuat::IDENTITY, Diag3x3::IDENTITY) }

    #[test]
    fn sphere_sphere_overlap_reports_correct_penetration() {
        let a = identity(Vec3::ZERO);
        let b = identity(Vec3::new(1.5, 0.0, 0.0));
        let m = sphere_sphere(&a, 1.0, &b, 1.0).expect("spheres overlap");
        assert_relative_eq!(m.points[0].penetration, 0.5, epsilon = 1e-9);
        assert_relative_eq!(m.normal.x, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn sphere_sphere_separated_reports_none() {
        let a = identity(Vec3::ZERO);
        let b = identity(Vec3::new(5.0, 0.0, 0.0));
        assert!(sphere_sphere(&a, 1.0, &b, 1.0).is_none());
    }

    #[test]
    fn sphere_plane_resting_on_plane_has_zero_penetration() {
        let sphere = identity(Vec3::new(0.0, 0.0, 1.0));
        let plane = identity(Vec3::ZERO);
        let m = sphere_plane(&sphere, 1.0, &plane).expect("sphere touches plane");
        assert_relative_eq!(m.points[0].penetration, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn stacked_cubes_produce_four_point_face_manifold() {
        let bottom = identity(Vec3::ZERO);
        let top = identity(Vec3::new(0.0, 0.0, 0.9));
        let cube = HalfEdgeMesh::unit_cube();
        let m = hull_hull(&bottom, &cube, &top, &cube).expect("cubes overlap");
        assert_eq!(m.points.len(), 4);
        for p in &m.points {
            assert_relative_eq!(p.penetration, 0.1, epsilon = 1e-6);
        }
    }

    #[test]
    fn separated_cubes_produce_no_manifold() {
        let a = identity(Vec3::ZERO);
        let b = identity(Vec3::new(5.0, 0.0, 0.0));
        let cube = HalfEdgeMesh::unit_cube();
        assert!(hull_hull(&a, &cube, &b, &cube).is_none());
    }

    #[test]
    fn hull_plane_resting_cube_has_four_contacts_at_zero_penetration() {
        let cube_trs = identity(Vec3::new(0.0, 0.0, 0.5));
        let plane_trs = identity(Vec3::ZERO);
        let cube = HalfEdgeMesh::unit_cube();
        let m = hull_plane(&cube_trs, &cube, &plane_trs).expect("cube rests on plane");
        assert_eq!(m.points.len(), 4);
    }

    /// spec.md §8 "SAT symmetry": `hull_hull(A, B)` and `hull_hull(B, A)` must
    /// agree on point count and penetration depths, with the normal negated.
    #[test]
    fn hull_hull_is_symmetric_under_argument_swap() {
        let a = identity(Vec3::ZERO);
        let b = Trs::new(Vec3::new(0.3, 0.0, 0.9), glam::DQuat::from_rotation_z(0.2), Diag3x3::IDENTITY);
        let cube = HalfEdgeMesh::unit_cube();

        let forward = hull_hull(&a, &cube, &b, &cube).expect("cubes overlap");
        let backward = hull_hull(&b, &cube, &a, &cube).expect("swapped pair still overlaps");

        assert_eq!(forward.points.len(), backward.points.len());
        assert_relative_eq!(
            (forward.normal + backward.normal).length(),
            0.0,
            epsilon = 1e-4
        );
        let mut forward_pens: Vec<f64> = forward.points.iter().map(|p| p.penetration).collect();
        let mut backward_pens: Vec<f64> = backward.points.iter().map(|p| p.penetration).collect();
        forward_pens.sort_by(|x, y| x.total_cmp(y));
        backward_pens.sort_by(|x, y| x.total_cmp(y));
        for (fp, bp) in forward_pens.iter().zip(backward_pens.iter()) {
            assert_relative_eq!(fp, bp, epsilon = 1e-4);
        }
    }
}
