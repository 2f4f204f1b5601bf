//! Immutable half-edge representation of a convex polytope.
//!
//! # Invariants
//! - `half_edges[e].twin` is reciprocal: `half_edges[half_edges[e].twin].twin == e`.
//! - Following `.next` from any half-edge of face `f` returns to the start
//!   after visiting every half-edge of `f` exactly once.
//! - `half_edges[e].polygon` is the same value for every half-edge reachable
//!   by repeatedly following `.next` from `e`.

use crate::core::error::CoreError;
use crate::core::types::Vec3;
use crate::geom::plane::Plane;
use crate::geom::validate;
use std::collections::HashMap;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct HalfEdge {
    pub root_vertex: u32,
    pub next: u32,
    pub twin: u32,
    pub polygon: u32,
}

#[derive(Clone, Debug)]
pub struct HalfEdgeMesh {
    vertices: Vec<Vec3>,
    face_planes: Vec<Plane>,
    half_edges: Vec<HalfEdge>,
    /// One half-edge index per undirected edge (the lower-indexed of each twin pair).
    canonical_edges: Vec<u32>,
    /// First half-edge index of each face.
    face_first_edge: Vec<u32>,
}

impl HalfEdgeMesh {
    pub fn vertices(&self) -> &[Vec3] { &self.vertices }
    pub fn face_planes(&self) -> &[Plane] { &self.face_planes }
    pub fn half_edges(&self) -> &[HalfEdge] { &self.half_edges }
    pub fn canonical_edges(&self) -> &[u32] { &self.canonical_edges }
    pub fn face_first_edge(&self) -> &[u32] { &self.face_first_edge }

    pub fn num_faces(&self) -> usize { self.face_first_edge.len() }

    /// Vertex indices of face `f`, in winding order.
    pub fn face_vertices(&self, f: u32) -> Vec<u32> {
        let start = self.face_first_edge[f as usize];
        let mut out = Vec::new();
        let mut e = start;
        loop {
            out.push(self.half_edges[e as usize].root_vertex);
            e = self.half_edges[e as usize].next;
            if e == start {
                break;
            }
        }
        out
    }

    /// The support vertex of this mesh in world space, i.e. the vertex that
    /// maximizes `dir . vertex` given a world transform.
    pub fn support(&self, dir_local: Vec3) -> (u32, Vec3) {
        self.vertices
            .iter()
            .enumerate()
            .map(|(i, &v)| (i as u32, v))
            .max_by(|(_, a), (_, b)| dir_local.dot(*a).total_cmp(&dir_local.dot(*b)))
            .expect("hull must have at least one vertex")
    }

    /// Builds a half-edge mesh from a vertex list and a list of faces (each a
    /// CCW-wound list of vertex indices, normal pointing outward). This is
    /// the convenience path used by tests and by asset-import code external
    /// to this crate; it derives `next`/`twin`/`polygon`/face planes and
    /// validates the result.
    ///
    /// Returns `Err(CoreError::InvalidHalfEdgeMesh)` if `faces` doesn't
    /// describe a closed manifold (spec.md §7 category 2: caller-supplied
    /// mesh data is an external-collaborator input, not this module's own
    /// invariant, so it's recoverable rather than a panic).
    pub fn from_faces(vertices: Vec<Vec3>, faces: Vec<Vec<u32>>) -> Result<Self, CoreError> {
        for &v in &vertices {
            validate::vector3(v);
        }
        let mut half_edges = Vec::new();
        let mut face_first_edge = Vec::with_capacity(faces.len());
        let mut face_planes = Vec::with_capacity(faces.len());
        // (tail, head) -> half-edge index, to resolve twins.
        let mut directed: HashMap<(u32, u32), u32> = HashMap::new();

        for face_verts in &faces {
            let first = half_edges.len() as u32;
            face_first_edge.push(first);
            let n = face_verts.len();
            for i in 0..n {
                let root = face_verts[i];
                let head = face_verts[(i + 1) % n];
                let idx = half_edges.len() as u32;
                half_edges.push(HalfEdge {
                    root_vertex: root,
                    next: first + ((i as u32 + 1) % n as u32),
                    twin: u32::MAX, // patched below
                    polygon: face_first_edge.len() as u32 - 1,
                });
                directed.insert((root, head), idx);
            }

            let p0 = vertices[face_verts[0] as usize];
            let p1 = vertices[face_verts[1] as usize];
            let p2 = vertices[face_verts[2] as usize];
            let normal = (p1 - p0).cross(p2 - p0).normalize();
            face_planes.push(Plane::from_point_normal(p0, normal));
        }

        for i in 0..half_edges.len() {
            let (root, next_root) = {
                let he = half_edges[i];
                (he.root_vertex, half_edges[he.next as usize].root_vertex)
            };
            let twin = *directed.get(&(next_root, root)).ok_or(CoreError::InvalidHalfEdgeMesh {
                reason: "non-manifold face list: missing twin half-edge",
            })?;
            half_edges[i].twin = twin;
        }

        let mut canonical_edges = Vec::new();
        for (i, he) in half_edges.iter().enumerate() {
            if (i as u32) < he.twin {
                canonical_edges.push(i as u32);
            }
        }

        let mesh = Self {
            vertices,
            face_planes,
            half_edges,
            canonical_edges,
            face_first_edge,
        };
        mesh.debug_check_invariants();
        Ok(mesh)
    }

    #[cfg(debug_assertions)]
    fn debug_check_invariants(&self) {
        for (i, he) in self.half_edges.iter().enumerate() {
            let twin = &self.half_edges[he.twin as usize];
            assert_eq!(
                twin.twin, i as u32,
                "half-edge {i}'s twin's twin must be itself"
            );
        }
        for (f, &start) in self.face_first_edge.iter().enumerate() {
            let mut e = start;
            let mut count = 0usize;
            loop {
                assert_eq!(
                    self.half_edges[e as usize].polygon, f as u32,
                    "half-edge {e} on face loop starting at {start} has wrong polygon index"
                );
                e = self.half_edges[e as usize].next;
                count += 1;
                assert!(count <= self.half_edges.len(), "face {f} loop never returns to start");
                if e == start {
                    break;
                }
            }
        }
    }

    #[cfg(not(debug_assertions))]
    fn debug_check_invariants(&self) {}

    /// A unit cube centred on the origin, faces wound CCW when viewed from outside.
    ///
    /// The vertex/face lists are a fixed literal known to be manifold, so
    /// unlike [`Self::from_faces`]'s general contract this is infallible.
    pub fn unit_cube() -> Self {
        let v = |x: f64, y: f64, z: f64| Vec3::new(x, y, z) * 0.5;
        let vertices = vec![
            v(-1.0, -1.0, -1.0),
            v(1.0, -1.0, -1.0),
            v(1.0, 1.0, -1.0),
            v(-1.0, 1.0, -1.0),
            v(-1.0, -1.0, 1.0),
            v(1.0, -1.0, 1.0),
            v(1.0, 1.0, 1.0),
            v(-1.0, 1.0, 1.0),
        ];
        let faces = vec![
            vec![0, 3, 2, 1], // -z
            vec![4, 5, 6, 7], // +z
            vec![0, 1, 5, 4], // -y
            vec![2, 3, 7, 6], // +y
            vec![1, 2, 6, 5], // +x
            vec![0, 4, 7, 3], // -x
        ];
        Self::from_faces(vertices, faces).expect("unit cube literal is always a manifold")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cube_twin_pairing_is_reciprocal() {
        let cube = HalfEdgeMesh::unit_cube();
        for (i, he) in cube.half_edges().iter().enumerate() {
            assert_eq!(cube.half_edges()[he.twin as usize].twin, i as u32);
        }
    }

    #[test]
    fn cube_has_six_faces_and_twelve_edges() {
        let cube = HalfEdgeMesh::unit_cube();
        assert_eq!(cube.num_faces(), 6);
        assert_eq!(cube.canonical_edges().len(), 12);
    }

    #[test]
    fn cube_face_loops_have_four_vertices() {
        let cube = HalfEdgeMesh::unit_cube();
        for f in 0..cube.num_faces() as u32 {
            assert_eq!(cube.face_vertices(f).len(), 4);
        }
    }

    #[test]
    fn support_point_maximizes_direction() {
        let cube = HalfEdgeMesh::unit_cube();
        let (_, p) = cube.support(Vec3::new(1.0, 1.0, 1.0));
        assert_eq!(p, Vec3::new(0.5, 0.5, 0.5));
    }

    #[test]
    fn non_manifold_face_list_is_rejected_not_panicked() {
        // A single triangle has no twin for any of its edges.
        let vertices = vec![Vec3::new(0.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0), Vec3::new(0.0, 1.0, 0.0)];
        let faces = vec![vec![0, 1, 2]];
        let result = HalfEdgeMesh::from_faces(vertices, faces);
        assert!(matches!(result, Err(CoreError::InvalidHalfEdgeMesh { .. })));
    }
}
