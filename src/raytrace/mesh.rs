//! Bottom-level acceleration structure: one quantized BVH over a single
//! triangle mesh's triangles (spec.md §4.E, "BLAS").

use crate::bvh::Qbvh;
use crate::core::types::Vec3;
use crate::geom::Aabb;
use crate::raytrace::ray::{traverse_qbvh_ray, Ray};

#[derive(Copy, Clone, Debug)]
pub struct TriangleHit {
    pub t: f64,
    /// Barycentric coordinates of the hit point relative to vertices 1 and 2.
    pub u: f64,
    pub v: f64,
    pub triangle: u32,
}

#[derive(Clone, Debug)]
pub struct TriangleMesh {
    positions: Vec<Vec3>,
    indices: Vec<[u32; 3]>,
    uvs: Option<Vec<[f32; 2]>>,
    bvh: Qbvh,
    local_aabb: Aabb,
}

impl TriangleMesh {
    pub fn new(positions: Vec<Vec3>, indices: Vec<[u32; 3]>, uvs: Option<Vec<[f32; 2]>>) -> Self {
        let bounds: Vec<Aabb> = indices
            .iter()
            .map(|tri| {
                let a = positions[tri[0] as usize];
                let b = positions[tri[1] as usize];
                let c = positions[tri[2] as usize];
                Aabb::encompass_points_slice(&[a, b, c])
            })
            .collect();
        let local_aabb = Aabb::encompass_points_slice(&positions);
        let bvh = Qbvh::build(&bounds);
        Self {
            positions,
            indices,
            uvs,
            bvh,
            local_aabb,
        }
    }

    pub fn local_aabb(&self) -> Aabb { self.local_aabb }

    pub fn normal(&self, triangle: u32) -> Vec3 {
        let tri = self.indices[triangle as usize];
        let a = self.positions[tri[0] as usize];
        let b = self.positions[tri[1] as usize];
        let c = self.positions[tri[2] as usize];
        (b - a).cross(c - a).normalize()
    }

    /// Interpolated UV at barycentric `(u, v)` on `triangle`; `[0.5, 0.5]`
    /// if the mesh carries no UV channel.
    pub fn interpolate_uv(&self, triangle: u32, u: f64, v: f64) -> [f32; 2] {
        let Some(uvs) = &self.uvs else { return [0.5, 0.5] };
        let tri = self.indices[triangle as usize];
        let uv0 = uvs[tri[0] as usize];
        let uv1 = uvs[tri[1] as usize];
        let uv2 = uvs[tri[2] as usize];
        let w = (1.0 - u - v) as f32;
        [w * uv0[0] + u as f32 * uv1[0] + v as f32 * uv2[0], w * uv0[1] + u as f32 * uv1[1] + v as f32 * uv2[1]]
    }

    pub fn intersect(&self, ray: &Ray, t_max: f64) -> Option<TriangleHit> {
        let mut best: Option<TriangleHit> = None;
        traverse_qbvh_ray(&self.bvh, ray, t_max, |leaf, current_t_max| {
            let tri = self.indices[leaf as usize];
            let a = self.positions[tri[0] as usize];
            let b = self.positions[tri[1] as usize];
            let c = self.positions[tri[2] as usize];
            let (t, u, v) = intersect_triangle(ray, a, b, c)?;
            if t >= current_t_max {
                return None;
            }
            best = Some(TriangleHit { t, u, v, triangle: leaf });
            Some(t)
        });
        best
    }
}

/// Möller-Trumbore ray-triangle intersection.
fn intersect_triangle(ray: &Ray, a: Vec3, b: Vec3, c: Vec3) -> Option<(f64, f64, f64)> {
    const EPS: f64 = 1e-9;
    let edge1 = b - a;
    let edge2 = c - a;
    let pvec = ray.dir.cross(edge2);
    let det = edge1.dot(pvec);
    if det.abs() < EPS {
        return None;
    }
    let inv_det = 1.0 / det;
    let tvec = ray.origin - a;
    let u = tvec.dot(pvec) * inv_det;
    if !(0.0..=1.0).contains(&u) {
        return None;
    }
    let qvec = tvec.cross(edge1);
    let v = ray.dir.dot(qvec) * inv_det;
    if v < 0.0 || u + v > 1.0 {
        return None;
    }
    let t = edge2.dot(qvec) * inv_det;
    if t <= EPS {
        return None;
    }
    Some((t, u, v))
}
