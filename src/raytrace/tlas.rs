//! Top-level acceleration structure: one quantized BVH over instance
//! world-space bounds (spec.md §4.E, "TLAS").

use crate::bvh::Qbvh;
use crate::core::types::Vec3;
use crate::geom::Aabb;
use crate::raytrace::instance::{instance_local_ray, Instance};
use crate::raytrace::mesh::TriangleMesh;
use crate::raytrace::ray::{traverse_qbvh_ray, Ray};
use crate::raytrace::shade::Material;

/// A resolved ray hit against the scene: world-space `t` and normal, the
/// hit material, and the UV to shade it at.
#[derive(Copy, Clone, Debug)]
pub struct Hit {
    pub t: f64,
    pub normal: Vec3,
    pub instance: u32,
    pub material: Material,
    pub uv: [f32; 2],
}

#[derive(Clone, Debug)]
pub struct Tlas {
    instances: Vec<Instance>,
    meshes: Vec<TriangleMesh>,
    bvh: Qbvh,
}

impl Tlas {
    pub fn build(instances: Vec<Instance>, meshes: Vec<TriangleMesh>) -> Self {
        let bounds: Vec<Aabb> = instances
            .iter()
            .map(|inst| meshes[inst.mesh_index as usize].local_aabb().apply_trs(&inst.transform))
            .collect();
        let bvh = Qbvh::build(&bounds);
        Self { instances, meshes, bvh }
    }

    pub fn instances(&self) -> &[Instance] { &self.instances }

    /// Traces one ray through the whole two-level structure: the TLAS
    /// query walks world-space instance bounds; each candidate instance
    /// transforms the ray into its own local space (with `t_scale`
    /// correction, spec.md §4.E) before querying its mesh's BLAS.
    pub fn trace(&self, ray: &Ray, t_max: f64) -> Option<Hit> {
        let mut best: Option<Hit> = None;
        traverse_qbvh_ray(&self.bvh, ray, t_max, |leaf, current_t_max| {
            let inst = &self.instances[leaf as usize];
            if inst.transform.scale().is_all_zero() {
                return None;
            }
            let mesh = &self.meshes[inst.mesh_index as usize];
            let (local_ray, t_scale) = instance_local_ray(ray, &inst.transform);
            let local_t_max = current_t_max * t_scale;
            let tri_hit = mesh.intersect(&local_ray, local_t_max)?;
            let t_world = tri_hit.t / t_scale;
            if t_world >= current_t_max {
                return None;
            }
            let local_normal = mesh.normal(tri_hit.triangle);
            let normal = inst.transform.transform_normal(local_normal).normalize();
            let uv = mesh.interpolate_uv(tri_hit.triangle, tri_hit.u, tri_hit.v);
            best = Some(Hit {
                t: t_world,
                normal,
                instance: leaf,
                material: inst.material,
                uv,
            });
            Some(t_world)
        });
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::transform::{Diag3x3, Trs};

    fn quad_mesh() -> TriangleMesh {
        TriangleMesh::new(
            vec![
                Vec3::new(-1.0, -1.0, 0.0),
                Vec3::new(1.0, -1.0, 0.0),
                Vec3::new(1.0, 1.0, 0.0),
                Vec3::new(-1.0, 1.0, 0.0),
            ],
            vec![[0, 1, 2], [0, 2, 3]],
            None,
        )
    }

    #[test]
    fn ray_hits_instance_placed_away_from_origin() {
        let instances = vec![Instance {
            transform: Trs::new(Vec3::new(0.0, 0.0, 5.0), glam::DQuat::IDENTITY, Diag3x3::IDENTITY),
            mesh_index: 0,
            material: Material::flat([1.0, 0.0, 0.0]),
        }];
        let tlas = Tlas::build(instances, vec![quad_mesh()]);
        let ray = Ray::new(Vec3::ZERO, Vec3::Z);
        let hit = tlas.trace(&ray, f64::INFINITY).expect("ray crosses instance");
        assert!((hit.t - 5.0).abs() < 1e-6);
    }

    #[test]
    fn ray_missing_every_instance_reports_none() {
        let instances = vec![Instance {
            transform: Trs::new(Vec3::new(100.0, 100.0, 100.0), glam::DQuat::IDENTITY, Diag3x3::IDENTITY),
            mesh_index: 0,
            material: Material::flat([1.0, 0.0, 0.0]),
        }];
        let tlas = Tlas::build(instances, vec![quad_mesh()]);
        let ray = Ray::new(Vec3::ZERO, Vec3::Z);
        assert!(tlas.trace(&ray, f64::INFINITY).is_none());
    }

    #[test]
    fn scaled_instance_reports_correct_world_t() {
        let instances = vec![Instance {
            transform: Trs::new(Vec3::new(0.0, 0.0, 10.0), glam::DQuat::IDENTITY, Diag3x3::new(Vec3::splat(3.0))),
            mesh_index: 0,
            material: Material::flat([1.0, 1.0, 1.0]),
        }];
        let tlas = Tlas::build(instances, vec![quad_mesh()]);
        let ray = Ray::new(Vec3::ZERO, Vec3::Z);
        let hit = tlas.trace(&ray, f64::INFINITY).expect("scaled quad still spans the ray");
        assert!((hit.t - 10.0).abs() < 1e-6);
    }

    #[test]
    fn zero_scale_instance_is_skipped_even_when_directly_on_the_ray() {
        // Both instance centers sit exactly on one ray line, at t = sqrt(11)
        // and t = 2*sqrt(11), so the zero-scale instance's degenerate (point)
        // bound is still traversed into before being skipped.
        let instances = vec![
            Instance {
                transform: Trs::new(Vec3::new(1.0, 1.0, 3.0), glam::DQuat::IDENTITY, Diag3x3::new(Vec3::ZERO)),
                mesh_index: 0,
                material: Material::flat([1.0, 0.0, 0.0]),
            },
            Instance {
                transform: Trs::new(Vec3::new(2.0, 2.0, 6.0), glam::DQuat::IDENTITY, Diag3x3::IDENTITY),
                mesh_index: 0,
                material: Material::flat([0.0, 1.0, 0.0]),
            },
        ];
        let tlas = Tlas::build(instances, vec![quad_mesh()]);
        let dir = Vec3::new(1.0, 1.0, 3.0).normalize();
        let ray = Ray::new(Vec3::ZERO, dir);
        let hit = tlas
            .trace(&ray, f64::INFINITY)
            .expect("the identity-scale instance behind the zero-scale one is still hit");
        assert!((hit.instance - 1).abs() == 0, "the zero-scale instance must never be reported as the hit");
        assert!((hit.t - 2.0 * 11f64.sqrt()).abs() < 1e-6);
    }
}
