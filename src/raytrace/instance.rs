//! A TLAS leaf: one placement of a mesh in the scene (spec.md §4.E).

use crate::geom::transform::Trs;
use crate::raytrace::ray::Ray;
use crate::raytrace::shade::Material;

#[derive(Clone, Debug)]
pub struct Instance {
    pub transform: Trs,
    pub mesh_index: u32,
    pub material: Material,
}

/// Transforms `ray` into an instance's local space. Since the instance
/// transform may carry non-uniform scale, the local direction is
/// renormalized for numerically stable triangle intersection, and the
/// returned `t_scale` (the pre-normalization length) is what the caller
/// must divide a local-space hit `t` by to recover the world-space `t`
/// (spec.md §4.E).
pub fn instance_local_ray(ray: &Ray, transform: &Trs) -> (Ray, f64) {
    let local_origin = transform.inverse_transform_point(ray.origin);
    let local_dir_unnormalized = transform.inverse_transform_vector(ray.dir);
    let t_scale = local_dir_unnormalized.length().max(1e-12);
    let local_dir = local_dir_unnormalized / t_scale;
    (Ray::new(local_origin, local_dir), t_scale)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Vec3;
    use crate::geom::transform::Diag3x3;

    #[test]
    fn local_ray_round_trips_through_scaled_transform() {
        let transform = Trs::new(Vec3::new(1.0, 2.0, 3.0), glam::DQuat::IDENTITY, Diag3x3::new(Vec3::new(2.0, 2.0, 2.0)));
        let ray = Ray::new(Vec3::new(0.0, 0.0, 0.0), Vec3::X);
        let (local_ray, t_scale) = instance_local_ray(&ray, &transform);
        let world_hit_t = 4.0;
        let world_point = ray.at(world_hit_t);
        let local_t = world_hit_t * t_scale;
        let local_point = local_ray.at(local_t);
        let recovered = transform.transform_point(local_point);
        assert!((recovered - world_point).length() < 1e-9);
    }
}
