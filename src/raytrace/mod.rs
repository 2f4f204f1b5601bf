//! Two-level ray tracer used for scene visualization and debugging
//! (spec.md §4.E). Not a physically-based renderer: one bounce, Lambert +
//! ambient shading, nearest-neighbour texturing.

pub mod instance;
pub mod mesh;
pub mod ray;
pub mod shade;
pub mod tlas;

pub use instance::Instance;
pub use mesh::TriangleMesh;
pub use ray::Ray;
pub use shade::{Material, TextureId, TextureTable, TraceResult};
pub use tlas::{Hit, Tlas};

use crate::core::targets::RAYTRACE;
use crate::core::types::Vec3;
use rayon::prelude::*;
use tracing::debug;

#[derive(Copy, Clone, Debug)]
pub struct Camera {
    origin: Vec3,
    lower_left: Vec3,
    horizontal: Vec3,
    vertical: Vec3,
}

impl Camera {
    pub fn new(origin: Vec3, look_at: Vec3, up: Vec3, vfov_degrees: f64, aspect_ratio: f64) -> Self {
        let theta = vfov_degrees.to_radians();
        let half_height = (theta * 0.5).tan();
        let half_width = aspect_ratio * half_height;
        let w = (origin - look_at).normalize();
        let u = up.cross(w).normalize();
        let v = w.cross(u);
        let lower_left = origin - u * half_width - v * half_height - w;
        Self {
            origin,
            lower_left,
            horizontal: u * (2.0 * half_width),
            vertical: v * (2.0 * half_height),
        }
    }

    pub fn generate_ray(&self, px: u32, py: u32, width: u32, height: u32) -> Ray {
        let s = (px as f64 + 0.5) / width as f64;
        let t = 1.0 - (py as f64 + 0.5) / height as f64;
        let dir = (self.lower_left + self.horizontal * s + self.vertical * t - self.origin).normalize();
        Ray::new(self.origin, dir)
    }
}

/// Renders the whole frame, one `rayon` work-stealing task per pixel row
/// (spec.md §5: CPU parallel-for over tiles). A row is the natural tile
/// granularity here since there's no cross-row dependency to batch around.
pub fn render(tlas: &Tlas, textures: &TextureTable, camera: &Camera, width: u32, height: u32, light_dir: Vec3, ambient: f32) -> Vec<TraceResult> {
    let mut buffer = vec![TraceResult::MISS; (width as usize) * (height as usize)];
    buffer.par_chunks_mut(width as usize).enumerate().for_each(|(y, row)| {
        for (x, pixel) in row.iter_mut().enumerate() {
            let ray = camera.generate_ray(x as u32, y as u32, width, height);
            *pixel = trace_pixel(tlas, textures, &ray, light_dir, ambient);
        }
    });
    debug!(target: RAYTRACE, width, height, instances = tlas.instances().len(), "rendered frame");
    buffer
}

fn trace_pixel(tlas: &Tlas, textures: &TextureTable, ray: &Ray, light_dir: Vec3, ambient: f32) -> TraceResult {
    match tlas.trace(ray, f64::INFINITY) {
        Some(hit) => {
            let point = shade::ShadingPoint {
                normal: hit.normal,
                material: hit.material,
                uv: hit.uv,
            };
            let colour = shade::shade(&point, textures, light_dir, ambient);
            TraceResult {
                colour: shade::to_srgb_bytes(colour),
                depth: hit.t as f32,
            }
        }
        None => TraceResult::MISS,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::transform::{Diag3x3, Trs};

    fn quad_instance_scene() -> Tlas {
        let mesh = TriangleMesh::new(
            vec![
                Vec3::new(-1.0, -1.0, 0.0),
                Vec3::new(1.0, -1.0, 0.0),
                Vec3::new(1.0, 1.0, 0.0),
                Vec3::new(-1.0, 1.0, 0.0),
            ],
            vec![[0, 1, 2], [0, 2, 3]],
            None,
        );
        let instance = Instance {
            transform: Trs::new(Vec3::new(0.0, 0.0, 5.0), glam::DQuat::IDENTITY, Diag3x3::IDENTITY),
            mesh_index: 0,
            material: Material::flat([0.8, 0.2, 0.2]),
        };
        Tlas::build(vec![instance], vec![mesh])
    }

    #[test]
    fn centre_pixel_hits_the_quad_and_edge_pixel_misses() {
        let tlas = quad_instance_scene();
        let textures = TextureTable::new();
        let camera = Camera::new(Vec3::ZERO, Vec3::new(0.0, 0.0, 1.0), Vec3::Y, 60.0, 1.0);
        let buffer = render(&tlas, &textures, &camera, 16, 16, Vec3::new(0.0, 0.0, -1.0), 0.1);

        let centre = &buffer[8 * 16 + 8];
        assert!(centre.depth.is_finite());

        let corner = &buffer[0];
        assert!(corner.depth.is_infinite());
        assert_eq!(corner.colour, TraceResult::MISS.colour);
    }
}
