//! Minimal material/texture surface and Lambert+ambient shading
//! (spec.md §4.E — deliberately not a full PBR pipeline; this crate's job
//! is producing a colour and a depth per pixel for visualization and
//! debugging, not final-render quality).

use crate::core::types::Vec3;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct TextureId(pub u32);

#[derive(Copy, Clone, Debug)]
pub struct Material {
    pub base_colour: [f32; 3],
    pub texture: Option<TextureId>,
}

impl Material {
    pub fn flat(base_colour: [f32; 3]) -> Self { Self { base_colour, texture: None } }
}

/// Every texture's samples packed into one flat table, addressed by a
/// per-texture offset. Sampling is nearest-neighbour only — this crate
/// doesn't do filtering.
#[derive(Clone, Debug, Default)]
pub struct TextureTable {
    samples: Vec<[f32; 3]>,
    dims: Vec<(u32, u32)>,
    offsets: Vec<usize>,
}

impl TextureTable {
    pub fn new() -> Self { Self::default() }

    pub fn add_texture(&mut self, width: u32, height: u32, samples: Vec<[f32; 3]>) -> TextureId {
        assert_eq!(samples.len(), (width * height) as usize, "texture sample count must equal width * height");
        let id = TextureId(self.dims.len() as u32);
        self.offsets.push(self.samples.len());
        self.dims.push((width, height));
        self.samples.extend(samples);
        id
    }

    pub fn sample_nearest(&self, id: TextureId, u: f32, v: f32) -> [f32; 3] {
        let (w, h) = self.dims[id.0 as usize];
        let x = ((u.clamp(0.0, 1.0) * w as f32) as u32).min(w.saturating_sub(1));
        let y = ((v.clamp(0.0, 1.0) * h as f32) as u32).min(h.saturating_sub(1));
        let offset = self.offsets[id.0 as usize];
        self.samples[offset + (y * w + x) as usize]
    }
}

/// One pixel's trace outcome: an 8-bit RGBA colour plus the hit depth (or
/// `f32::INFINITY` for a miss), matching the output a host renderer or a
/// test harness both want without re-deriving either from the other.
#[derive(Copy, Clone, Debug)]
pub struct TraceResult {
    pub colour: [u8; 4],
    pub depth: f32,
}

impl TraceResult {
    pub const MISS: TraceResult = TraceResult { colour: [0, 0, 0, 255], depth: f32::INFINITY };
}

/// A resolved surface hit ready for shading: world-space normal, material,
/// and the UV to sample it at.
pub struct ShadingPoint {
    pub normal: Vec3,
    pub material: Material,
    pub uv: [f32; 2],
}

pub fn shade(point: &ShadingPoint, textures: &TextureTable, light_dir: Vec3, ambient: f32) -> [f32; 3] {
    let base = match point.material.texture {
        // Textures are stored top-row-first; hit UVs have v increasing away
        // from the surface's own origin, so the sample needs a v-flip.
        Some(tex) => textures.sample_nearest(tex, point.uv[0], 1.0 - point.uv[1]),
        None => point.material.base_colour,
    };
    let n_dot_l = point.normal.dot(-light_dir).max(0.0) as f32;
    let lit = ambient + (1.0 - ambient) * n_dot_l;
    [base[0] * lit, base[1] * lit, base[2] * lit]
}

pub fn to_srgb_bytes(colour: [f32; 3]) -> [u8; 4] {
    let to_byte = |c: f32| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
    [to_byte(colour[0]), to_byte(colour[1]), to_byte(colour[2]), 255]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shading_a_surface_facing_the_light_is_brighter_than_facing_away() {
        let textures = TextureTable::new();
        let lit = ShadingPoint {
            normal: Vec3::Z,
            material: Material::flat([1.0, 1.0, 1.0]),
            uv: [0.0, 0.0],
        };
        let unlit = ShadingPoint {
            normal: -Vec3::Z,
            material: Material::flat([1.0, 1.0, 1.0]),
            uv: [0.0, 0.0],
        };
        let light_dir = Vec3::new(0.0, 0.0, -1.0);
        let c_lit = shade(&lit, &textures, light_dir, 0.1);
        let c_unlit = shade(&unlit, &textures, light_dir, 0.1);
        assert!(c_lit[0] > c_unlit[0]);
    }

    #[test]
    fn nearest_sample_picks_closest_texel() {
        let mut textures = TextureTable::new();
        let tex = textures.add_texture(2, 1, vec![[1.0, 0.0, 0.0], [0.0, 1.0, 0.0]]);
        assert_eq!(textures.sample_nearest(tex, 0.1, 0.5), [1.0, 0.0, 0.0]);
        assert_eq!(textures.sample_nearest(tex, 0.9, 0.5), [0.0, 1.0, 0.0]);
    }

    #[test]
    fn shade_flips_v_before_sampling() {
        let mut textures = TextureTable::new();
        // one column, two rows: texel (0,0) is row v=0, texel (0,1) is row v=1.
        let tex = textures.add_texture(1, 2, vec![[1.0, 0.0, 0.0], [0.0, 1.0, 0.0]]);
        let point = ShadingPoint {
            normal: Vec3::Z,
            material: Material { base_colour: [0.0, 0.0, 0.0], texture: Some(tex) },
            uv: [0.0, 0.0],
        };
        // uv.v = 0 must sample the flipped row (v=1 in texture space), i.e. green.
        let result = shade(&point, &textures, Vec3::new(0.0, 0.0, -1.0), 1.0);
        assert_eq!(result, [0.0, 1.0, 0.0]);
    }
}
