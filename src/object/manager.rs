//! Process-wide, immutable-after-init object table (spec.md §3, §6).
//!
//! Built once at `init()` time and passed around by shared reference — no
//! global singleton, per Design Note 9.

use crate::core::error::CoreError;
use crate::core::types::ObjectId;
use crate::geom::Aabb;
use crate::object::primitive::{CollisionPrimitive, Primitive};

/// The immutable per-object metadata backing one `ObjectId`.
#[derive(Clone, Debug)]
pub struct ObjectDef {
    pub primitives: Vec<CollisionPrimitive>,
    pub object_aabb: Aabb,
    pub mass: f64,
    pub friction: f64,
}

/// An entry as supplied at construction time, before the local AABBs and the
/// composed whole-object AABB are derived.
pub struct ObjectSpec {
    pub primitives: Vec<Primitive>,
    pub mass: f64,
    pub friction: f64,
}

#[derive(Clone, Debug, Default)]
pub struct ObjectManager {
    objects: Vec<ObjectDef>,
}

impl ObjectManager {
    pub fn build(specs: Vec<ObjectSpec>) -> Result<Self, CoreError> {
        let mut objects = Vec::with_capacity(specs.len());
        for (i, spec) in specs.into_iter().enumerate() {
            if spec.primitives.is_empty() {
                return Err(CoreError::EmptyObject { object_id: i as ObjectId });
            }

            let mut primitives = Vec::with_capacity(spec.primitives.len());
            let mut object_aabb = Aabb::default();
            for shape in spec.primitives {
                let local_aabb = local_aabb_of(&shape);
                if !local_aabb.is_infinite() {
                    object_aabb = object_aabb.union(&local_aabb);
                } else {
                    object_aabb = Aabb::INFINITE;
                }
                primitives.push(CollisionPrimitive { shape, local_aabb });
            }

            objects.push(ObjectDef {
                primitives,
                object_aabb,
                mass: spec.mass,
                friction: spec.friction,
            });
        }
        Ok(Self { objects })
    }

    pub fn primitives(&self, id: ObjectId) -> &[CollisionPrimitive] { &self.objects[id as usize].primitives }

    pub fn object_aabb(&self, id: ObjectId) -> Aabb { self.objects[id as usize].object_aabb }

    pub fn mass(&self, id: ObjectId) -> f64 { self.objects[id as usize].mass }

    pub fn friction(&self, id: ObjectId) -> f64 { self.objects[id as usize].friction }

    pub fn len(&self) -> usize { self.objects.len() }
    pub fn is_empty(&self) -> bool { self.objects.is_empty() }
}

fn local_aabb_of(shape: &Primitive) -> Aabb {
    match shape {
        Primitive::Sphere { radius } => Aabb::new(
            crate::core::types::Vec3::splat(-radius),
            crate::core::types::Vec3::splat(*radius),
        ),
        Primitive::Plane => Aabb::INFINITE,
        Primitive::Hull(mesh) => Aabb::encompass_points_slice(mesh.vertices()),
    }
}
