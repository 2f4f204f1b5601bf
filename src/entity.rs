//! Entity handle and per-entity collision-relevant state.
//!
//! The real ECS storage backing these is an external collaborator
//! (spec.md §1); this crate only needs a stable, `Copy` handle and a
//! read-only view onto the fields collision detection depends on.

use crate::core::types::{ObjectId, Vec3};
use crate::geom::transform::{Diag3x3, Trs};
use glam::DQuat;
use strum_macros::{Display, EnumIter};

/// A generational handle into external ECS storage.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId {
    pub index: u32,
    pub generation: u32,
}

impl EntityId {
    pub fn new(index: u32, generation: u32) -> Self { Self { index, generation } }
}

/// How an entity participates in collision response.
///
/// Two `Static` entities never generate candidate pairs (spec.md §4.C);
/// `Kinematic` entities move but aren't affected by contacts (solver's
/// concern, not this crate's).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum ResponseType {
    Dynamic,
    Kinematic,
    Static,
}

impl ResponseType {
    pub fn is_static(self) -> bool { matches!(self, ResponseType::Static) }
}

/// Read-only access to the ECS fields collision detection consumes (spec.md §6).
///
/// The core never writes ECS state back; the solver does.
pub trait EcsRead {
    fn position(&self, e: EntityId) -> Vec3;
    fn rotation(&self, e: EntityId) -> DQuat;
    fn scale(&self, e: EntityId) -> Diag3x3;
    fn object_id(&self, e: EntityId) -> ObjectId;
    fn response_type(&self, e: EntityId) -> ResponseType;

    fn transform(&self, e: EntityId) -> Trs { Trs::new(self.position(e), self.rotation(e), self.scale(e)) }
}
