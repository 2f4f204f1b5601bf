pub mod manager;
pub mod primitive;

pub use manager::{ObjectDef, ObjectManager, ObjectSpec};
pub use primitive::{CollisionPrimitive, Kind, Primitive};
