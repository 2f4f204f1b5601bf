//! Core numeric type aliases used throughout the crate.
//!
//! All geometry is double precision: contact penetration depths are often
//! small relative to world-space coordinates, and `f64` keeps the SAT
//! separation comparisons in spec well clear of cancellation error.

/// Numeric type used for all geometry and physics calculations.
pub type Number = f64;

pub type Vec3 = glam::DVec3;
pub type Quat = glam::DQuat;
pub type Mat3 = glam::DMat3;

/// Stable index into the process-wide object table (see [`crate::object::manager::ObjectManager`]).
pub type ObjectId = u32;

/// Stable index assigned to a BVH leaf at entity-registration time.
pub type LeafId = u32;
