//! String definitions for [`tracing`] targets, one per component in the
//! dependency order of spec.md §2.

use crate::tracing_targets;

tracing_targets! {
    GEOM = "geom",
    QBVH = "qbvh",
    BROADPHASE = "broadphase",
    NARROWPHASE = "narrowphase",
    RAYTRACE = "raytrace",
    SCHEDULE = "schedule",
}
