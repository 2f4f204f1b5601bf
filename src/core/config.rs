//! In-memory simulation parameters handed to [`crate::schedule::init`].
//!
//! No file or CLI loading lives here — that's the host's job — but the
//! struct is `serde`-derivable so a host *can* round-trip it through its own
//! config layer, matching how the teacher derives `Serialize` on its own
//! plain parameter structs (e.g. `RenderOpts`).

use crate::core::types::{Number, Vec3};
use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorldConfig {
    /// Fixed timestep, in seconds.
    pub dt: Number,
    /// Number of solver substeps per step.
    pub num_substeps: u32,
    pub gravity: Vec3,
    /// Upper bound on simultaneously-registered dynamic/kinematic entities; sizes the broad-phase leaf array.
    pub max_dynamic_objects: u32,
    /// Upper bound on candidate pairs emitted per step; overflow is dropped, see spec.md §4.C.
    pub max_candidates: u32,
    /// Upper bound on contacts generated per step; overflow is fatal, see spec.md §4.D.
    pub max_contacts: u32,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            dt: 1.0 / 60.0,
            num_substeps: 4,
            gravity: Vec3::new(0.0, 0.0, -9.81),
            max_dynamic_objects: 4096,
            max_candidates: 16384,
            max_contacts: 8192,
        }
    }
}
