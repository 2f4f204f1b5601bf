//! Broad-phase candidate-pair generation (spec.md §4.C).
//!
//! Leaf AABBs are fattened by a fixed margin before insertion so that small
//! motion between frames can be absorbed by a refit instead of forcing a
//! full rebuild every tick.

use crate::bvh::LinearBvh;
use crate::core::config::WorldConfig;
use crate::core::targets::BROADPHASE;
use crate::core::types::LeafId;
use crate::entity::ResponseType;
use crate::geom::Aabb;
use std::sync::atomic::{AtomicU32, Ordering};
use tracing::{debug, error};

/// One leaf's current world-space bounds plus the data the pairing pass
/// needs (its response type, to skip static-static pairs).
#[derive(Copy, Clone, Debug)]
pub struct LeafInput {
    pub aabb: Aabb,
    pub response_type: ResponseType,
}

/// An unordered candidate pair, always stored with `a < b`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Pair {
    pub a: u32,
    pub b: u32,
}

impl Pair {
    fn new(a: u32, b: u32) -> Self {
        debug_assert!(a < b);
        Self { a, b }
    }
}

/// Result of one broad-phase tick: the candidate pairs found, capped at
/// `WorldConfig::max_candidates`, plus how many were dropped past the cap.
#[derive(Debug, Default)]
pub struct BroadPhaseOutput {
    pub pairs: Vec<Pair>,
    pub overflowed: usize,
}

#[derive(Clone, Debug, Default)]
pub struct BroadPhase {
    tree: LinearBvh,
    leaf_aabbs: Vec<Aabb>,
    rebuild_centers: Vec<crate::core::types::Vec3>,
    avg_extent: f64,
}

const FATTEN_MARGIN: f64 = 0.05;

impl BroadPhase {
    pub fn new() -> Self { Self::default() }

    /// Runs one tick: decides refit vs. full rebuild from accumulated leaf
    /// motion, then emits candidate pairs from the (possibly stale-but-
    /// conservative) tree.
    pub fn update(&mut self, leaves: &[LeafInput], config: &WorldConfig) -> BroadPhaseOutput {
        if self.tree.is_empty() || leaves.len() != self.leaf_aabbs.len() {
            self.rebuild(leaves);
        } else {
            let threshold_sq = (0.5 * self.avg_extent).powi(2);
            let max_motion_sq = leaves
                .iter()
                .zip(&self.rebuild_centers)
                .map(|(l, &ref_center)| l.aabb.center().distance_squared(ref_center))
                .fold(0.0, f64::max);
            if max_motion_sq > threshold_sq {
                self.rebuild(leaves);
            } else {
                self.leaf_aabbs = leaves.iter().map(|l| l.aabb.expand(FATTEN_MARGIN)).collect();
                self.tree.refit(&self.leaf_aabbs);
                debug!(target: BROADPHASE, n = leaves.len(), "broad-phase refit");
            }
        }
        self.find_candidates(leaves, config)
    }

    fn rebuild(&mut self, leaves: &[LeafInput]) {
        self.leaf_aabbs = leaves.iter().map(|l| l.aabb.expand(FATTEN_MARGIN)).collect();
        self.tree = LinearBvh::build(&self.leaf_aabbs);
        self.rebuild_centers = self.leaf_aabbs.iter().map(|b| b.center()).collect();
        self.avg_extent = average_extent(&self.leaf_aabbs);
        debug!(target: BROADPHASE, n = leaves.len(), "broad-phase rebuild");
    }

    fn find_candidates(&self, leaves: &[LeafInput], config: &WorldConfig) -> BroadPhaseOutput {
        let mut pairs = Vec::new();
        let mut overflowed = 0usize;
        for i in 0..leaves.len() {
            let query = self.leaf_aabbs[i];
            self.tree.find_overlaps(query, |j| {
                if j as usize <= i {
                    return;
                }
                let a = &leaves[i];
                let b = &leaves[j as usize];
                if a.response_type.is_static() && b.response_type.is_static() {
                    return;
                }
                if pairs.len() >= config.max_candidates as usize {
                    overflowed += 1;
                    return;
                }
                pairs.push(Pair::new(i as u32, j));
            });
        }
        if overflowed > 0 {
            tracing::warn!(target: BROADPHASE, overflowed, "broad-phase candidate cap exceeded");
        }
        BroadPhaseOutput { pairs, overflowed }
    }
}

/// Per-world source of stable [`LeafId`]s, sized at registration time to
/// `WorldConfig::max_dynamic_objects` (spec.md §6 `reserveLeaf`).
///
/// Reservation is single-threaded at entity-registration time (spec.md §5's
/// "BVH leaf array is written only during entity registration"), but the
/// counter is still atomic so a host that registers entities from more than
/// one thread gets distinct leaves rather than a data race.
#[derive(Debug)]
pub struct LeafAllocator {
    next: AtomicU32,
    capacity: u32,
}

impl LeafAllocator {
    pub fn new(capacity: u32) -> Self { Self { next: AtomicU32::new(0), capacity } }

    pub fn capacity(&self) -> u32 { self.capacity }

    /// Reserves the next leaf slot. Panics (after logging) once `capacity`
    /// leaves are already taken — spec.md §7 category 1: registering past
    /// `maxDynamicObjects` is caller misconfiguration, not recoverable.
    pub fn reserve_leaf(&self) -> LeafId {
        let id = self.next.fetch_add(1, Ordering::Relaxed);
        if id >= self.capacity {
            error!(target: BROADPHASE, capacity = self.capacity, "leaf reservation exceeded capacity");
            panic!("reserveLeaf: exceeded capacity {}", self.capacity);
        }
        id
    }
}

fn average_extent(boxes: &[Aabb]) -> f64 {
    if boxes.is_empty() {
        return 0.0;
    }
    let total: f64 = boxes
        .iter()
        .map(|b| {
            let s = b.size();
            (s.x + s.y + s.z) / 3.0
        })
        .sum();
    total / boxes.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Vec3;

    fn leaf(pos: Vec3, response_type: ResponseType) -> LeafInput {
        LeafInput {
            aabb: Aabb::new(pos - Vec3::splat(0.5), pos + Vec3::splat(0.5)),
            response_type,
        }
    }

    #[test]
    fn overlapping_dynamic_pair_is_emitted_with_a_less_than_b() {
        let mut bp = BroadPhase::new();
        let leaves = vec![
            leaf(Vec3::ZERO, ResponseType::Dynamic),
            leaf(Vec3::new(0.2, 0.0, 0.0), ResponseType::Dynamic),
        ];
        let out = bp.update(&leaves, &WorldConfig::default());
        assert_eq!(out.pairs, vec![Pair { a: 0, b: 1 }]);
    }

    #[test]
    fn static_static_pair_is_never_emitted() {
        let mut bp = BroadPhase::new();
        let leaves = vec![
            leaf(Vec3::ZERO, ResponseType::Static),
            leaf(Vec3::new(0.1, 0.0, 0.0), ResponseType::Static),
        ];
        let out = bp.update(&leaves, &WorldConfig::default());
        assert!(out.pairs.is_empty());
    }

    #[test]
    fn separated_objects_produce_no_pairs() {
        let mut bp = BroadPhase::new();
        let leaves = vec![leaf(Vec3::ZERO, ResponseType::Dynamic), leaf(Vec3::splat(50.0), ResponseType::Dynamic)];
        let out = bp.update(&leaves, &WorldConfig::default());
        assert!(out.pairs.is_empty());
    }

    #[test]
    fn small_motion_refits_without_losing_the_pair() {
        let mut bp = BroadPhase::new();
        let mut leaves = vec![
            leaf(Vec3::ZERO, ResponseType::Dynamic),
            leaf(Vec3::new(0.2, 0.0, 0.0), ResponseType::Dynamic),
        ];
        bp.update(&leaves, &WorldConfig::default());
        leaves[1] = leaf(Vec3::new(0.21, 0.0, 0.0), ResponseType::Dynamic);
        let out = bp.update(&leaves, &WorldConfig::default());
        assert_eq!(out.pairs, vec![Pair { a: 0, b: 1 }]);
    }

    #[test]
    fn candidate_cap_is_respected_and_counted() {
        let mut bp = BroadPhase::new();
        let leaves: Vec<_> = (0..20)
            .map(|i| leaf(Vec3::new(i as f64 * 0.1, 0.0, 0.0), ResponseType::Dynamic))
            .collect();
        let mut config = WorldConfig::default();
        config.max_candidates = 3;
        let out = bp.update(&leaves, &config);
        assert_eq!(out.pairs.len(), 3);
        assert!(out.overflowed > 0);
    }

    #[test]
    fn thousand_sphere_grid_stays_within_candidate_cap() {
        let mut bp = BroadPhase::new();
        let mut leaves = Vec::new();
        for x in 0..10 {
            for y in 0..10 {
                for z in 0..10 {
                    leaves.push(leaf(Vec3::new(x as f64 * 3.0, y as f64 * 3.0, z as f64 * 3.0), ResponseType::Dynamic));
                }
            }
        }
        let config = WorldConfig::default();
        let out = bp.update(&leaves, &config);
        assert!(out.pairs.is_empty());
        assert_eq!(out.overflowed, 0);
    }

    #[test]
    fn leaf_allocator_assigns_sequential_ids() {
        let leaves = LeafAllocator::new(3);
        assert_eq!(leaves.reserve_leaf(), 0);
        assert_eq!(leaves.reserve_leaf(), 1);
        assert_eq!(leaves.reserve_leaf(), 2);
    }

    #[test]
    fn leaf_allocator_panics_past_capacity() {
        let leaves = LeafAllocator::new(1);
        leaves.reserve_leaf();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| leaves.reserve_leaf()));
        assert!(result.is_err());
    }
}
