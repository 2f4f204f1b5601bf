//! Float-bounds 4-wide BVH used by the broad-phase (spec.md §4.C).
//!
//! Unlike [`crate::bvh::qbvh::Qbvh`] this variant keeps plain `f64` bounds —
//! broad-phase rebuilds every few frames and isn't traversed by the ray
//! tracer, so there's no payoff for quantization here, only for the rebuild
//! itself being cheap.

use crate::core::targets::BROADPHASE;
use crate::geom::Aabb;
use smallvec::SmallVec;
use tracing::trace;

pub const TRAVERSAL_STACK_CAPACITY: usize = 128;

/// Marks an empty child slot. `children[i] & LEAF_BIT` selects which half of
/// `children[i]` to interpret: a leaf index below the sentinel, or an
/// internal node index.
pub const SENTINEL: u32 = 0xFFFF_FFFF;
const LEAF_BIT: u32 = 1 << 31;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ChildRef {
    Internal(u32),
    Leaf(u32),
    Absent,
}

#[derive(Copy, Clone, Debug)]
pub struct LinearBvhNode {
    bounds: [Aabb; 4],
    children: [u32; 4],
}

impl LinearBvhNode {
    fn empty() -> Self {
        Self {
            bounds: [Aabb::default(); 4],
            children: [SENTINEL; 4],
        }
    }

    pub fn bounds(&self, i: usize) -> Aabb { self.bounds[i] }

    pub fn child_ref(&self, i: usize) -> ChildRef {
        let raw = self.children[i];
        if raw == SENTINEL {
            ChildRef::Absent
        } else if raw & LEAF_BIT != 0 {
            ChildRef::Leaf(raw & !LEAF_BIT)
        } else {
            ChildRef::Internal(raw)
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct LinearBvh {
    nodes: Vec<LinearBvhNode>,
}

impl LinearBvh {
    pub fn nodes(&self) -> &[LinearBvhNode] { &self.nodes }
    pub fn is_empty(&self) -> bool { self.nodes.is_empty() }

    pub fn build(leaf_aabbs: &[Aabb]) -> Self {
        if leaf_aabbs.is_empty() {
            return Self::default();
        }
        let indices: Vec<u32> = (0..leaf_aabbs.len() as u32).collect();
        let mut nodes = Vec::new();
        build_node(&indices, leaf_aabbs, &mut nodes);
        trace!(target: BROADPHASE, nodes = nodes.len(), leaves = leaf_aabbs.len(), "rebuilt broad-phase tree");
        Self { nodes }
    }

    /// Updates bounds in place for unchanged topology — far cheaper than a
    /// full rebuild when objects have only moved a little.
    pub fn refit(&mut self, leaf_aabbs: &[Aabb]) {
        if !self.nodes.is_empty() {
            refit_node(&mut self.nodes, 0, leaf_aabbs);
        }
    }

    pub fn find_overlaps(&self, query: Aabb, mut visit: impl FnMut(u32)) {
        if self.nodes.is_empty() {
            return;
        }
        let mut stack: SmallVec<[u32; TRAVERSAL_STACK_CAPACITY]> = SmallVec::new();
        stack.push(0);
        while let Some(node_idx) = stack.pop() {
            let node = &self.nodes[node_idx as usize];
            for i in (0..4).rev() {
                if !node.bounds[i].overlaps(&query) {
                    continue;
                }
                match node.child_ref(i) {
                    ChildRef::Leaf(leaf) => visit(leaf),
                    ChildRef::Internal(idx) => {
                        assert!(stack.len() < TRAVERSAL_STACK_CAPACITY, "broad-phase traversal stack overflow");
                        stack.push(idx);
                    }
                    ChildRef::Absent => {}
                }
            }
        }
    }
}

fn refit_node(nodes: &mut [LinearBvhNode], node_idx: usize, leaf_aabbs: &[Aabb]) -> Aabb {
    let mut node = nodes[node_idx];
    let mut combined = Aabb::default();
    for i in 0..4 {
        let child_box = match node.child_ref(i) {
            ChildRef::Leaf(leaf) => leaf_aabbs[leaf as usize],
            ChildRef::Internal(idx) => refit_node(nodes, idx as usize, leaf_aabbs),
            ChildRef::Absent => continue,
        };
        node.bounds[i] = child_box;
        combined = combined.union(&child_box);
    }
    nodes[node_idx] = node;
    combined
}

fn build_node(indices: &[u32], leaf_aabbs: &[Aabb], nodes: &mut Vec<LinearBvhNode>) -> (usize, Aabb) {
    let groups = partition_up_to_4(indices, leaf_aabbs);
    let node_idx = nodes.len();
    nodes.push(LinearBvhNode::empty());

    let mut node = LinearBvhNode::empty();
    let mut combined = Aabb::default();
    for (i, group) in groups.iter().enumerate() {
        if group.is_empty() {
            continue;
        }
        let child_box = if group.len() == 1 {
            let leaf = group[0];
            node.children[i] = leaf | LEAF_BIT;
            leaf_aabbs[leaf as usize]
        } else {
            let (child_idx, child_box) = build_node(group, leaf_aabbs, nodes);
            node.children[i] = child_idx as u32;
            child_box
        };
        node.bounds[i] = child_box;
        combined = combined.union(&child_box);
    }
    nodes[node_idx] = node;
    (node_idx, combined)
}

fn partition_up_to_4(indices: &[u32], leaf_aabbs: &[Aabb]) -> [Vec<u32>; 4] {
    if indices.len() <= 4 {
        let mut groups: [Vec<u32>; 4] = Default::default();
        for (i, &idx) in indices.iter().enumerate() {
            groups[i].push(idx);
        }
        return groups;
    }
    let (left, right) = split_median(indices, leaf_aabbs);
    let (ll, lr) = split_median(&left, leaf_aabbs);
    let (rl, rr) = split_median(&right, leaf_aabbs);
    [ll, lr, rl, rr]
}

fn split_median(indices: &[u32], leaf_aabbs: &[Aabb]) -> (Vec<u32>, Vec<u32>) {
    let mut sorted = indices.to_vec();
    let centroids: Vec<_> = sorted.iter().map(|&i| leaf_aabbs[i as usize].center()).collect();
    let centroid_bounds = Aabb::encompass_points_slice(&centroids);
    let extent = centroid_bounds.size().to_array();
    let axis = if extent[0] >= extent[1] && extent[0] >= extent[2] {
        0
    } else if extent[1] >= extent[2] {
        1
    } else {
        2
    };
    sorted.sort_unstable_by(|&a, &b| {
        let ca = leaf_aabbs[a as usize].center().to_array()[axis];
        let cb = leaf_aabbs[b as usize].center().to_array()[axis];
        ca.total_cmp(&cb)
    });
    let mid = sorted.len() / 2;
    let right = sorted.split_off(mid);
    (sorted, right)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Vec3;

    #[test]
    fn find_overlaps_returns_intersecting_leaves_only() {
        let boxes = vec![
            Aabb::new(Vec3::ZERO, Vec3::ONE),
            Aabb::new(Vec3::splat(5.0), Vec3::splat(6.0)),
            Aabb::new(Vec3::splat(0.2), Vec3::splat(0.8)),
        ];
        let bvh = LinearBvh::build(&boxes);
        let mut hits = Vec::new();
        bvh.find_overlaps(Aabb::new(Vec3::splat(0.1), Vec3::splat(0.9)), |l| hits.push(l));
        hits.sort_unstable();
        assert_eq!(hits, vec![0, 2]);
    }

    #[test]
    fn refit_tracks_moved_leaves() {
        let mut boxes = vec![Aabb::new(Vec3::ZERO, Vec3::ONE), Aabb::new(Vec3::splat(5.0), Vec3::splat(6.0))];
        let mut bvh = LinearBvh::build(&boxes);
        boxes[0] = Aabb::new(Vec3::splat(9.0), Vec3::splat(9.5));
        bvh.refit(&boxes);
        let mut hits = Vec::new();
        bvh.find_overlaps(Aabb::new(Vec3::splat(9.1), Vec3::splat(9.2)), |l| hits.push(l));
        assert_eq!(hits, vec![0]);
    }
}
