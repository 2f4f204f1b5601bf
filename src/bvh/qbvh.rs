//! Four-wide quantized bounding-volume hierarchy (spec.md §4.B).
//!
//! Nodes are packed depth-first into one contiguous array; each child slot
//! is either absent, a 1-based reference to another internal node, or a
//! leaf index encoded as `-idx - 1` (Design Note 9's `ChildRef` sum type
//! replaces the source's high-bit-flag trick).

use crate::core::targets::QBVH;
use crate::geom::Aabb;
use getset::CopyGetters;
use smallvec::SmallVec;
use tracing::trace;

/// Depth-first traversal stack capacity, per spec.md §4.B / §4.E.
pub const TRAVERSAL_STACK_CAPACITY: usize = 128;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ChildRef {
    Internal(u32),
    Leaf(u32),
    Absent,
}

/// A fixed-layout 4-wide node: a base point, one scale exponent per axis,
/// and per-child 8-bit-quantized min/max offsets.
#[derive(Copy, Clone, Debug, CopyGetters)]
pub struct QbvhNode {
    #[getset(get_copy = "pub")]
    min_point: crate::core::types::Vec3,
    /// Per-axis exponent; dequantized scale is `2^exp`.
    #[getset(get_copy = "pub with_prefix")]
    exp: [i8; 3],
    /// `q_min[axis][child]`
    q_min: [[u8; 4]; 3],
    q_max: [[u8; 4]; 3],
    #[getset(get_copy = "pub")]
    num_children: u8,
    /// `0` = absent, `>0` = 1-based internal node index, `<0` = `-(leaf_idx) - 1`.
    children_idx: [i32; 4],
}

impl QbvhNode {
    pub fn exponents(&self) -> [i8; 3] { self.get_exp() }

    pub fn child_ref(&self, i: usize) -> ChildRef {
        if i >= self.num_children as usize {
            return ChildRef::Absent;
        }
        match self.children_idx[i] {
            0 => ChildRef::Absent,
            idx if idx > 0 => ChildRef::Internal((idx - 1) as u32),
            idx => ChildRef::Leaf((-idx - 1) as u32),
        }
    }

    fn scale(&self) -> crate::core::types::Vec3 {
        crate::core::types::Vec3::new(
            2f64.powi(self.exp[0] as i32),
            2f64.powi(self.exp[1] as i32),
            2f64.powi(self.exp[2] as i32),
        )
    }

    /// Dequantizes the conservative bound of child `i`.
    ///
    /// A production ray kernel would stay in quantized-integer
    /// ray-parameter space here (spec.md §4.B) to avoid materializing this
    /// float box per traversal step; this port always forms it explicitly,
    /// trading that micro-optimization for a single obviously-correct
    /// decode path shared by both the overlap query and the ray tracer.
    pub fn child_aabb(&self, i: usize) -> Aabb {
        let scale = self.scale();
        let q_min = crate::core::types::Vec3::new(
            self.q_min[0][i] as f64,
            self.q_min[1][i] as f64,
            self.q_min[2][i] as f64,
        );
        let q_max = crate::core::types::Vec3::new(
            self.q_max[0][i] as f64,
            self.q_max[1][i] as f64,
            self.q_max[2][i] as f64,
        );
        Aabb::new(self.min_point + q_min * scale, self.min_point + q_max * scale)
    }
}

#[derive(Clone, Debug, Default)]
pub struct Qbvh {
    nodes: Vec<QbvhNode>,
}

impl Qbvh {
    pub fn nodes(&self) -> &[QbvhNode] { &self.nodes }
    pub fn is_empty(&self) -> bool { self.nodes.is_empty() }

    /// Builds a tree over `leaf_aabbs`, where leaf `i`'s bounding box is
    /// `leaf_aabbs[i]`. Partitioning is longest-axis median-of-centroids,
    /// splitting twice per node to land on 4 children directly (the same
    /// "split twice for four children" approach the teacher's SAH builder
    /// uses, without the surface-area-heuristic cost search since this
    /// structure's invariant only requires conservative bounds, not an
    /// optimal split).
    pub fn build(leaf_aabbs: &[Aabb]) -> Self {
        if leaf_aabbs.is_empty() {
            return Self::default();
        }
        let indices: Vec<u32> = (0..leaf_aabbs.len() as u32).collect();
        let mut nodes = Vec::new();
        Self::build_node(&indices, leaf_aabbs, &mut nodes);
        trace!(target: QBVH, nodes = nodes.len(), leaves = leaf_aabbs.len(), "built qbvh");
        Self { nodes }
    }

    /// Recomputes every node's bounds in place, assuming topology and leaf
    /// count are unchanged but `leaf_aabbs` moved (spec.md §4.B `refit`).
    pub fn refit(&mut self, leaf_aabbs: &[Aabb]) {
        if self.nodes.is_empty() {
            return;
        }
        self.refit_node(0, leaf_aabbs);
    }

    fn refit_node(&mut self, node_idx: usize, leaf_aabbs: &[Aabb]) -> Aabb {
        let node = self.nodes[node_idx];
        let mut child_boxes: [Option<Aabb>; 4] = [None; 4];
        for i in 0..node.num_children as usize {
            child_boxes[i] = Some(match node.child_ref(i) {
                ChildRef::Leaf(leaf) => leaf_aabbs[leaf as usize],
                ChildRef::Internal(idx) => self.refit_node(idx as usize, leaf_aabbs),
                ChildRef::Absent => continue,
            });
        }
        let node_aabb = child_boxes.iter().flatten().fold(Aabb::default(), |a, b| a.union(b));
        let (min_point, exp, q_min, q_max) = quantize_node(node_aabb, &child_boxes);
        let node = &mut self.nodes[node_idx];
        node.min_point = min_point;
        node.exp = exp;
        node.q_min = q_min;
        node.q_max = q_max;
        node_aabb
    }

    /// Traverses from the root with an explicit depth-first stack,
    /// invoking `visit(leaf_index)` for every overlapping leaf.
    ///
    /// No deduplication; children are visited in insertion order.
    pub fn find_overlaps(&self, query: Aabb, mut visit: impl FnMut(u32)) {
        if self.nodes.is_empty() {
            return;
        }
        let mut stack: SmallVec<[u32; TRAVERSAL_STACK_CAPACITY]> = SmallVec::new();
        stack.push(0);
        while let Some(node_idx) = stack.pop() {
            let node = &self.nodes[node_idx as usize];
            for i in (0..node.num_children as usize).rev() {
                let child_box = node.child_aabb(i);
                if !child_box.overlaps(&query) {
                    continue;
                }
                match node.child_ref(i) {
                    ChildRef::Leaf(leaf) => visit(leaf),
                    ChildRef::Internal(idx) => {
                        assert!(
                            stack.len() < TRAVERSAL_STACK_CAPACITY,
                            "qbvh traversal stack exceeded capacity {TRAVERSAL_STACK_CAPACITY}"
                        );
                        stack.push(idx);
                    }
                    ChildRef::Absent => {}
                }
            }
        }
        // NOTE: pushing children in reverse and popping LIFO restores
        // forward insertion order across the whole traversal, not just
        // within one node.
    }

    fn build_node(indices: &[u32], leaf_aabbs: &[Aabb], nodes: &mut Vec<QbvhNode>) -> (usize, Aabb) {
        let groups = partition_up_to_4(indices, leaf_aabbs);
        let node_idx = nodes.len();
        nodes.push(QbvhNode {
            min_point: crate::core::types::Vec3::ZERO,
            exp: [0; 3],
            q_min: [[0; 4]; 3],
            q_max: [[0; 4]; 3],
            num_children: 0,
            children_idx: [0; 4],
        });

        let mut children_idx = [0i32; 4];
        let mut child_boxes: [Option<Aabb>; 4] = [None; 4];
        let mut num_children = 0u8;
        for (i, group) in groups.iter().enumerate() {
            if group.is_empty() {
                continue;
            }
            num_children += 1;
            if group.len() == 1 {
                let leaf = group[0];
                children_idx[i] = -(leaf as i32) - 1;
                child_boxes[i] = Some(leaf_aabbs[leaf as usize]);
            } else {
                let (child_node_idx, child_aabb) = Self::build_node(group, leaf_aabbs, nodes);
                children_idx[i] = child_node_idx as i32 + 1;
                child_boxes[i] = Some(child_aabb);
            }
        }

        let node_aabb = child_boxes.iter().flatten().fold(Aabb::default(), |a, b| a.union(b));
        let (min_point, exp, q_min, q_max) = quantize_node(node_aabb, &child_boxes);
        nodes[node_idx] = QbvhNode {
            min_point,
            exp,
            q_min,
            q_max,
            num_children,
            children_idx,
        };
        (node_idx, node_aabb)
    }
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
    let centroid_bounds = crate::geom::Aabb::encompass_points_slice(&centroids);
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

/// Chooses per-axis exponents and quantizes each child's bounds against the
/// combined node AABB, per spec.md §4.B's quantization contract: `qMin`
/// rounds down, `qMax` rounds up, so the decoded box always conservatively
/// encloses the true child box.
fn quantize_node(
    node_aabb: Aabb,
    child_boxes: &[Option<Aabb>; 4],
) -> (crate::core::types::Vec3, [i8; 3], [[u8; 4]; 3], [[u8; 4]; 3]) {
    let min_point = node_aabb.p_min();
    let extent = node_aabb.size().to_array();
    let mut exp = [0i8; 3];
    let mut scale = [1.0f64; 3];
    for axis in 0..3 {
        let e = extent[axis].max(1e-12);
        let raw = (e / 255.0).log2().ceil();
        exp[axis] = raw.clamp(-126.0, 127.0) as i8;
        scale[axis] = 2f64.powi(exp[axis] as i32);
    }

    let mut q_min = [[0u8; 4]; 3];
    let mut q_max = [[255u8; 4]; 3];
    for (i, maybe_box) in child_boxes.iter().enumerate() {
        let Some(b) = maybe_box else { continue };
        let bmin = b.p_min().to_array();
        let bmax = b.p_max().to_array();
        let mp = min_point.to_array();
        for axis in 0..3 {
            let rel_min = (bmin[axis] - mp[axis]) / scale[axis];
            let rel_max = (bmax[axis] - mp[axis]) / scale[axis];
            q_min[axis][i] = rel_min.floor().clamp(0.0, 255.0) as u8;
            q_max[axis][i] = rel_max.ceil().clamp(0.0, 255.0) as u8;
        }
    }
    (min_point, exp, q_min, q_max)
}
