//! Contact output types and the lock-free buffer the parallel narrow-phase
//! pass writes into (spec.md §4.D, §5).

use crate::core::types::Vec3;
use crate::entity::EntityId;
use smallvec::SmallVec;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::OnceLock;

/// One point of contact: a world-space position and how far the two
/// surfaces interpenetrate along the manifold's normal.
#[derive(Copy, Clone, Debug)]
pub struct ContactPoint {
    pub position: Vec3,
    pub penetration: f64,
}

/// Up to 4 contact points sharing one separating-axis normal, pointing from
/// the first primitive toward the second (spec.md §4.D).
#[derive(Clone, Debug)]
pub struct Manifold {
    pub normal: Vec3,
    pub points: SmallVec<[ContactPoint; 4]>,
}

impl Manifold {
    pub fn single(normal: Vec3, point: Vec3, penetration: f64) -> Self {
        let mut points = SmallVec::new();
        points.push(ContactPoint { position: point, penetration });
        Self { normal, points }
    }

    /// Negates the normal, for when a pair was tested in swapped canonical
    /// order and the result must be reported against the caller's original
    /// `(a, b)` ordering.
    pub fn flipped(mut self) -> Self {
        self.normal = -self.normal;
        self
    }
}

/// A finished contact ready for the solver: which two entities, and the
/// manifold between them.
#[derive(Clone, Debug)]
pub struct ContactConstraint {
    pub entity_a: EntityId,
    pub entity_b: EntityId,
    pub manifold: Manifold,
}

/// A preallocated, fixed-capacity buffer that concurrent narrow-phase
/// workers append to via an atomic fetch-add, avoiding a mutex on the
/// common path (spec.md §4.D, §5: "concurrency model").
///
/// Exceeding capacity is a fatal condition, not a silently-dropped contact
/// — the caller is expected to panic when [`ContactBuffer::push`] returns
/// `false`.
pub struct ContactBuffer {
    slots: Vec<OnceLock<ContactConstraint>>,
    count: AtomicUsize,
    capacity: usize,
}

impl ContactBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: (0..capacity).map(|_| OnceLock::new()).collect(),
            count: AtomicUsize::new(0),
            capacity,
        }
    }

    /// Reserves the next slot and writes `contact` into it. Safe to call
    /// concurrently from many threads. Returns `false` without writing
    /// anything if the buffer is already full.
    pub fn push(&self, contact: ContactConstraint) -> bool {
        let idx = self.count.fetch_add(1, Ordering::Relaxed);
        if idx >= self.capacity {
            return false;
        }
        self.slots[idx]
            .set(contact)
            .unwrap_or_else(|_| panic!("contact slot {idx} written twice"));
        true
    }

    pub fn len(&self) -> usize { self.count.load(Ordering::Relaxed).min(self.capacity) }
    pub fn is_empty(&self) -> bool { self.len() == 0 }
    pub fn capacity(&self) -> usize { self.capacity }

    /// Takes every written contact and resets the buffer for the next step.
    pub fn drain(&mut self) -> Vec<ContactConstraint> {
        let n = self.len();
        self.count.store(0, Ordering::Relaxed);
        (0..n)
            .map(|i| self.slots[i].take().expect("contact slot counted but not written"))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Vec3;

    fn dummy(i: u32) -> ContactConstraint {
        ContactConstraint {
            entity_a: EntityId::new(i, 0),
            entity_b: EntityId::new(i + 1, 0),
            manifold: Manifold::single(Vec3::Z, Vec3::ZERO, 0.1),
        }
    }

    #[test]
    fn push_past_capacity_reports_failure_without_panicking() {
        let buf = ContactBuffer::new(2);
        assert!(buf.push(dummy(0)));
        assert!(buf.push(dummy(1)));
        assert!(!buf.push(dummy(2)));
        assert_eq!(buf.len(), 2);
    }

    #[test]
    fn drain_resets_buffer_for_reuse() {
        let mut buf = ContactBuffer::new(4);
        buf.push(dummy(0));
        buf.push(dummy(1));
        let drained = buf.drain();
        assert_eq!(drained.len(), 2);
        assert_eq!(buf.len(), 0);
        assert!(buf.push(dummy(2)));
    }
}
