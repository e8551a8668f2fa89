//! Trajectory store: a bounded sliding window of raw per-frame transforms.

use std::collections::VecDeque;

use crate::Transform;

/// Ordered window of the most recent raw transforms.
///
/// Holds at most `capacity` (the smoothing radius W) transforms; appending
/// past capacity drops the oldest. Both smoothing policies read from this
/// window, so the invariant `len <= capacity` is what bounds the memory of
/// the smoothing stage.
#[derive(Debug, Clone)]
pub struct TrajectoryWindow {
    transforms: VecDeque<Transform>,
    capacity: usize,
}

impl TrajectoryWindow {
    /// Create a window with the given capacity.
    pub fn new(capacity: usize) -> Self {
        Self {
            transforms: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a raw transform, evicting the oldest when at capacity.
    pub fn push(&mut self, transform: Transform) {
        if self.transforms.len() >= self.capacity {
            self.transforms.pop_front();
        }
        self.transforms.push_back(transform);
    }

    /// Arithmetic mean of the window, per component.
    ///
    /// The mean of an empty window is undefined; callers must have observed
    /// at least one raw transform first.
    pub fn mean(&self) -> Option<Transform> {
        if self.transforms.is_empty() {
            return None;
        }

        let n = self.transforms.len() as f64;
        let mut sum = Transform::identity();
        for t in &self.transforms {
            sum.dx += t.dx;
            sum.dy += t.dy;
            sum.da += t.da;
        }

        Some(Transform::new(sum.dx / n, sum.dy / n, sum.da / n))
    }

    /// Number of transforms currently held.
    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    /// True when no transform has been observed yet.
    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }

    /// Configured capacity (the smoothing radius).
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drop all observed transforms.
    pub fn clear(&mut self) {
        self.transforms.clear();
    }
}
