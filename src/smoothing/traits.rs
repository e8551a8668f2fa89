//! Smoothing strategy trait.

use crate::{TrajectoryWindow, Transform};

/// Trait for trajectory smoothing policies.
///
/// A smoother consumes raw per-frame transforms in arrival order and, once
/// at least one transform has been observed, produces one smoothed
/// transform per emitted frame.
pub trait Smoother: Send {
    /// Feed the raw transform estimated for the newest frame pair.
    fn observe(&mut self, raw: Transform);

    /// Smoothed transform to apply to the frame currently being emitted.
    ///
    /// Returns `None` when no raw transform has been observed yet; the
    /// orchestrator guarantees at least one observation before smoothing.
    fn smooth(&mut self) -> Option<Transform>;

    /// The shared trajectory window backing this policy.
    fn window(&self) -> &TrajectoryWindow;

    /// Drop all per-stream state.
    fn reset(&mut self);
}
