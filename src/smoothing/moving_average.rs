//! Moving-average smoothing policy.

use super::traits::Smoother;
use crate::{TrajectoryWindow, Transform};

/// Windowed arithmetic-mean smoother.
///
/// The smoothed transform is the per-component mean of the trajectory
/// window. Because the window trails the newest frame while the emitted
/// frame is the oldest buffered one, the mean lags and leads symmetrically
/// around the frame being corrected.
#[derive(Debug, Clone)]
pub struct MovingAverageSmoother {
    window: TrajectoryWindow,
}

impl MovingAverageSmoother {
    /// Create a smoother with the given window capacity (smoothing radius).
    pub fn new(radius: usize) -> Self {
        Self {
            window: TrajectoryWindow::new(radius),
        }
    }
}

impl Smoother for MovingAverageSmoother {
    fn observe(&mut self, raw: Transform) {
        self.window.push(raw);
    }

    fn smooth(&mut self) -> Option<Transform> {
        self.window.mean()
    }

    fn window(&self) -> &TrajectoryWindow {
        &self.window
    }

    fn reset(&mut self) {
        self.window.clear();
    }
}
