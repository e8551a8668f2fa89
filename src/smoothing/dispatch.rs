//! Enum-based smoother dispatch.
//!
//! `SmootherKind` is the configuration-time selector; `SmootherEnum` wraps
//! the policy implementations so the orchestrator dispatches without a
//! vtable lookup in its per-frame hot path.

use super::kalman::KalmanSmoother;
use super::moving_average::MovingAverageSmoother;
use super::traits::Smoother;
use crate::{TrajectoryWindow, Transform};

/// Smoothing policy selector, chosen at configuration time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SmootherKind {
    /// Windowed arithmetic mean of the trajectory window.
    MovingAverage,
    /// Constant-velocity Kalman prediction re-centered by the window mean.
    Kalman {
        /// Scalar process noise covariance.
        process_noise: f64,
        /// Scalar measurement noise covariance.
        measurement_noise: f64,
    },
}

impl SmootherKind {
    /// Kalman variant with the stock noise levels.
    pub fn kalman() -> Self {
        SmootherKind::Kalman {
            process_noise: 1e-3,
            measurement_noise: 1e-1,
        }
    }

    /// Instantiate the selected policy for the given smoothing radius.
    pub fn create(&self, radius: usize) -> SmootherEnum {
        match *self {
            SmootherKind::MovingAverage => {
                SmootherEnum::MovingAverage(MovingAverageSmoother::new(radius))
            }
            SmootherKind::Kalman {
                process_noise,
                measurement_noise,
            } => SmootherEnum::Kalman(KalmanSmoother::new(
                radius,
                process_noise,
                measurement_noise,
            )),
        }
    }
}

impl Default for SmootherKind {
    fn default() -> Self {
        SmootherKind::MovingAverage
    }
}

/// Enum wrapper over the smoothing policies for static dispatch.
#[derive(Debug, Clone)]
pub enum SmootherEnum {
    MovingAverage(MovingAverageSmoother),
    Kalman(KalmanSmoother),
}

impl SmootherEnum {
    #[inline(always)]
    pub fn observe(&mut self, raw: Transform) {
        match self {
            SmootherEnum::MovingAverage(s) => s.observe(raw),
            SmootherEnum::Kalman(s) => s.observe(raw),
        }
    }

    #[inline(always)]
    pub fn smooth(&mut self) -> Option<Transform> {
        match self {
            SmootherEnum::MovingAverage(s) => s.smooth(),
            SmootherEnum::Kalman(s) => s.smooth(),
        }
    }

    #[inline(always)]
    pub fn window(&self) -> &TrajectoryWindow {
        match self {
            SmootherEnum::MovingAverage(s) => s.window(),
            SmootherEnum::Kalman(s) => s.window(),
        }
    }

    #[inline(always)]
    pub fn reset(&mut self) {
        match self {
            SmootherEnum::MovingAverage(s) => s.reset(),
            SmootherEnum::Kalman(s) => s.reset(),
        }
    }
}

impl Smoother for SmootherEnum {
    fn observe(&mut self, raw: Transform) {
        SmootherEnum::observe(self, raw)
    }

    fn smooth(&mut self) -> Option<Transform> {
        SmootherEnum::smooth(self)
    }

    fn window(&self) -> &TrajectoryWindow {
        SmootherEnum::window(self)
    }

    fn reset(&mut self) {
        SmootherEnum::reset(self)
    }
}
