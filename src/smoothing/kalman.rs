//! Predictive-filter smoothing policy.
//!
//! A constant-velocity Kalman filter over the camera motion state,
//! corrected by each raw transform and re-centered with the window mean
//! when a smoothed transform is requested.

use nalgebra::{Matrix3, Matrix3x6, Matrix6, Vector3, Vector6};

use super::traits::Smoother;
use crate::{TrajectoryWindow, Transform};

/// Kalman filter over the six-dimensional camera motion state
/// `(x, y, a, vx, vy, va)`.
///
/// The state propagates under a constant-velocity model and is corrected by
/// raw `(dx, dy, da)` measurements. Process and measurement noise are fixed
/// scalars set at construction; they are never re-estimated at runtime.
#[derive(Debug, Clone)]
pub struct MotionKalman {
    /// State vector, positions then velocities.
    x: Vector6<f64>,
    /// State covariance.
    p: Matrix6<f64>,
    /// State transition matrix (constant velocity).
    f: Matrix6<f64>,
    /// Measurement matrix, observes positions only.
    h: Matrix3x6<f64>,
    /// Process noise covariance.
    q: Matrix6<f64>,
    /// Measurement noise covariance.
    r: Matrix3<f64>,
}

impl MotionKalman {
    /// Create a filter with the given scalar noise covariances.
    pub fn new(process_noise: f64, measurement_noise: f64) -> Self {
        // F couples each position to its velocity with a unit time step.
        let mut f = Matrix6::identity();
        for i in 0..3 {
            f[(i, i + 3)] = 1.0;
        }

        let mut h = Matrix3x6::zeros();
        for i in 0..3 {
            h[(i, i)] = 1.0;
        }

        Self {
            x: Vector6::zeros(),
            p: Matrix6::identity(),
            f,
            h,
            q: Matrix6::identity() * process_noise,
            r: Matrix3::identity() * measurement_noise,
        }
    }

    /// Advance the state one step and return the predicted motion.
    pub fn predict(&mut self) -> Transform {
        self.x = self.f * self.x;
        self.p = self.f * self.p * self.f.transpose() + self.q;
        self.state()
    }

    /// Correct the state with a raw transform measurement.
    pub fn correct(&mut self, measurement: &Transform) {
        let z = Vector3::new(measurement.dx, measurement.dy, measurement.da);

        let y = z - self.h * self.x;
        let s = self.h * self.p * self.h.transpose() + self.r;
        let si = s.try_inverse().unwrap_or_else(Matrix3::identity);
        let k = self.p * self.h.transpose() * si;

        self.x += k * y;
        self.p = (Matrix6::identity() - k * self.h) * self.p;
    }

    /// Position part of the current state.
    pub fn state(&self) -> Transform {
        Transform::new(self.x[0], self.x[1], self.x[2])
    }

    /// Return the filter to its initial state.
    pub fn reset(&mut self) {
        self.x = Vector6::zeros();
        self.p = Matrix6::identity();
    }
}

/// Predictive smoother: Kalman prediction plus window-mean re-centering.
///
/// Each raw transform corrects the filter; when a smoothed transform is
/// requested the filter predicts one step ahead and the arithmetic mean of
/// the trajectory window is added to the prediction, which keeps the output
/// anchored to the recent raw motion and avoids drift. Algorithmically this
/// policy needs only one frame of lookahead, but it runs behind the same
/// frame buffer as the moving average so both policies expose the same
/// empty/filling/full interface.
#[derive(Debug, Clone)]
pub struct KalmanSmoother {
    filter: MotionKalman,
    window: TrajectoryWindow,
}

impl KalmanSmoother {
    /// Create a smoother with the given window capacity and noise levels.
    pub fn new(radius: usize, process_noise: f64, measurement_noise: f64) -> Self {
        Self {
            filter: MotionKalman::new(process_noise, measurement_noise),
            window: TrajectoryWindow::new(radius),
        }
    }
}

impl Smoother for KalmanSmoother {
    fn observe(&mut self, raw: Transform) {
        self.window.push(raw);
        self.filter.correct(&raw);
    }

    fn smooth(&mut self) -> Option<Transform> {
        let mean = self.window.mean()?;
        let predicted = self.filter.predict();
        Some(predicted.add(&mean))
    }

    fn window(&self) -> &TrajectoryWindow {
        &self.window
    }

    fn reset(&mut self) {
        self.filter.reset();
        self.window.clear();
    }
}
