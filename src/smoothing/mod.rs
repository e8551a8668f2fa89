//! Trajectory smoothing policies.
//!
//! Two interchangeable strategies are provided behind one interface:
//!
//! - `MovingAverageSmoother` - windowed arithmetic mean of the raw
//!   trajectory
//! - `KalmanSmoother` - constant-velocity predictive filter re-centered by
//!   the window mean
//!
//! The policy is selected at configuration time via [`SmootherKind`].

mod traits;
mod moving_average;
mod kalman;
mod dispatch;

pub use traits::Smoother;
pub use moving_average::MovingAverageSmoother;
pub use kalman::{KalmanSmoother, MotionKalman};
pub use dispatch::{SmootherEnum, SmootherKind};
