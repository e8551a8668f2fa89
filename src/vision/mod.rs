//! Feature tracking collaborator.
//!
//! The stabilization pipeline delegates its low-level computer-vision work
//! (contrast enhancement, corner detection, sparse optical flow, robust
//! transform fitting) to an implementation of [`FeatureTracker`]. A
//! pure-Rust [`SoftwareTracker`] is included so the pipeline runs without
//! external CV libraries; any other backend can be plugged in behind the
//! same trait.

mod software;

pub use software::SoftwareTracker;

use image::GrayImage;
use nalgebra::Point2;

use crate::{Error, Result, Transform};

/// Image-space keypoint.
pub type Keypoint = Point2<f32>;

/// Result of tracking one keypoint into the next frame.
#[derive(Debug, Clone, Copy)]
pub struct TrackedPoint {
    /// Position in the current frame. Unreliable when `valid` is false.
    pub position: Keypoint,
    /// Whether the tracker considers the correspondence trustworthy.
    pub valid: bool,
}

/// Capability set consumed by the motion estimator.
///
/// Implementations must be deterministic for a given input pair; the
/// pipeline calls them once per frame in a strict sequence.
pub trait FeatureTracker: Send {
    /// Apply local contrast enhancement to a grayscale image.
    fn enhance(&self, gray: &GrayImage) -> GrayImage;

    /// Detect a fresh keypoint set on an enhanced grayscale image.
    fn detect(&self, gray: &GrayImage) -> Vec<Keypoint>;

    /// Track keypoints from the previous frame into the current one,
    /// reporting per-point validity.
    fn track(
        &self,
        previous: &GrayImage,
        current: &GrayImage,
        points: &[Keypoint],
    ) -> Vec<TrackedPoint>;

    /// Fit a robust planar transform from point correspondences.
    ///
    /// Requires at least 4 pairs; returns `None` when the input is
    /// degenerate. Only translation and rotation are retained.
    fn fit_transform(&self, previous: &[Keypoint], current: &[Keypoint]) -> Option<Transform>;
}

/// Resolve a keypoint/tracking method by its configuration name.
///
/// Unknown names are a configuration error.
pub fn tracker_by_name(name: &str) -> Result<Box<dyn FeatureTracker>> {
    match name.to_ascii_lowercase().as_str() {
        "gftt" => Ok(Box::new(SoftwareTracker::default())),
        other => Err(Error::InvalidConfig(format!(
            "unknown tracking method: {}",
            other
        ))),
    }
}
