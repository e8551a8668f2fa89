//! Motion estimator: turns consecutive frames into raw planar transforms.

use image::GrayImage;
use tracing::debug;

use crate::vision::{FeatureTracker, Keypoint};
use crate::{Frame, Transform};

/// Minimum valid correspondence pairs required to fit a transform.
pub const MIN_CORRESPONDENCES: usize = 4;

/// Estimates inter-frame camera motion from tracked keypoints.
///
/// Owns the persisted tracking state (previous grayscale image and keypoint
/// set) and drives the [`FeatureTracker`] collaborator once per frame:
/// convert to grayscale, enhance contrast, track the previous keypoints,
/// keep the valid correspondences, fit a transform, then re-detect a fresh
/// keypoint set for the next call. Re-detection replaces the old set
/// outright so tracking quality does not degrade as points drift off
/// frame.
pub struct MotionEstimator {
    tracker: Box<dyn FeatureTracker>,
    previous_gray: Option<GrayImage>,
    previous_keypoints: Vec<Keypoint>,
}

impl MotionEstimator {
    /// Create an estimator over the given tracking backend.
    pub fn new(tracker: Box<dyn FeatureTracker>) -> Self {
        Self {
            tracker,
            previous_gray: None,
            previous_keypoints: Vec::new(),
        }
    }

    /// Seed the tracking state from the first frame of a stream.
    ///
    /// No transform exists for frame zero; this only detects keypoints on
    /// the contrast-enhanced grayscale conversion and persists it.
    pub fn initialize(&mut self, frame: &Frame) {
        let gray = self.tracker.enhance(&frame.gray());
        self.previous_keypoints = self.tracker.detect(&gray);
        self.previous_gray = Some(gray);
    }

    /// Estimate the raw transform from the previous frame to this one.
    ///
    /// Fewer than [`MIN_CORRESPONDENCES`] valid correspondences is the
    /// degenerate-tracking condition: the identity transform is substituted
    /// for that frame pair and no error is raised. Calling before
    /// [`initialize`](Self::initialize) seeds the state and returns the
    /// identity.
    pub fn estimate(&mut self, frame: &Frame) -> Transform {
        let Some(previous_gray) = self.previous_gray.take() else {
            self.initialize(frame);
            return Transform::identity();
        };

        let gray = self.tracker.enhance(&frame.gray());
        let tracked = self
            .tracker
            .track(&previous_gray, &gray, &self.previous_keypoints);

        // Keep only correspondences the tracker reports as matched.
        let mut matched_previous = Vec::with_capacity(tracked.len());
        let mut matched_current = Vec::with_capacity(tracked.len());
        for (origin, result) in self.previous_keypoints.iter().zip(&tracked) {
            if result.valid {
                matched_previous.push(*origin);
                matched_current.push(result.position);
            }
        }

        let transform = if matched_previous.len() >= MIN_CORRESPONDENCES {
            self.tracker
                .fit_transform(&matched_previous, &matched_current)
                .unwrap_or_else(|| {
                    debug!(
                        pairs = matched_previous.len(),
                        "transform fit failed, substituting identity"
                    );
                    Transform::identity()
                })
        } else {
            debug!(
                pairs = matched_previous.len(),
                "degenerate tracking, substituting identity"
            );
            Transform::identity()
        };

        // Fresh detection replaces the old set, never merges with it.
        self.previous_keypoints = self.tracker.detect(&gray);
        self.previous_gray = Some(gray);

        transform
    }

    /// Whether the first frame has been seen.
    pub fn is_initialized(&self) -> bool {
        self.previous_gray.is_some()
    }

    /// Drop the persisted tracking state.
    pub fn reset(&mut self) {
        self.previous_gray = None;
        self.previous_keypoints.clear();
    }
}
