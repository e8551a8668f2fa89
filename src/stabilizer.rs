//! Pipeline orchestrator: drives estimation, smoothing, border management
//! and layering per input frame, with a fixed output delay of one smoothing
//! window.

use std::path::PathBuf;

use tracing::{debug, info, trace};

use crate::border::{BorderManager, BorderOptions};
use crate::buffer::{BufferState, FrameQueue};
use crate::layering::LayerStrategy;
use crate::motion::MotionEstimator;
use crate::smoothing::{SmootherEnum, SmootherKind};
use crate::translog::TransformLog;
use crate::vision::{tracker_by_name, FeatureTracker};
use crate::{CornerEnvelope, Error, Frame, Result, Transform};

/// Lifecycle of a stabilization stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    /// No frame seen yet.
    Uninitialized,
    /// Accumulating lookahead; frames pass through unstabilized.
    Filling,
    /// Buffer full; one stabilized frame emitted per call.
    Steady,
    /// Input exhausted, buffered frames partially drained.
    Draining,
    /// Stream fully drained.
    Done,
}

/// Stabilizer configuration.
///
/// Invalid values are rejected by [`Stabilizer::new`] before any frame is
/// processed. The one documented exception to strict validation is the
/// border-type name, which [`crate::BorderMode::from_name`] maps to the
/// black mode when unrecognized.
#[derive(Debug, Clone)]
pub struct StabilizerConfig {
    /// Smoothing window size W; also the output latency in frames.
    pub smoothing_radius: usize,

    /// Smoothing policy.
    pub smoother: SmootherKind,

    /// Border, crop and warp options.
    pub border: BorderOptions,

    /// Layering applied to emitted frames.
    pub layering: LayerStrategy,

    /// Stop ingesting after this many frames, if set.
    pub max_frames: Option<u64>,

    /// Write a `dx, dy, dtheta` line per processed frame to this path.
    pub log_path: Option<PathBuf>,

    /// Keypoint/tracking method name resolved via
    /// [`tracker_by_name`](crate::vision::tracker_by_name).
    pub tracking_method: String,
}

impl Default for StabilizerConfig {
    fn default() -> Self {
        Self {
            smoothing_radius: 25,
            smoother: SmootherKind::default(),
            border: BorderOptions::default(),
            layering: LayerStrategy::default(),
            max_frames: None,
            log_path: None,
            tracking_method: "gftt".to_string(),
        }
    }
}

impl StabilizerConfig {
    /// Configuration with the given smoothing radius and stock defaults.
    pub fn with_radius(smoothing_radius: usize) -> Self {
        Self {
            smoothing_radius,
            ..Self::default()
        }
    }

    fn validate(&self) -> Result<()> {
        if self.smoothing_radius == 0 {
            return Err(Error::InvalidConfig(
                "smoothing_radius must be at least 1".to_string(),
            ));
        }

        if let SmootherKind::Kalman {
            process_noise,
            measurement_noise,
        } = self.smoother
        {
            if process_noise <= 0.0 || measurement_noise <= 0.0 {
                return Err(Error::InvalidConfig(
                    "Kalman noise covariances must be positive".to_string(),
                ));
            }
        }

        if let LayerStrategy::Blend { alpha } = self.layering {
            if !(alpha > 0.0 && alpha <= 1.0) {
                return Err(Error::InvalidConfig(format!(
                    "blend alpha must be in (0, 1], got {}",
                    alpha
                )));
            }
        }

        if self.max_frames == Some(0) {
            return Err(Error::InvalidConfig(
                "max_frames must be positive when set".to_string(),
            ));
        }

        Ok(())
    }
}

/// One emitted frame, bound to the index of the input it corresponds to.
#[derive(Debug, Clone)]
pub struct StabilizedFrame {
    /// Index the frame was assigned at ingestion.
    pub index: u64,
    /// The output image.
    pub frame: Frame,
    /// False while the buffer is filling and the input passes through
    /// unstabilized.
    pub stabilized: bool,
}

/// Video stabilization pipeline.
///
/// Single-owner, synchronous and pull-based: the caller drives it one
/// input frame at a time and receives at most one output frame per call.
/// Stabilized outputs are emitted in strictly increasing input order, each
/// bound to its original index. The estimator state, trajectory window and
/// frame buffer are mutated in a strict per-call sequence, so concurrent
/// callers must serialize whole calls; the type is `Send` but deliberately
/// carries no internal lock.
pub struct Stabilizer {
    config: StabilizerConfig,
    queue: FrameQueue,
    motion: MotionEstimator,
    smoother: SmootherEnum,
    border: BorderManager,
    envelope: CornerEnvelope,
    previous_output: Option<Frame>,
    log: Option<TransformLog>,
    drained: bool,
}

impl Stabilizer {
    /// Create a pipeline with the backend named by the configuration.
    pub fn new(config: StabilizerConfig) -> Result<Self> {
        let tracker = tracker_by_name(&config.tracking_method)?;
        Self::with_tracker(config, tracker)
    }

    /// Create a pipeline over a caller-supplied tracking backend.
    pub fn with_tracker(config: StabilizerConfig, tracker: Box<dyn FeatureTracker>) -> Result<Self> {
        config.validate()?;

        // A finite source shorter than the window needs no more lookahead
        // than it has frames.
        let capacity = match config.max_frames {
            Some(max) => config.smoothing_radius.min(max as usize),
            None => config.smoothing_radius,
        };

        let log = match &config.log_path {
            Some(path) => Some(TransformLog::create(path)?),
            None => None,
        };

        Ok(Self {
            queue: FrameQueue::new(capacity),
            motion: MotionEstimator::new(tracker),
            smoother: config.smoother.create(config.smoothing_radius),
            border: BorderManager::new(config.border),
            envelope: CornerEnvelope::default(),
            previous_output: None,
            log,
            drained: false,
            config,
        })
    }

    /// The configuration this pipeline was built with.
    pub fn config(&self) -> &StabilizerConfig {
        &self.config
    }

    /// Current lifecycle state.
    pub fn state(&self) -> PipelineState {
        if self.drained {
            if self.queue.is_empty() {
                PipelineState::Done
            } else {
                PipelineState::Draining
            }
        } else {
            match self.queue.state() {
                BufferState::Empty => PipelineState::Uninitialized,
                BufferState::Filling => PipelineState::Filling,
                BufferState::Full => PipelineState::Steady,
            }
        }
    }

    /// Corner displacement envelope accumulated so far.
    pub fn envelope(&self) -> &CornerEnvelope {
        &self.envelope
    }

    /// Number of frames currently held for lookahead.
    pub fn frames_buffered(&self) -> usize {
        self.queue.len()
    }

    /// Process one input frame.
    ///
    /// Returns the raw input during the filling phase, a stabilized frame
    /// once the window is full, and `None` for the no-op cases (empty
    /// input frame, frame budget exhausted). Feeding a stream that was
    /// already flushed is a contract error.
    pub fn stabilize(&mut self, frame: Frame) -> Result<Option<StabilizedFrame>> {
        if self.drained {
            return Err(Error::StreamDrained);
        }

        // An unreadable frame must not corrupt buffer state: nothing is
        // pushed and nothing is returned.
        if frame.is_empty() {
            return Ok(None);
        }

        if let Some(max) = self.config.max_frames {
            if self.queue.ingested() >= max {
                return Ok(None);
            }
        }

        match self.queue.state() {
            BufferState::Empty => {
                self.motion.initialize(&frame);
                info!(
                    width = frame.width(),
                    height = frame.height(),
                    radius = self.config.smoothing_radius,
                    "stream initialized"
                );
                let (index, _) = self.queue.push(frame.clone());
                Ok(Some(StabilizedFrame {
                    index,
                    frame,
                    stabilized: false,
                }))
            }
            BufferState::Filling => {
                let raw = self.motion.estimate(&frame);
                self.observe(&raw, frame.width(), frame.height())?;
                let (index, _) = self.queue.push(frame.clone());
                trace!(index, "buffer filling, passing input through");
                Ok(Some(StabilizedFrame {
                    index,
                    frame,
                    stabilized: false,
                }))
            }
            BufferState::Full => {
                let raw = self.motion.estimate(&frame);
                self.observe(&raw, frame.width(), frame.height())?;

                let (input_index, evicted) = self.queue.push(frame);
                let (index, oldest) = evicted.ok_or(Error::EmptyBuffer)?;

                let output = self.emit(index, oldest)?;
                trace!(input = input_index, output = index, "stabilized frame emitted");
                Ok(Some(output))
            }
        }
    }

    /// Drain the frames still buffered at end of stream.
    ///
    /// Each remaining frame gets the best-available smoothed transform
    /// (for the moving average, the mean of whatever remains in the
    /// trajectory window). Afterwards the stream is [`PipelineState::Done`]
    /// and only [`reset`](Self::reset) can start a new one.
    pub fn flush(&mut self) -> Result<Vec<StabilizedFrame>> {
        self.drained = true;
        debug!(remaining = self.queue.len(), "draining buffered frames");

        let mut outputs = Vec::with_capacity(self.queue.len());
        while !self.queue.is_empty() {
            let (index, frame) = self.queue.pop_oldest()?;

            // A single-frame stream never produced a raw transform; the
            // frame has no motion to correct.
            if self.smoother.window().is_empty() {
                outputs.push(StabilizedFrame {
                    index,
                    frame,
                    stabilized: true,
                });
                continue;
            }

            outputs.push(self.emit(index, frame)?);
        }

        if let Some(log) = &mut self.log {
            log.flush()?;
        }

        Ok(outputs)
    }

    /// Clear all per-stream state so the pipeline can take a new stream.
    pub fn reset(&mut self) {
        self.queue.clear();
        self.smoother.reset();
        self.motion.reset();
        self.envelope = CornerEnvelope::default();
        self.previous_output = None;
        self.drained = false;
    }

    fn observe(&mut self, raw: &Transform, width: u32, height: u32) -> Result<()> {
        self.smoother.observe(*raw);
        self.envelope.observe(raw, width, height);
        if let Some(log) = &mut self.log {
            log.record(raw)?;
        }
        Ok(())
    }

    fn emit(&mut self, index: u64, frame: Frame) -> Result<StabilizedFrame> {
        let smoothed = self.smoother.smooth().ok_or_else(|| {
            Error::TransformError("smoothing requested before any raw transform".to_string())
        })?;

        let corrected = self.border.apply(&frame, &smoothed, &self.envelope)?;

        let output = if self.config.layering.is_none() {
            corrected
        } else {
            let layered = self
                .config
                .layering
                .apply(&corrected, self.previous_output.as_ref());
            self.previous_output = Some(layered.clone());
            layered
        };

        Ok(StabilizedFrame {
            index,
            frame: output,
            stabilized: true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vision::{Keypoint, TrackedPoint};
    use image::{GrayImage, Luma};
    use nalgebra::Point2;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Backend double that replays a scripted sequence of transforms.
    struct ScriptedTracker {
        script: Mutex<VecDeque<Transform>>,
    }

    impl ScriptedTracker {
        fn new(transforms: &[Transform]) -> Box<Self> {
            Box::new(Self {
                script: Mutex::new(transforms.iter().copied().collect()),
            })
        }

        fn identity() -> Box<Self> {
            Self::new(&[])
        }
    }

    impl FeatureTracker for ScriptedTracker {
        fn enhance(&self, gray: &GrayImage) -> GrayImage {
            gray.clone()
        }

        fn detect(&self, _gray: &GrayImage) -> Vec<Keypoint> {
            (0..8).map(|i| Point2::new(i as f32 * 7.0, 3.0)).collect()
        }

        fn track(
            &self,
            _previous: &GrayImage,
            _current: &GrayImage,
            points: &[Keypoint],
        ) -> Vec<TrackedPoint> {
            points
                .iter()
                .map(|&p| TrackedPoint {
                    position: p,
                    valid: true,
                })
                .collect()
        }

        fn fit_transform(&self, _p: &[Keypoint], _c: &[Keypoint]) -> Option<Transform> {
            let mut script = self.script.lock().unwrap();
            Some(script.pop_front().unwrap_or_default())
        }
    }

    fn frame(value: u8) -> Frame {
        Frame::from_gray(GrayImage::from_pixel(20, 16, Luma([value])))
    }

    fn config(radius: usize) -> StabilizerConfig {
        StabilizerConfig::with_radius(radius)
    }

    // ===== Configuration Tests =====

    #[test]
    fn test_default_config_is_valid() {
        assert!(Stabilizer::new(StabilizerConfig::default()).is_ok());
    }

    #[test]
    fn test_zero_radius_rejected() {
        let err = Stabilizer::new(config(0)).err().unwrap();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn test_bad_blend_alpha_rejected() {
        let mut cfg = config(5);
        cfg.layering = LayerStrategy::Blend { alpha: 1.5 };
        assert!(matches!(
            Stabilizer::new(cfg),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_bad_kalman_noise_rejected() {
        let mut cfg = config(5);
        cfg.smoother = SmootherKind::Kalman {
            process_noise: 0.0,
            measurement_noise: 0.1,
        };
        assert!(matches!(
            Stabilizer::new(cfg),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_unknown_tracking_method_rejected() {
        let mut cfg = config(5);
        cfg.tracking_method = "_bad_method".to_string();
        assert!(matches!(
            Stabilizer::new(cfg),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_zero_max_frames_rejected() {
        let mut cfg = config(5);
        cfg.max_frames = Some(0);
        assert!(matches!(
            Stabilizer::new(cfg),
            Err(Error::InvalidConfig(_))
        ));
    }

    // ===== State Machine Tests =====

    #[test]
    fn test_state_progression() {
        let mut stab = Stabilizer::with_tracker(config(3), ScriptedTracker::identity()).unwrap();
        assert_eq!(stab.state(), PipelineState::Uninitialized);

        stab.stabilize(frame(0)).unwrap();
        assert_eq!(stab.state(), PipelineState::Filling);

        stab.stabilize(frame(1)).unwrap();
        assert_eq!(stab.state(), PipelineState::Filling);

        stab.stabilize(frame(2)).unwrap();
        assert_eq!(stab.state(), PipelineState::Steady);

        stab.stabilize(frame(3)).unwrap();
        assert_eq!(stab.state(), PipelineState::Steady);

        stab.flush().unwrap();
        assert_eq!(stab.state(), PipelineState::Done);
    }

    #[test]
    fn test_filling_passes_input_through_unmodified() {
        let mut stab = Stabilizer::with_tracker(config(3), ScriptedTracker::identity()).unwrap();

        for value in [10u8, 20, 30] {
            let out = stab.stabilize(frame(value)).unwrap().unwrap();
            assert!(!out.stabilized);
            assert_eq!(out.frame.gray(), frame(value).gray());
        }
    }

    #[test]
    fn test_steady_emits_oldest_frame_with_its_index() {
        let mut stab = Stabilizer::with_tracker(config(3), ScriptedTracker::identity()).unwrap();

        for value in 0..3u8 {
            stab.stabilize(frame(value)).unwrap();
        }

        // The 4th input evicts and emits frame 0.
        let out = stab.stabilize(frame(3)).unwrap().unwrap();
        assert!(out.stabilized);
        assert_eq!(out.index, 0);
        assert_eq!(stab.frames_buffered(), 3);

        let out = stab.stabilize(frame(4)).unwrap().unwrap();
        assert_eq!(out.index, 1);
    }

    #[test]
    fn test_empty_frame_is_a_noop() {
        let mut stab = Stabilizer::with_tracker(config(3), ScriptedTracker::identity()).unwrap();
        stab.stabilize(frame(0)).unwrap();

        let out = stab.stabilize(Frame::empty()).unwrap();
        assert!(out.is_none());
        assert_eq!(stab.frames_buffered(), 1);
        assert_eq!(stab.state(), PipelineState::Filling);
    }

    #[test]
    fn test_identity_motion_emits_input_pixels() {
        // All-zero raw transforms with zero border: the stabilized frame
        // equals the input pixel for pixel.
        let mut stab = Stabilizer::with_tracker(config(2), ScriptedTracker::identity()).unwrap();
        stab.stabilize(frame(5)).unwrap();
        stab.stabilize(frame(6)).unwrap();

        let out = stab.stabilize(frame(7)).unwrap().unwrap();
        assert!(out.stabilized);
        assert_eq!(out.frame.rgba(), frame(5).rgba());
    }

    // ===== Draining Tests =====

    #[test]
    fn test_flush_emits_every_buffered_frame() {
        let mut stab = Stabilizer::with_tracker(config(4), ScriptedTracker::identity()).unwrap();
        for value in 0..6u8 {
            stab.stabilize(frame(value)).unwrap();
        }
        assert_eq!(stab.frames_buffered(), 4);

        let drained = stab.flush().unwrap();
        assert_eq!(drained.len(), 4);
        let indices: Vec<u64> = drained.iter().map(|f| f.index).collect();
        assert_eq!(indices, vec![2, 3, 4, 5]);
        assert!(drained.iter().all(|f| f.stabilized));
        assert_eq!(stab.state(), PipelineState::Done);
    }

    #[test]
    fn test_stabilize_after_flush_is_an_error() {
        let mut stab = Stabilizer::with_tracker(config(2), ScriptedTracker::identity()).unwrap();
        stab.stabilize(frame(0)).unwrap();
        stab.flush().unwrap();

        assert!(matches!(
            stab.stabilize(frame(1)),
            Err(Error::StreamDrained)
        ));
    }

    #[test]
    fn test_single_frame_stream_drains_cleanly() {
        let mut stab = Stabilizer::with_tracker(config(5), ScriptedTracker::identity()).unwrap();
        stab.stabilize(frame(9)).unwrap();

        let drained = stab.flush().unwrap();
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].index, 0);
    }

    #[test]
    fn test_reset_starts_a_new_stream() {
        let mut stab = Stabilizer::with_tracker(config(2), ScriptedTracker::identity()).unwrap();
        stab.stabilize(frame(0)).unwrap();
        stab.flush().unwrap();

        stab.reset();
        assert_eq!(stab.state(), PipelineState::Uninitialized);
        let out = stab.stabilize(frame(1)).unwrap().unwrap();
        assert_eq!(out.index, 0);
    }

    // ===== Frame Budget Tests =====

    #[test]
    fn test_max_frames_stops_ingestion() {
        let mut cfg = config(2);
        cfg.max_frames = Some(3);
        let mut stab = Stabilizer::with_tracker(cfg, ScriptedTracker::identity()).unwrap();

        assert!(stab.stabilize(frame(0)).unwrap().is_some());
        assert!(stab.stabilize(frame(1)).unwrap().is_some());
        assert!(stab.stabilize(frame(2)).unwrap().is_some());
        // Budget exhausted: ignored without error.
        assert!(stab.stabilize(frame(3)).unwrap().is_none());
    }

    #[test]
    fn test_capacity_shrinks_to_short_source() {
        let mut cfg = config(30);
        cfg.max_frames = Some(4);
        let stab = Stabilizer::with_tracker(cfg, ScriptedTracker::identity()).unwrap();
        assert_eq!(stab.queue.capacity(), 4);
    }

    // ===== Smoothing Integration Tests =====

    #[test]
    fn test_scripted_transforms_are_averaged() {
        // Radius 3, raw transforms (1,0,0), (2,0,0), (3,0,0): the first
        // stabilized frame is corrected by the window mean (2,0,0).
        let script = [
            Transform::new(1.0, 0.0, 0.0),
            Transform::new(2.0, 0.0, 0.0),
            Transform::new(3.0, 0.0, 0.0),
        ];
        let mut stab =
            Stabilizer::with_tracker(config(3), ScriptedTracker::new(&script)).unwrap();

        stab.stabilize(frame(0)).unwrap();
        stab.stabilize(frame(1)).unwrap();
        stab.stabilize(frame(2)).unwrap();
        let out = stab.stabilize(frame(3)).unwrap().unwrap();

        assert!(out.stabilized);
        assert_eq!(out.index, 0);
        // The window mean is a pure 2 px x-shift; a uniform gray frame is
        // shift-invariant away from the revealed left column.
        let rgba = out.frame.rgba();
        assert_eq!(rgba.get_pixel(0, 0).0[3], 0, "revealed edge is transparent");
        assert_eq!(rgba.get_pixel(5, 5).0[0], frame(0).rgba().get_pixel(5, 5).0[0]);
    }

    #[test]
    fn test_envelope_accumulates_from_raw_transforms() {
        let script = [Transform::new(4.0, -2.0, 0.0), Transform::new(-1.0, 5.0, 0.0)];
        let mut stab =
            Stabilizer::with_tracker(config(4), ScriptedTracker::new(&script)).unwrap();

        stab.stabilize(frame(0)).unwrap();
        stab.stabilize(frame(1)).unwrap();
        stab.stabilize(frame(2)).unwrap();

        let envelope = stab.envelope();
        assert_eq!(envelope.max_x, 4.0);
        assert_eq!(envelope.min_y, -2.0);
        assert_eq!(envelope.min_x, -1.0);
        assert_eq!(envelope.max_y, 5.0);
    }

    // ===== Transform Log Tests =====

    #[test]
    fn test_transform_log_records_processed_frames() {
        let path = std::env::temp_dir().join("stabilize_rs_stabilizer_log_test.txt");
        let mut cfg = config(2);
        cfg.log_path = Some(path.clone());

        let script = [Transform::new(1.0, 2.0, 0.0), Transform::new(3.0, 4.0, 0.0)];
        let mut stab = Stabilizer::with_tracker(cfg, ScriptedTracker::new(&script)).unwrap();

        stab.stabilize(frame(0)).unwrap();
        stab.stabilize(frame(1)).unwrap();
        stab.stabilize(frame(2)).unwrap();
        stab.flush().unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "1, 2, 0");
        assert_eq!(lines[1], "3, 4, 0");

        std::fs::remove_file(&path).ok();
    }
}
