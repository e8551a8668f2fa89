//! # stabilize-rs - Video Stabilization Library
//!
//! Sliding-window video stabilization: estimate inter-frame camera motion,
//! smooth the motion trajectory, and re-render each frame with a corrective
//! planar transform.
//!
//! ## Features
//!
//! - Bounded-latency frame buffer with a fixed output delay of one smoothing
//!   window
//! - Interchangeable smoothing policies: windowed moving average or a
//!   constant-velocity Kalman filter
//! - Border padding, warping and cropping with selectable edge-extension
//!   modes, auto-border cropping from the observed corner envelope, and
//!   optional crop-and-zoom compensation
//! - Optional frame layering (overlay or alpha blend) over the previous
//!   stabilized frame
//! - Pluggable feature tracking backend; a pure-Rust software backend is
//!   included
//!
//! ## Example
//!
//! ```rust,ignore
//! use stabilize_rs::{Frame, Stabilizer, StabilizerConfig};
//!
//! let config = StabilizerConfig::default();
//! let mut stabilizer = Stabilizer::new(config).unwrap();
//!
//! for frame in frames {
//!     if let Some(out) = stabilizer.stabilize(frame).unwrap() {
//!         sink.write(out.frame);
//!     }
//! }
//! // The last window of frames is held back until the stream is drained.
//! for out in stabilizer.flush().unwrap() {
//!     sink.write(out.frame);
//! }
//! ```

// Public modules
pub mod frame;
pub mod buffer;
pub mod transform;
pub mod trajectory;
pub mod smoothing;
pub mod motion;
pub mod border;
pub mod warp;
pub mod layering;
pub mod translog;
pub mod stabilizer;
pub mod vision;

// Re-exports for convenience
pub use frame::{ColorFormat, Frame};
pub use buffer::{BufferState, FrameQueue};
pub use transform::Transform;
pub use trajectory::TrajectoryWindow;
pub use smoothing::{Smoother, SmootherEnum, SmootherKind};
pub use motion::MotionEstimator;
pub use border::{BorderManager, BorderMode, BorderOptions, CornerEnvelope, MotionModel};
pub use layering::LayerStrategy;
pub use stabilizer::{PipelineState, StabilizedFrame, Stabilizer, StabilizerConfig};
pub use vision::{tracker_by_name, FeatureTracker, SoftwareTracker};

// Error types
pub use crate::error::{Error, Result};

mod error {
    use thiserror::Error;

    /// Errors that can occur in the stabilization pipeline
    #[derive(Error, Debug)]
    pub enum Error {
        #[error("Invalid configuration: {0}")]
        InvalidConfig(String),

        #[error("Invalid frame: {0}")]
        InvalidFrame(String),

        #[error("Popped an empty frame buffer")]
        EmptyBuffer,

        #[error("Stream already drained; call reset() to start a new stream")]
        StreamDrained,

        #[error("Transform error: {0}")]
        TransformError(String),

        #[error("IO error: {0}")]
        IoError(#[from] std::io::Error),
    }

    /// Result type for stabilization operations
    pub type Result<T> = std::result::Result<T, Error>;
}
