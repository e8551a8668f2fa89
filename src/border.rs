//! Border and crop management: padding, corrective warping and cropping
//! back, so the black edges a corrective warp introduces stay hidden.

use image::imageops::{self, FilterType};
use image::RgbaImage;
use tracing::warn;

use crate::{warp, Error, Frame, Result, Transform};

/// Edge-extension policy for padding and warping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BorderMode {
    /// Constant black (transparent in the alpha channel).
    Black,
    /// Mirror including the edge pixel.
    Reflect,
    /// Mirror excluding the edge pixel.
    Reflect101,
    /// Repeat the edge pixel.
    Replicate,
    /// Wrap around to the opposite edge.
    Wrap,
}

impl BorderMode {
    /// Parse a border-type name.
    ///
    /// Unrecognized names fall back to the black/constant mode; this is the
    /// one silent default the configuration layer allows.
    pub fn from_name(name: &str) -> BorderMode {
        match name.to_ascii_lowercase().as_str() {
            "black" => BorderMode::Black,
            "reflect" => BorderMode::Reflect,
            "reflect_101" => BorderMode::Reflect101,
            "replicate" => BorderMode::Replicate,
            "wrap" => BorderMode::Wrap,
            other => {
                warn!(border_type = other, "unrecognized border type, using black");
                BorderMode::Black
            }
        }
    }
}

/// Which matrix the corrective warp is synthesized as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MotionModel {
    /// 2x3 affine warp.
    #[default]
    Affine,
    /// 3x3 projective warp with perspective division.
    Projective,
}

/// Border configuration, fixed at configuration time.
#[derive(Debug, Clone, Copy)]
pub struct BorderOptions {
    /// Requested border size in pixels. Negative values request extra
    /// cropping instead of padding; see [`BorderOptions::functional`].
    pub border_size: i32,
    /// Edge-extension mode for padding and warping.
    pub mode: BorderMode,
    /// Crop using the observed corner envelope instead of the fixed
    /// original rectangle.
    pub auto_border: bool,
    /// After cropping, shrink further by the border size and rescale back
    /// to the source resolution.
    pub crop_and_zoom: bool,
    /// Warp matrix synthesis.
    pub motion_model: MotionModel,
}

impl Default for BorderOptions {
    fn default() -> Self {
        Self {
            border_size: 0,
            mode: BorderMode::Black,
            auto_border: false,
            crop_and_zoom: false,
            motion_model: MotionModel::Affine,
        }
    }
}

impl BorderOptions {
    /// Resolve the requested size into `(padding, crop offset)`.
    ///
    /// A non-negative request pads by that amount and crops back from the
    /// same offset. A negative request becomes 100 px of real padding plus
    /// a crop of `100 + |requested|` px from the padded frame, a net crop
    /// of `|requested|` px beyond the original edges.
    pub fn functional(&self) -> (u32, u32) {
        if self.border_size < 0 {
            (100, 100 + self.border_size.unsigned_abs())
        } else {
            (self.border_size as u32, 0)
        }
    }
}

/// Running envelope of how far the four frame corners have ever been
/// displaced by an applied transform.
///
/// The bounds only ever widen, so a crop derived from the envelope never
/// exposes a region left undefined by any transform seen so far.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CornerEnvelope {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl CornerEnvelope {
    /// Widen the envelope with the corner displacements of a transform.
    pub fn observe(&mut self, transform: &Transform, width: u32, height: u32) {
        let w = width.saturating_sub(1) as f64;
        let h = height.saturating_sub(1) as f64;
        let corners = [(0.0, 0.0), (0.0, h), (w, 0.0), (w, h)];

        for (x, y) in corners {
            let (tx, ty) = transform.apply(x, y);
            let delta_x = tx - x;
            let delta_y = ty - y;
            self.min_x = self.min_x.min(delta_x);
            self.min_y = self.min_y.min(delta_y);
            self.max_x = self.max_x.max(delta_x);
            self.max_y = self.max_y.max(delta_y);
        }
    }

    /// Smallest border size guaranteed to never expose an undefined pixel
    /// for any transform observed so far.
    pub fn min_border_size(&self) -> u32 {
        let extreme = self
            .min_x
            .abs()
            .max(self.min_y.abs())
            .max(self.max_x.abs())
            .max(self.max_y.abs());
        extreme.ceil() as u32
    }
}

/// Applies the corrective transform to a frame and hides the resulting
/// border artifacts.
///
/// Auto-border sizing here is the incremental streaming form: the padding
/// amount is fixed when the pipeline is configured and the envelope only
/// governs the crop. An envelope observed early in a stream may be
/// narrower than corner excursions seen later; callers that want a
/// guaranteed bound can pre-scan their footage and size the border from
/// [`CornerEnvelope::min_border_size`].
#[derive(Debug, Clone)]
pub struct BorderManager {
    options: BorderOptions,
}

impl BorderManager {
    /// Create a manager for the given options.
    pub fn new(options: BorderOptions) -> Self {
        Self { options }
    }

    /// The configured options.
    pub fn options(&self) -> &BorderOptions {
        &self.options
    }

    /// Pad, warp, crop and optionally rescale one frame.
    pub fn apply(
        &self,
        frame: &Frame,
        smoothed: &Transform,
        envelope: &CornerEnvelope,
    ) -> Result<Frame> {
        let (pad_size, neg_crop) = self.options.functional();
        let source_w = frame.width();
        let source_h = frame.height();

        let padded = warp::pad(&frame.rgba(), pad_size, self.options.mode);
        let warped = match self.options.motion_model {
            MotionModel::Affine => {
                warp::warp_affine(&padded, &smoothed.to_affine(), self.options.mode)?
            }
            MotionModel::Projective => {
                warp::warp_projective(&padded, &smoothed.to_projective(), self.options.mode)?
            }
        };

        let mut stabilized = if self.options.auto_border {
            auto_border_crop(&warped, envelope, pad_size)
        } else if neg_crop > 0 {
            let (pw, ph) = warped.dimensions();
            if pw <= 2 * neg_crop || ph <= 2 * neg_crop {
                return Err(Error::InvalidConfig(format!(
                    "negative border of {} px leaves no visible frame at {}x{}",
                    neg_crop, source_w, source_h
                )));
            }
            imageops::crop_imm(&warped, neg_crop, neg_crop, pw - 2 * neg_crop, ph - 2 * neg_crop)
                .to_image()
        } else {
            imageops::crop_imm(&warped, pad_size, pad_size, source_w, source_h).to_image()
        };

        if self.options.crop_and_zoom && pad_size > 0 && !self.options.auto_border {
            let (w, h) = stabilized.dimensions();
            if w <= 2 * pad_size || h <= 2 * pad_size {
                return Err(Error::InvalidConfig(format!(
                    "crop-and-zoom border of {} px leaves no visible frame at {}x{}",
                    pad_size, w, h
                )));
            }
            let inner = imageops::crop_imm(
                &stabilized,
                pad_size,
                pad_size,
                w - 2 * pad_size,
                h - 2 * pad_size,
            )
            .to_image();
            stabilized = imageops::resize(&inner, source_w, source_h, FilterType::Triangle);
        }

        Ok(Frame::from_rgba(stabilized))
    }
}

/// Crop a padded, warped frame to the region the envelope proves defined.
fn auto_border_crop(warped: &RgbaImage, envelope: &CornerEnvelope, border_size: u32) -> RgbaImage {
    if border_size == 0 {
        return warped.clone();
    }

    let (pw, ph) = warped.dimensions();
    let x = auto_border_start(envelope.min_x, border_size);
    let y = auto_border_start(envelope.min_y, border_size);
    let x_end = auto_border_end(pw, envelope.max_x, border_size).clamp(x + 1, pw);
    let y_end = auto_border_end(ph, envelope.max_y, border_size).clamp(y + 1, ph);

    imageops::crop_imm(warped, x, y, x_end - x, y_end - y).to_image()
}

fn auto_border_start(min_corner: f64, border_size: u32) -> u32 {
    let start = (border_size as f64 - min_corner.abs()).floor();
    start.max(0.0) as u32
}

fn auto_border_end(dimension: u32, extreme_corner: f64, border_size: u32) -> u32 {
    let end = (dimension as f64 - (border_size as f64 - extreme_corner)).ceil();
    end.max(1.0) as u32
}
