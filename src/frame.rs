//! Frame value type: an owned image buffer plus an explicit color format tag.

use image::{DynamicImage, GrayImage, RgbImage, RgbaImage};

use crate::{Error, Result};

/// Color layout of a frame's pixel buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorFormat {
    /// Single-channel grayscale.
    Gray,
    /// Three-channel color.
    Rgb,
    /// Four-channel color with alpha.
    Rgba,
}

impl ColorFormat {
    /// Number of channels implied by this format.
    pub fn channels(&self) -> u8 {
        match self {
            ColorFormat::Gray => 1,
            ColorFormat::Rgb => 3,
            ColorFormat::Rgba => 4,
        }
    }
}

/// An image sample flowing through the stabilization pipeline.
///
/// A `Frame` owns its pixel buffer and carries a [`ColorFormat`] tag that
/// always matches the buffer's channel count. Conversions between formats
/// are explicit and return fresh buffers; nothing is cached on the frame.
#[derive(Debug, Clone)]
pub struct Frame {
    image: DynamicImage,
    format: ColorFormat,
}

impl Frame {
    /// Create a frame from a dynamic image, deriving the format tag from
    /// the buffer's channel count.
    ///
    /// Returns [`Error::InvalidFrame`] for channel layouts other than 1, 3
    /// or 4 channels.
    pub fn new(image: DynamicImage) -> Result<Self> {
        let format = match image.color().channel_count() {
            1 => ColorFormat::Gray,
            3 => ColorFormat::Rgb,
            4 => ColorFormat::Rgba,
            n => {
                return Err(Error::InvalidFrame(format!(
                    "unsupported channel count {}",
                    n
                )))
            }
        };
        Ok(Self { image, format })
    }

    /// Create a grayscale frame.
    pub fn from_gray(image: GrayImage) -> Self {
        Self {
            image: DynamicImage::ImageLuma8(image),
            format: ColorFormat::Gray,
        }
    }

    /// Create a three-channel color frame.
    pub fn from_rgb(image: RgbImage) -> Self {
        Self {
            image: DynamicImage::ImageRgb8(image),
            format: ColorFormat::Rgb,
        }
    }

    /// Create a four-channel color frame with alpha.
    pub fn from_rgba(image: RgbaImage) -> Self {
        Self {
            image: DynamicImage::ImageRgba8(image),
            format: ColorFormat::Rgba,
        }
    }

    /// A zero-sized frame. Used to signal an unreadable input; the
    /// pipeline treats it as a no-op.
    pub fn empty() -> Self {
        Self {
            image: DynamicImage::new_rgb8(0, 0),
            format: ColorFormat::Rgb,
        }
    }

    /// Frame width in pixels.
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    /// Frame height in pixels.
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// True when the frame has no pixels.
    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    /// The color format tag.
    pub fn format(&self) -> ColorFormat {
        self.format
    }

    /// Borrow the underlying image buffer.
    pub fn image(&self) -> &DynamicImage {
        &self.image
    }

    /// Convert to a grayscale buffer.
    pub fn gray(&self) -> GrayImage {
        self.image.to_luma8()
    }

    /// Convert to a three-channel buffer.
    pub fn rgb(&self) -> RgbImage {
        self.image.to_rgb8()
    }

    /// Convert to a four-channel buffer with alpha.
    pub fn rgba(&self) -> RgbaImage {
        self.image.to_rgba8()
    }

    /// Extract a sub-rectangle as a new frame with the same format tag.
    pub fn crop(&self, x: u32, y: u32, width: u32, height: u32) -> Frame {
        Frame {
            image: self.image.crop_imm(x, y, width, height),
            format: self.format,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn test_format_matches_channel_count() {
        let gray = Frame::from_gray(GrayImage::new(4, 4));
        assert_eq!(gray.format(), ColorFormat::Gray);
        assert_eq!(gray.format().channels(), 1);

        let rgb = Frame::from_rgb(RgbImage::new(4, 4));
        assert_eq!(rgb.format(), ColorFormat::Rgb);
        assert_eq!(rgb.format().channels(), 3);

        let rgba = Frame::from_rgba(RgbaImage::new(4, 4));
        assert_eq!(rgba.format(), ColorFormat::Rgba);
        assert_eq!(rgba.format().channels(), 4);
    }

    #[test]
    fn test_guess_format_from_dynamic_image() {
        let frame = Frame::new(DynamicImage::new_luma8(2, 2)).unwrap();
        assert_eq!(frame.format(), ColorFormat::Gray);

        let frame = Frame::new(DynamicImage::new_rgba8(2, 2)).unwrap();
        assert_eq!(frame.format(), ColorFormat::Rgba);
    }

    #[test]
    fn test_empty_frame() {
        let frame = Frame::empty();
        assert!(frame.is_empty());
        assert_eq!(frame.width(), 0);

        let nonempty = Frame::from_gray(GrayImage::new(1, 1));
        assert!(!nonempty.is_empty());
    }

    #[test]
    fn test_explicit_conversion_roundtrip() {
        let mut img = GrayImage::new(3, 3);
        img.put_pixel(1, 1, Luma([200u8]));
        let frame = Frame::from_gray(img.clone());

        // Gray -> Rgba -> Gray preserves the luma values exactly.
        let rgba_frame = Frame::from_rgba(frame.rgba());
        assert_eq!(rgba_frame.format(), ColorFormat::Rgba);
        assert_eq!(rgba_frame.gray(), img);
    }

    #[test]
    fn test_crop_keeps_format() {
        let frame = Frame::from_rgb(RgbImage::new(8, 6));
        let cropped = frame.crop(2, 1, 4, 3);
        assert_eq!(cropped.width(), 4);
        assert_eq!(cropped.height(), 3);
        assert_eq!(cropped.format(), ColorFormat::Rgb);
    }
}
