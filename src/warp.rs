//! Border padding and image warping with selectable edge-extension modes.
//!
//! Warps sample the source through the inverted matrix so every output
//! pixel gets exactly one bilinear lookup; pixels that fall outside the
//! source are filled according to the edge-extension mode, transparent
//! black for the constant mode.

use image::{Rgba, RgbaImage};
use nalgebra::{Matrix2x3, Matrix3};

use crate::border::BorderMode;
use crate::{Error, Result};

/// Extend an image by `size` pixels on every side.
///
/// The constant mode fills the border with transparent black so later
/// stages can key on alpha; the other modes synthesize border pixels from
/// the source content.
pub fn pad(image: &RgbaImage, size: u32, mode: BorderMode) -> RgbaImage {
    if size == 0 {
        return image.clone();
    }

    let (width, height) = image.dimensions();
    let mut out = RgbaImage::new(width + 2 * size, height + 2 * size);

    for (x, y, pixel) in out.enumerate_pixels_mut() {
        let sx = x as i64 - size as i64;
        let sy = y as i64 - size as i64;
        *pixel = match (
            resolve_index(sx, width as i64, mode),
            resolve_index(sy, height as i64, mode),
        ) {
            (Some(ix), Some(iy)) => *image.get_pixel(ix as u32, iy as u32),
            _ => Rgba([0, 0, 0, 0]),
        };
    }

    out
}

/// Warp with a 2x3 affine matrix.
pub fn warp_affine(image: &RgbaImage, matrix: &Matrix2x3<f64>, mode: BorderMode) -> Result<RgbaImage> {
    let full = Matrix3::new(
        matrix[(0, 0)],
        matrix[(0, 1)],
        matrix[(0, 2)],
        matrix[(1, 0)],
        matrix[(1, 1)],
        matrix[(1, 2)],
        0.0,
        0.0,
        1.0,
    );
    warp_projective(image, &full, mode)
}

/// Warp with a 3x3 projective matrix, applying perspective division.
pub fn warp_projective(image: &RgbaImage, matrix: &Matrix3<f64>, mode: BorderMode) -> Result<RgbaImage> {
    let inverse = matrix
        .try_inverse()
        .ok_or_else(|| Error::TransformError("warp matrix is not invertible".to_string()))?;

    let (width, height) = image.dimensions();
    let mut out = RgbaImage::new(width, height);

    for (x, y, pixel) in out.enumerate_pixels_mut() {
        let dx = x as f64;
        let dy = y as f64;

        let sx = inverse[(0, 0)] * dx + inverse[(0, 1)] * dy + inverse[(0, 2)];
        let sy = inverse[(1, 0)] * dx + inverse[(1, 1)] * dy + inverse[(1, 2)];
        let sw = inverse[(2, 0)] * dx + inverse[(2, 1)] * dy + inverse[(2, 2)];
        let w = if sw == 0.0 { 1e-7 } else { sw };

        *pixel = sample_bilinear(image, sx / w, sy / w, mode);
    }

    Ok(out)
}

/// Bilinear sample with per-tap edge extension.
fn sample_bilinear(image: &RgbaImage, x: f64, y: f64, mode: BorderMode) -> Rgba<u8> {
    let (width, height) = image.dimensions();
    let x0 = x.floor() as i64;
    let y0 = y.floor() as i64;
    let fx = (x - x0 as f64) as f32;
    let fy = (y - y0 as f64) as f32;

    let tap = |ix: i64, iy: i64| -> [f32; 4] {
        match (
            resolve_index(ix, width as i64, mode),
            resolve_index(iy, height as i64, mode),
        ) {
            (Some(rx), Some(ry)) => {
                let p = image.get_pixel(rx as u32, ry as u32).0;
                [p[0] as f32, p[1] as f32, p[2] as f32, p[3] as f32]
            }
            _ => [0.0, 0.0, 0.0, 0.0],
        }
    };

    let p00 = tap(x0, y0);
    let p10 = tap(x0 + 1, y0);
    let p01 = tap(x0, y0 + 1);
    let p11 = tap(x0 + 1, y0 + 1);

    let mut result = [0u8; 4];
    for c in 0..4 {
        let top = p00[c] + fx * (p10[c] - p00[c]);
        let bottom = p01[c] + fx * (p11[c] - p01[c]);
        let value = top + fy * (bottom - top);
        result[c] = value.round().clamp(0.0, 255.0) as u8;
    }
    Rgba(result)
}

/// Map an out-of-range index into the source according to the mode.
///
/// Returns `None` for the constant mode when the index falls outside.
fn resolve_index(i: i64, len: i64, mode: BorderMode) -> Option<i64> {
    if len == 0 {
        return None;
    }
    if (0..len).contains(&i) {
        return Some(i);
    }

    match mode {
        BorderMode::Black => None,
        BorderMode::Replicate => Some(i.clamp(0, len - 1)),
        BorderMode::Wrap => Some(i.rem_euclid(len)),
        BorderMode::Reflect => {
            // Mirror including the edge pixel: cba|abc|cba.
            if len == 1 {
                return Some(0);
            }
            let r = i.rem_euclid(2 * len);
            Some(if r >= len { 2 * len - 1 - r } else { r })
        }
        BorderMode::Reflect101 => {
            // Mirror excluding the edge pixel: dcb|abcd|cba.
            if len == 1 {
                return Some(0);
            }
            let r = i.rem_euclid(2 * len - 2);
            Some(if r >= len { 2 * len - 2 - r } else { r })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Transform;

    fn gradient_image(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_fn(width, height, |x, y| {
            Rgba([(x * 40) as u8, (y * 40) as u8, 7, 255])
        })
    }

    // ===== Index Resolution Tests =====

    #[test]
    fn test_resolve_in_range_is_untouched() {
        for mode in [
            BorderMode::Black,
            BorderMode::Reflect,
            BorderMode::Reflect101,
            BorderMode::Replicate,
            BorderMode::Wrap,
        ] {
            assert_eq!(resolve_index(2, 5, mode), Some(2));
        }
    }

    #[test]
    fn test_resolve_black_is_none_outside() {
        assert_eq!(resolve_index(-1, 5, BorderMode::Black), None);
        assert_eq!(resolve_index(5, 5, BorderMode::Black), None);
    }

    #[test]
    fn test_resolve_replicate_clamps() {
        assert_eq!(resolve_index(-3, 5, BorderMode::Replicate), Some(0));
        assert_eq!(resolve_index(9, 5, BorderMode::Replicate), Some(4));
    }

    #[test]
    fn test_resolve_wrap() {
        assert_eq!(resolve_index(-1, 5, BorderMode::Wrap), Some(4));
        assert_eq!(resolve_index(5, 5, BorderMode::Wrap), Some(0));
    }

    #[test]
    fn test_resolve_reflect_includes_edge() {
        assert_eq!(resolve_index(-1, 5, BorderMode::Reflect), Some(0));
        assert_eq!(resolve_index(-2, 5, BorderMode::Reflect), Some(1));
        assert_eq!(resolve_index(5, 5, BorderMode::Reflect), Some(4));
    }

    #[test]
    fn test_resolve_reflect101_excludes_edge() {
        assert_eq!(resolve_index(-1, 5, BorderMode::Reflect101), Some(1));
        assert_eq!(resolve_index(5, 5, BorderMode::Reflect101), Some(3));
    }

    // ===== Padding Tests =====

    #[test]
    fn test_pad_dimensions() {
        let img = gradient_image(4, 3);
        let padded = pad(&img, 2, BorderMode::Black);
        assert_eq!(padded.dimensions(), (8, 7));
    }

    #[test]
    fn test_pad_zero_is_identity() {
        let img = gradient_image(4, 3);
        assert_eq!(pad(&img, 0, BorderMode::Reflect), img);
    }

    #[test]
    fn test_pad_black_border_is_transparent() {
        let img = gradient_image(4, 3);
        let padded = pad(&img, 1, BorderMode::Black);
        assert_eq!(padded.get_pixel(0, 0).0, [0, 0, 0, 0]);
        // Interior pixels keep their content and opacity.
        assert_eq!(padded.get_pixel(1, 1).0, [0, 0, 7, 255]);
    }

    #[test]
    fn test_pad_replicate_copies_edge() {
        let img = gradient_image(4, 3);
        let padded = pad(&img, 1, BorderMode::Replicate);
        assert_eq!(padded.get_pixel(0, 0), img.get_pixel(0, 0));
        assert_eq!(padded.get_pixel(5, 4), img.get_pixel(3, 2));
    }

    // ===== Warp Tests =====

    #[test]
    fn test_warp_identity_preserves_pixels() {
        let img = gradient_image(6, 5);
        let warped = warp_affine(&img, &Transform::identity().to_affine(), BorderMode::Black).unwrap();
        assert_eq!(warped, img);
    }

    #[test]
    fn test_warp_projective_identity_preserves_pixels() {
        let img = gradient_image(6, 5);
        let warped =
            warp_projective(&img, &Transform::identity().to_projective(), BorderMode::Black)
                .unwrap();
        assert_eq!(warped, img);
    }

    #[test]
    fn test_warp_integer_translation_shifts_content() {
        let img = gradient_image(6, 5);
        let t = Transform::new(2.0, 1.0, 0.0);
        let warped = warp_affine(&img, &t.to_affine(), BorderMode::Black).unwrap();

        // dst(x, y) = src(x - 2, y - 1)
        assert_eq!(warped.get_pixel(3, 2), img.get_pixel(1, 1));
        // Revealed pixels fall outside the source and are transparent.
        assert_eq!(warped.get_pixel(0, 0).0, [0, 0, 0, 0]);
    }

    #[test]
    fn test_warp_singular_matrix_is_an_error() {
        let img = gradient_image(4, 4);
        let singular = Matrix3::zeros();
        assert!(matches!(
            warp_projective(&img, &singular, BorderMode::Black),
            Err(Error::TransformError(_))
        ));
    }
}
