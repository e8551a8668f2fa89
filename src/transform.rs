//! Planar motion transform: translation plus rotation between two frames.

use nalgebra::{Matrix2x3, Matrix3};

/// Estimated or smoothed rigid planar motion between two frames.
///
/// Equivalent to the 2x3 affine matrix
/// `[[cos a, -sin a, dx], [sin a, cos a, dy]]`. Pure value type.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Transform {
    /// Horizontal translation in pixels.
    pub dx: f64,
    /// Vertical translation in pixels.
    pub dy: f64,
    /// Rotation in radians.
    pub da: f64,
}

impl Transform {
    /// Create a transform from its components.
    pub fn new(dx: f64, dy: f64, da: f64) -> Self {
        Self { dx, dy, da }
    }

    /// The identity transform (no motion).
    pub fn identity() -> Self {
        Self::default()
    }

    /// Recover the translation and rotation of an estimated 2x3 matrix.
    ///
    /// The rotation is `atan2(m10, m00)`, read from the rotation sub-block
    /// alone, so the same extraction works whether the matrix came from an
    /// affine or a projective estimator. Scale and shear are discarded.
    pub fn from_affine(matrix: &Matrix2x3<f64>) -> Self {
        Self {
            dx: matrix[(0, 2)],
            dy: matrix[(1, 2)],
            da: matrix[(1, 0)].atan2(matrix[(0, 0)]),
        }
    }

    /// Synthesize the 2x3 affine matrix for this transform.
    pub fn to_affine(&self) -> Matrix2x3<f64> {
        let (sin, cos) = self.da.sin_cos();
        Matrix2x3::new(cos, -sin, self.dx, sin, cos, self.dy)
    }

    /// Synthesize the 3x3 projective matrix for this transform.
    pub fn to_projective(&self) -> Matrix3<f64> {
        let (sin, cos) = self.da.sin_cos();
        Matrix3::new(cos, -sin, self.dx, sin, cos, self.dy, 0.0, 0.0, 1.0)
    }

    /// Apply this transform to a point.
    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        let (sin, cos) = self.da.sin_cos();
        (cos * x - sin * y + self.dx, sin * x + cos * y + self.dy)
    }

    /// Component-wise sum, used when re-centering a filter prediction.
    pub fn add(&self, other: &Transform) -> Transform {
        Transform {
            dx: self.dx + other.dx,
            dy: self.dy + other.dy,
            da: self.da + other.da,
        }
    }
}
