//! Pure-Rust reference tracking backend.
//!
//! Histogram equalization for contrast, minimum-eigenvalue corner
//! detection with spacing suppression, single-level iterative Lucas-Kanade
//! flow, and a trimmed least-squares similarity fit. Good enough to drive
//! the pipeline end to end; not tuned for robustness on difficult footage.

use image::GrayImage;
use nalgebra::Point2;

use super::{FeatureTracker, Keypoint, TrackedPoint};
use crate::Transform;

/// Software feature tracker.
#[derive(Debug, Clone)]
pub struct SoftwareTracker {
    /// Maximum number of corners to detect per frame.
    pub max_corners: usize,
    /// Corner response threshold as a fraction of the strongest response.
    pub quality_level: f32,
    /// Minimum spacing between accepted corners, in pixels.
    pub min_distance: f32,
    /// Half-size of the tracking patch; the patch is (2r+1) squared.
    pub window_radius: u32,
    /// Maximum Lucas-Kanade iterations per point.
    pub max_iterations: usize,
    /// Convergence threshold in pixels.
    pub epsilon: f32,
}

impl Default for SoftwareTracker {
    fn default() -> Self {
        Self {
            max_corners: 200,
            quality_level: 0.05,
            min_distance: 30.0,
            window_radius: 10,
            max_iterations: 20,
            epsilon: 0.03,
        }
    }
}

/// Grayscale image as f32 samples with bilinear access.
struct FloatImage {
    data: Vec<f32>,
    width: u32,
    height: u32,
}

impl FloatImage {
    fn from_gray(gray: &GrayImage) -> Self {
        Self {
            data: gray.pixels().map(|p| p.0[0] as f32).collect(),
            width: gray.width(),
            height: gray.height(),
        }
    }

    #[inline]
    fn at(&self, x: i64, y: i64) -> f32 {
        let x = x.clamp(0, self.width as i64 - 1);
        let y = y.clamp(0, self.height as i64 - 1);
        self.data[(y * self.width as i64 + x) as usize]
    }

    /// Bilinear sample with edge clamping.
    fn sample(&self, x: f32, y: f32) -> f32 {
        let x0 = x.floor() as i64;
        let y0 = y.floor() as i64;
        let fx = x - x0 as f32;
        let fy = y - y0 as f32;

        let p00 = self.at(x0, y0);
        let p10 = self.at(x0 + 1, y0);
        let p01 = self.at(x0, y0 + 1);
        let p11 = self.at(x0 + 1, y0 + 1);

        let top = p00 + fx * (p10 - p00);
        let bottom = p01 + fx * (p11 - p01);
        top + fy * (bottom - top)
    }

    /// Central-difference gradient at a fractional position.
    fn gradient(&self, x: f32, y: f32) -> (f32, f32) {
        let gx = (self.sample(x + 1.0, y) - self.sample(x - 1.0, y)) * 0.5;
        let gy = (self.sample(x, y + 1.0) - self.sample(x, y - 1.0)) * 0.5;
        (gx, gy)
    }
}

impl FeatureTracker for SoftwareTracker {
    fn enhance(&self, gray: &GrayImage) -> GrayImage {
        let total = (gray.width() as u64) * (gray.height() as u64);
        if total == 0 {
            return gray.clone();
        }

        let mut histogram = [0u64; 256];
        for p in gray.pixels() {
            histogram[p.0[0] as usize] += 1;
        }

        let mut cdf = [0u64; 256];
        let mut running = 0u64;
        for (i, &count) in histogram.iter().enumerate() {
            running += count;
            cdf[i] = running;
        }

        let cdf_min = cdf.iter().copied().find(|&c| c > 0).unwrap_or(0);
        let denom = (total - cdf_min).max(1) as f64;

        let mut lut = [0u8; 256];
        for i in 0..256 {
            let scaled = (cdf[i].saturating_sub(cdf_min)) as f64 * 255.0 / denom;
            lut[i] = scaled.round().clamp(0.0, 255.0) as u8;
        }

        let mut out = gray.clone();
        for p in out.pixels_mut() {
            p.0[0] = lut[p.0[0] as usize];
        }
        out
    }

    fn detect(&self, gray: &GrayImage) -> Vec<Keypoint> {
        let width = gray.width() as i64;
        let height = gray.height() as i64;
        let margin = (self.window_radius + 2) as i64;
        if width <= 2 * margin || height <= 2 * margin {
            return Vec::new();
        }

        let img = FloatImage::from_gray(gray);

        // Minimum eigenvalue of the 3x3 structure tensor per pixel.
        let mut candidates: Vec<(f32, f32, f32)> = Vec::new();
        let mut max_response = 0.0f32;
        for y in margin..height - margin {
            for x in margin..width - margin {
                let mut sxx = 0.0f32;
                let mut sxy = 0.0f32;
                let mut syy = 0.0f32;
                for dy in -1..=1i64 {
                    for dx in -1..=1i64 {
                        let gx = (img.at(x + dx + 1, y + dy) - img.at(x + dx - 1, y + dy)) * 0.5;
                        let gy = (img.at(x + dx, y + dy + 1) - img.at(x + dx, y + dy - 1)) * 0.5;
                        sxx += gx * gx;
                        sxy += gx * gy;
                        syy += gy * gy;
                    }
                }
                let trace = sxx + syy;
                let det_term = ((sxx - syy) * (sxx - syy) + 4.0 * sxy * sxy).sqrt();
                let response = 0.5 * (trace - det_term);
                if response > 0.0 {
                    max_response = max_response.max(response);
                    candidates.push((x as f32, y as f32, response));
                }
            }
        }

        if max_response <= 0.0 {
            return Vec::new();
        }

        let threshold = self.quality_level * max_response;
        candidates.retain(|&(_, _, r)| r >= threshold);
        candidates.sort_by(|a, b| b.2.partial_cmp(&a.2).unwrap_or(std::cmp::Ordering::Equal));

        // Greedy spacing suppression, strongest first.
        let min_dist_sq = self.min_distance * self.min_distance;
        let mut accepted: Vec<Keypoint> = Vec::new();
        for (x, y, _) in candidates {
            if accepted.len() >= self.max_corners {
                break;
            }
            let spaced = accepted.iter().all(|p| {
                let dx = p.x - x;
                let dy = p.y - y;
                dx * dx + dy * dy >= min_dist_sq
            });
            if spaced {
                accepted.push(Point2::new(x, y));
            }
        }
        accepted
    }

    fn track(
        &self,
        previous: &GrayImage,
        current: &GrayImage,
        points: &[Keypoint],
    ) -> Vec<TrackedPoint> {
        let prev = FloatImage::from_gray(previous);
        let curr = FloatImage::from_gray(current);
        let radius = self.window_radius as i64;

        points
            .iter()
            .map(|&p| self.track_point(&prev, &curr, p, radius))
            .collect()
    }

    fn fit_transform(&self, previous: &[Keypoint], current: &[Keypoint]) -> Option<Transform> {
        if previous.len() < 4 || previous.len() != current.len() {
            return None;
        }

        let fitted = fit_similarity(previous, current)?;

        // One trimmed refit: drop correspondences far off the first fit.
        let mut residuals: Vec<f32> = previous
            .iter()
            .zip(current)
            .map(|(p, q)| {
                let (x, y) = fitted.apply(p.x as f64, p.y as f64);
                let dx = x as f32 - q.x;
                let dy = y as f32 - q.y;
                (dx * dx + dy * dy).sqrt()
            })
            .collect();

        let mut sorted = residuals.clone();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let median = sorted[sorted.len() / 2];
        let cutoff = (3.0 * median).max(1.0);

        let mut inlier_prev = Vec::new();
        let mut inlier_curr = Vec::new();
        for (i, r) in residuals.drain(..).enumerate() {
            if r <= cutoff {
                inlier_prev.push(previous[i]);
                inlier_curr.push(current[i]);
            }
        }

        if inlier_prev.len() >= 4 && inlier_prev.len() < previous.len() {
            fit_similarity(&inlier_prev, &inlier_curr).or(Some(fitted))
        } else {
            Some(fitted)
        }
    }
}

impl SoftwareTracker {
    /// Forward-additive Lucas-Kanade for a single point.
    fn track_point(
        &self,
        prev: &FloatImage,
        curr: &FloatImage,
        point: Keypoint,
        radius: i64,
    ) -> TrackedPoint {
        // Spatial gradient matrix over the template window.
        let mut gxx = 0.0f32;
        let mut gxy = 0.0f32;
        let mut gyy = 0.0f32;
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                let (gx, gy) = prev.gradient(point.x + dx as f32, point.y + dy as f32);
                gxx += gx * gx;
                gxy += gx * gy;
                gyy += gy * gy;
            }
        }

        let det = gxx * gyy - gxy * gxy;
        if det.abs() < 1e-6 {
            // Flat or one-dimensional texture; the system is singular.
            return TrackedPoint {
                position: point,
                valid: false,
            };
        }
        let inv = 1.0 / det;

        let mut flow_x = 0.0f32;
        let mut flow_y = 0.0f32;
        let mut converged = false;
        for _ in 0..self.max_iterations {
            let mut bx = 0.0f32;
            let mut by = 0.0f32;
            for dy in -radius..=radius {
                for dx in -radius..=radius {
                    let tx = point.x + dx as f32;
                    let ty = point.y + dy as f32;
                    let diff = prev.sample(tx, ty) - curr.sample(tx + flow_x, ty + flow_y);
                    let (gx, gy) = prev.gradient(tx, ty);
                    bx += diff * gx;
                    by += diff * gy;
                }
            }

            let step_x = inv * (gyy * bx - gxy * by);
            let step_y = inv * (gxx * by - gxy * bx);
            flow_x += step_x;
            flow_y += step_y;

            if (step_x * step_x + step_y * step_y).sqrt() < self.epsilon {
                converged = true;
                break;
            }
        }

        let position = Point2::new(point.x + flow_x, point.y + flow_y);
        let in_bounds = position.x >= 0.0
            && position.y >= 0.0
            && position.x < curr.width as f32
            && position.y < curr.height as f32;

        TrackedPoint {
            position,
            valid: converged && in_bounds,
        }
    }
}

/// Least-squares similarity fit with the scale component discarded.
fn fit_similarity(previous: &[Keypoint], current: &[Keypoint]) -> Option<Transform> {
    let n = previous.len() as f64;

    let (mut pcx, mut pcy, mut qcx, mut qcy) = (0.0f64, 0.0, 0.0, 0.0);
    for (p, q) in previous.iter().zip(current) {
        pcx += p.x as f64;
        pcy += p.y as f64;
        qcx += q.x as f64;
        qcy += q.y as f64;
    }
    pcx /= n;
    pcy /= n;
    qcx /= n;
    qcy /= n;

    let mut dot = 0.0f64;
    let mut cross = 0.0f64;
    let mut norm = 0.0f64;
    for (p, q) in previous.iter().zip(current) {
        let px = p.x as f64 - pcx;
        let py = p.y as f64 - pcy;
        let qx = q.x as f64 - qcx;
        let qy = q.y as f64 - qcy;
        dot += px * qx + py * qy;
        cross += px * qy - py * qx;
        norm += px * px + py * py;
    }

    if norm < 1e-9 {
        return None;
    }

    let magnitude = (dot * dot + cross * cross).sqrt();
    if magnitude < 1e-12 {
        return None;
    }

    // Unit rotation only; the fitted scale is dropped.
    let da = cross.atan2(dot);
    let (sin, cos) = da.sin_cos();
    let dx = qcx - (cos * pcx - sin * pcy);
    let dy = qcy - (sin * pcx + cos * pcy);

    Some(Transform::new(dx, dy, da))
}
