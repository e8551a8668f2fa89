//! Stabilizer benchmarks using Criterion.
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use image::{GrayImage, Luma};
use nalgebra::Point2;

use stabilize_rs::smoothing::{KalmanSmoother, MovingAverageSmoother, Smoother};
use stabilize_rs::vision::{Keypoint, TrackedPoint};
use stabilize_rs::{
    FeatureTracker, Frame, FrameQueue, SoftwareTracker, Stabilizer, StabilizerConfig, Transform,
};

/// Minimal backend so pipeline benches measure orchestration, not vision.
struct NullTracker;

impl FeatureTracker for NullTracker {
    fn enhance(&self, gray: &GrayImage) -> GrayImage {
        gray.clone()
    }

    fn detect(&self, _gray: &GrayImage) -> Vec<Keypoint> {
        (0..16).map(|i| Point2::new(i as f32 * 4.0, 8.0)).collect()
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
        Some(Transform::new(0.5, -0.25, 0.001))
    }
}

fn test_frame(width: u32, height: u32) -> Frame {
    let img = GrayImage::from_fn(width, height, |x, y| Luma([((x * 7 + y * 13) % 251) as u8]));
    Frame::from_gray(img)
}

fn benchmark_pipeline_step(c: &mut Criterion) {
    let mut stabilizer = Stabilizer::with_tracker(
        StabilizerConfig::with_radius(25),
        Box::new(NullTracker),
    )
    .expect("valid config");

    let frame = test_frame(320, 240);
    // Reach steady state before timing.
    for _ in 0..26 {
        stabilizer.stabilize(frame.clone()).expect("stabilize");
    }

    c.bench_function("pipeline_step_320x240", |b| {
        b.iter(|| {
            stabilizer
                .stabilize(black_box(frame.clone()))
                .expect("stabilize")
        })
    });
}

fn benchmark_frame_queue(c: &mut Criterion) {
    let frame = test_frame(320, 240);
    let mut queue = FrameQueue::new(25);

    c.bench_function("frame_queue_push_evict", |b| {
        b.iter(|| {
            queue.push(black_box(frame.clone()));
        })
    });
}

fn benchmark_smoothers(c: &mut Criterion) {
    let mut average = MovingAverageSmoother::new(30);
    let mut kalman = KalmanSmoother::new(30, 1e-3, 1e-1);
    let raw = Transform::new(1.2, -0.8, 0.002);

    c.bench_function("moving_average_observe_smooth", |b| {
        b.iter(|| {
            average.observe(black_box(raw));
            black_box(average.smooth());
        })
    });

    c.bench_function("kalman_observe_smooth", |b| {
        b.iter(|| {
            kalman.observe(black_box(raw));
            black_box(kalman.smooth());
        })
    });
}

fn benchmark_software_detection(c: &mut Criterion) {
    let tracker = SoftwareTracker::default();
    let gray = test_frame(320, 240).gray();

    c.bench_function("software_detect_320x240", |b| {
        b.iter(|| black_box(tracker.detect(black_box(&gray))))
    });
}

criterion_group!(
    benches,
    benchmark_pipeline_step,
    benchmark_frame_queue,
    benchmark_smoothers,
    benchmark_software_detection
);
criterion_main!(benches);
