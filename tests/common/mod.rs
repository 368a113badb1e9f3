#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};

use glam::DVec2;
use image::{DynamicImage, Rgb, RgbImage};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use trajectory_recovery::{
    DescriptorMatrix, DistanceMetric, FeatureExtractor, FrameFeatures, KeyPoint, Result,
};

/// Well spread, non-collinear keypoints inside a `w` x `h` frame with
/// distinct, decreasing responses.
pub fn spread_keypoints(n: usize, w: f32, h: f32, seed: u64) -> Vec<KeyPoint> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..n)
        .map(|i| {
            let x = rng.random_range(0.05 * w..0.95 * w);
            let y = rng.random_range(0.05 * h..0.95 * h);
            KeyPoint::new(x, y, 8.0, 0.0, (n - i) as f32)
        })
        .collect()
}

/// Random rows, distinct with overwhelming probability.
pub fn random_descriptors(rows: usize, cols: usize, seed: u64) -> DescriptorMatrix {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let data = (0..rows * cols).map(|_| rng.random_range(0.0..1.0)).collect();
    DescriptorMatrix::from_vec(rows, cols, data).unwrap()
}

pub fn random_features(n: usize, seed: u64) -> FrameFeatures {
    FrameFeatures::new(
        spread_keypoints(n, 640.0, 480.0, seed),
        random_descriptors(n, 32, seed + 1),
    )
    .unwrap()
}

/// Pixel positions of the colored dots drawn by [`dot_image`].
pub fn dot_positions(n: usize) -> Vec<(u32, u32)> {
    (0..n as u32)
        .map(|i| (20 + (i % 6) * 30 + (i * 7) % 11, 20 + (i / 6) * 30 + (i * 5) % 13))
        .collect()
}

pub fn dot_color(i: usize) -> Rgb<u8> {
    let i = i as u32;
    Rgb([(50 + i * 5) as u8, (255 - i * 5) as u8, (100 + (i * 13) % 150) as u8])
}

/// Black image with one uniquely colored pixel per dot, shifted by `offset`.
pub fn dot_image(w: u32, h: u32, n: usize, offset: (u32, u32)) -> DynamicImage {
    let mut img = RgbImage::new(w, h);
    for (i, (x, y)) in dot_positions(n).into_iter().enumerate() {
        img.put_pixel(x + offset.0, y + offset.1, dot_color(i));
    }
    DynamicImage::ImageRgb8(img)
}

/// Detects non-black pixels and describes each by its color, so the same dot
/// gets the same descriptor wherever it is drawn.
#[derive(Default)]
pub struct ColorDotExtractor {
    pub compute_calls: AtomicUsize,
}

impl FeatureExtractor for ColorDotExtractor {
    fn name(&self) -> &str {
        "DOTS"
    }

    fn distance_metric(&self) -> DistanceMetric {
        DistanceMetric::L2Squared
    }

    fn detect(&self, image: &DynamicImage) -> Vec<KeyPoint> {
        let rgb = image.to_rgb8();
        rgb.enumerate_pixels()
            .filter(|(_, _, p)| p.0.iter().any(|&c| c > 0))
            .map(|(x, y, p)| {
                let response = p.0.iter().map(|&c| c as f32).sum();
                KeyPoint::new(x as f32, y as f32, 4.0, 0.0, response)
            })
            .collect()
    }

    fn compute(&self, image: &DynamicImage, keypoints: &[KeyPoint]) -> Result<DescriptorMatrix> {
        self.compute_calls.fetch_add(1, Ordering::SeqCst);
        let rgb = image.to_rgb8();
        let mut m = DescriptorMatrix::new(3);
        for kp in keypoints {
            let p = rgb.get_pixel(kp.pt.x as u32, kp.pt.y as u32);
            m.push_row(&[p.0[0] as f32, p.0[1] as f32, p.0[2] as f32])?;
        }
        Ok(m)
    }
}

pub fn assert_vec_near(actual: DVec2, expected: DVec2, tol: f64) {
    assert!(
        actual.distance(expected) < tol,
        "expected {:?}, got {:?}",
        expected,
        actual
    );
}
