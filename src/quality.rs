//! Frame image quality from the density of intensity gradients.
//!
//! A frame is resampled to a common ground resolution first, so that frames
//! taken at different altitudes are scored on the same texture scale.

use image::imageops::FilterType;
use image::{DynamicImage, GrayImage};
use imageproc::gradients::{horizontal_sobel, vertical_sobel};
use log::trace;

use crate::config::QualityConfig;

/// Largest Sobel response of an 8-bit image, a full black to white step.
const MAX_SOBEL: f64 = 4.0 * 255.0;

/// Mean Sobel gradient magnitude per pixel, scaled so that a full intensity
/// step across a pixel counts 1. Zero for an empty image.
pub fn gradient_density(image: &GrayImage) -> f64 {
    let pixels = image.width() as u64 * image.height() as u64;
    if pixels == 0 {
        return 0.0;
    }
    let gx = horizontal_sobel(image);
    let gy = vertical_sobel(image);
    let total: f64 = gx
        .pixels()
        .zip(gy.pixels())
        .map(|(x, y)| (x.0[0] as f64).hypot(y.0[0] as f64))
        .sum();
    total / MAX_SOBEL / pixels as f64
}

/// Scores frames in [0, 1]: gradient density at the configured ground
/// resolution, saturating at the quality threshold.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameQualityEstimator {
    config: QualityConfig,
}

impl FrameQualityEstimator {
    pub fn new(config: QualityConfig) -> FrameQualityEstimator {
        FrameQualityEstimator { config }
    }

    pub fn config(&self) -> &QualityConfig {
        &self.config
    }

    /// Quality of a frame taken at `meters_per_pixel`.
    ///
    /// A non-positive resolution on either side skips resampling; a
    /// non-positive threshold scores every textured frame 1.
    pub fn estimate(&self, image: &DynamicImage, meters_per_pixel: f64) -> f64 {
        let scale = meters_per_pixel / self.config.gradient_meters_per_pixel;
        let gray = if scale.is_finite() && scale > 0.0 && scale != 1.0 {
            let w = ((image.width() as f64 * scale).round() as u32).max(1);
            let h = ((image.height() as f64 * scale).round() as u32).max(1);
            image.resize_exact(w, h, FilterType::Triangle).to_luma8()
        } else {
            image.to_luma8()
        };
        let density = gradient_density(&gray);
        trace!(
            "quality: {}x{} at scale {:.3}, density {:.4}",
            gray.width(),
            gray.height(),
            scale,
            density
        );
        if self.config.quality_threshold <= 0.0 {
            return if density > 0.0 { 1.0 } else { 0.0 };
        }
        (density / self.config.quality_threshold).min(1.0)
    }
}
