use serde::{Deserialize, Serialize};

/// Settings of the random sample consensus loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RansacConfig {
    /// Upper bound on sampled hypotheses
    pub max_iterations: usize,
    /// Probability that at least one all-inlier sample is drawn, drives early exit
    pub confidence: f64,
    /// Seed of the sampling generator, fixed so that recovery is repeatable
    pub seed: u64,
}

impl Default for RansacConfig {
    fn default() -> Self {
        Self {
            max_iterations: 2000,
            confidence: 0.995,
            seed: 0,
        }
    }
}

/// Image quality scoring of frames by gradient density.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityConfig {
    /// Ground resolution frames are resampled to before measuring gradients
    pub gradient_meters_per_pixel: f64,
    /// Gradient density at and above which a frame scores 1
    pub quality_threshold: f64,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            gradient_meters_per_pixel: 0.5,
            quality_threshold: 0.1,
        }
    }
}

/// Tunables of pose recovery, passed to every restorer at construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecoveryConfig {
    /// Strongest keypoints kept per frame, `0` keeps all
    pub max_keypoints_per_frame: usize,
    /// Inlier distance, in cloud coordinate units
    pub reprojection_threshold_px: f64,
    /// Match confidence at or above which a recovered pose is trusted and appended
    pub confidence_threshold: f64,
    pub ransac: RansacConfig,
    pub quality: QualityConfig,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            max_keypoints_per_frame: 0,
            reprojection_threshold_px: 3.0,
            confidence_threshold: 0.5,
            ransac: RansacConfig::default(),
            quality: QualityConfig::default(),
        }
    }
}
