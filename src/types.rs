use std::path::PathBuf;

use glam::DVec2;
use nalgebra as na;
use serde::{Deserialize, Serialize};

use crate::detected_points::Match;

/// Placement of a frame center in the map.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FramePose {
    /// Map meters
    pub position: DVec2,
    /// Degrees
    pub angle: f64,
    pub meters_per_pixel: f64,
}

impl FramePose {
    pub fn new(position: DVec2, angle: f64, meters_per_pixel: f64) -> FramePose {
        FramePose {
            position,
            angle,
            meters_per_pixel,
        }
    }
}

/// One row of a trajectory: an image and where it was taken.
#[derive(Debug, Clone, PartialEq)]
pub struct TrajectoryFrame {
    pub image_path: PathBuf,
    pub pose: FramePose,
}

/// Outcome of matching one query frame against a keypoint cloud.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecoveryResult {
    /// Map position of the query reference point
    pub position: DVec2,
    /// Degrees
    pub angle: f64,
    /// Map units per query pixel
    pub scale: f64,
    /// Share of rough matches kept by RANSAC, in [0, 1]
    pub confidence: f64,
    /// Query pixels to map, `None` when estimation failed
    pub homography: Option<na::Matrix3<f64>>,
    /// Nearest-descriptor matches before geometric verification
    pub rough_matches: Vec<Match>,
    /// RANSAC inliers, a subsequence of `rough_matches`
    pub matches: Vec<Match>,
}

impl RecoveryResult {
    pub fn is_trusted(&self, confidence_threshold: f64) -> bool {
        self.homography.is_some() && self.confidence >= confidence_threshold
    }

    pub fn pose(&self) -> FramePose {
        FramePose::new(self.position, self.angle, self.scale)
    }
}

pub(crate) fn confidence(refined: usize, rough: usize) -> f64 {
    if rough == 0 {
        0.0
    } else {
        refined as f64 / rough as f64
    }
}
