use glam::DVec2;
use log::{debug, trace};
use nalgebra as na;
use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;

use super::homography::{dlt_homography, has_collinear_triplet, reprojection_error};
use crate::config::RansacConfig;
use crate::error::{Error, Result};

const MIN_SAMPLES: usize = 4;

/// Robustly fitted homography with one inlier flag per correspondence.
#[derive(Debug, Clone, PartialEq)]
pub struct HomographyEstimate {
    homography: Option<na::Matrix3<f64>>,
    pub inliers: Vec<bool>,
}

impl HomographyEstimate {
    fn failed(correspondences: usize) -> HomographyEstimate {
        HomographyEstimate {
            homography: None,
            inliers: vec![false; correspondences],
        }
    }

    pub fn is_valid(&self) -> bool {
        self.homography.is_some()
    }

    /// The fitted transform, or `EstimationFailed`.
    pub fn homography(&self) -> Result<&na::Matrix3<f64>> {
        self.homography.as_ref().ok_or(Error::EstimationFailed {
            correspondences: self.inliers.len(),
            inliers: self.inlier_count(),
        })
    }

    pub fn into_homography(self) -> Option<na::Matrix3<f64>> {
        self.homography
    }

    pub fn inlier_count(&self) -> usize {
        self.inliers.iter().filter(|&&b| b).count()
    }
}

/// Hypotheses still needed to draw an outlier free sample with probability
/// `confidence` given the current outlier ratio.
fn update_num_iters(confidence: f64, outlier_ratio: f64, max_iters: usize) -> usize {
    let num = (1.0 - confidence).max(f64::MIN_POSITIVE).ln();
    let denom = 1.0 - (1.0 - outlier_ratio).powi(MIN_SAMPLES as i32);
    if denom < f64::MIN_POSITIVE {
        return 0;
    }
    let denom = denom.ln();
    if denom >= 0.0 || -num >= max_iters as f64 * -denom {
        max_iters
    } else {
        (num / denom).round() as usize
    }
}

fn count_inliers(
    h_mat: &na::Matrix3<f64>,
    src: &[DVec2],
    dst: &[DVec2],
    threshold: f64,
    mask: &mut [bool],
) -> usize {
    let mut count = 0;
    for ((s, d), m) in src.iter().zip(dst).zip(mask.iter_mut()) {
        *m = reprojection_error(h_mat, *s, *d) <= threshold;
        count += *m as usize;
    }
    count
}

/// Fits `H` with `dst ~ H * src` by random sample consensus over minimal four
/// point samples.
///
/// A correspondence is an inlier when its reprojection lies within
/// `threshold` of its `dst` point. Fails (no homography, all-false mask) with
/// fewer than four correspondences or when no hypothesis gathers four inliers.
pub fn estimate_homography(
    src: &[DVec2],
    dst: &[DVec2],
    threshold: f64,
    config: &RansacConfig,
) -> Result<HomographyEstimate> {
    if src.len() != dst.len() {
        return Err(Error::DimensionMismatch {
            context: "homography correspondences",
            expected: src.len(),
            actual: dst.len(),
        });
    }
    let n = src.len();
    if n < MIN_SAMPLES {
        debug!("ransac: only {} correspondences", n);
        return Ok(HomographyEstimate::failed(n));
    }

    let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
    let mut nums: Vec<usize> = (0..n).collect();
    let mut mask = vec![false; n];
    let mut best_mask = vec![false; n];
    let mut best_count = 0;
    let mut best_h = None;
    let mut niters = config.max_iterations;
    let mut iter = 0;

    while iter < niters {
        iter += 1;
        let (sample, _) = nums.partial_shuffle(&mut rng, MIN_SAMPLES);
        let s = [src[sample[0]], src[sample[1]], src[sample[2]], src[sample[3]]];
        let d = [dst[sample[0]], dst[sample[1]], dst[sample[2]], dst[sample[3]]];
        if has_collinear_triplet(&s) || has_collinear_triplet(&d) {
            continue;
        }
        let Some(h_mat) = dlt_homography(&s, &d) else {
            continue;
        };
        let count = count_inliers(&h_mat, src, dst, threshold, &mut mask);
        if count > best_count {
            best_count = count;
            best_h = Some(h_mat);
            std::mem::swap(&mut mask, &mut best_mask);
            let outlier_ratio = (n - count) as f64 / n as f64;
            niters = update_num_iters(config.confidence, outlier_ratio, niters);
            trace!("ransac: iter {} inliers {} budget {}", iter, count, niters);
            if count == n {
                break;
            }
        }
    }

    let Some(mut h_mat) = best_h.filter(|_| best_count >= MIN_SAMPLES) else {
        debug!("ransac: best consensus {} of {} after {} iterations", best_count, n, iter);
        return Ok(HomographyEstimate::failed(n));
    };

    // refit on the consensus set, keep it only if it does not lose support
    let (inlier_src, inlier_dst): (Vec<_>, Vec<_>) = src
        .iter()
        .zip(dst)
        .zip(&best_mask)
        .filter(|&(_, &m)| m)
        .map(|((s, d), _)| (*s, *d))
        .unzip();
    if let Some(refined) = dlt_homography(&inlier_src, &inlier_dst) {
        let count = count_inliers(&refined, src, dst, threshold, &mut mask);
        if count >= best_count {
            best_count = count;
            h_mat = refined;
            std::mem::swap(&mut mask, &mut best_mask);
        }
    }
    debug!("ransac: {} of {} inliers after {} iterations", best_count, n, iter);

    Ok(HomographyEstimate {
        homography: Some(h_mat),
        inliers: best_mask,
    })
}
