//! Pose recovery of a query frame against a fixed keypoint cloud.

use glam::DVec2;
use image::DynamicImage;
use log::debug;
use rayon::prelude::*;

use crate::cloud::KeypointCloud;
use crate::config::RecoveryConfig;
use crate::detected_points::{
    DescriptorMatrix, DistanceMetric, FrameFeatures, KeyPoint, Match, check_pairing,
};
use crate::error::{Error, Result};
use crate::features::{FeatureExtractor, extract_ranked, image_center, rebase_to_map};
use crate::matcher::{BruteForceMatcher, DescriptorMatcher};
use crate::optimization::estimate_homography;
use crate::transform::{decompose, transform_point};
use crate::types::{FramePose, RecoveryResult, confidence};

/// Keypoint cloud of geo-registered frames plus the matcher indexing it.
///
/// Frames are added with `&mut self` and recovered with `&self`, so a cloud
/// can serve any number of concurrent queries once it is built.
pub struct CloudRestorer<M = BruteForceMatcher> {
    config: RecoveryConfig,
    cloud: KeypointCloud,
    matcher: M,
}

impl CloudRestorer<BruteForceMatcher> {
    pub fn with_metric(config: RecoveryConfig, metric: DistanceMetric) -> Self {
        Self::new(config, BruteForceMatcher::new(metric))
    }
}

impl<M: DescriptorMatcher> CloudRestorer<M> {
    pub fn new(config: RecoveryConfig, mut matcher: M) -> Self {
        matcher.clear();
        CloudRestorer {
            config,
            cloud: KeypointCloud::new(),
            matcher,
        }
    }

    pub fn config(&self) -> &RecoveryConfig {
        &self.config
    }

    pub fn cloud(&self) -> &KeypointCloud {
        &self.cloud
    }

    pub fn frames_count(&self) -> usize {
        self.cloud.frame_count()
    }

    pub fn frame_keypoints(&self, frame_idx: usize) -> Result<&[KeyPoint]> {
        self.cloud.keypoints_of(frame_idx)
    }

    pub fn frame_descriptors(&self, frame_idx: usize) -> Result<DescriptorMatrix> {
        self.cloud.descriptors_of(frame_idx)
    }

    /// Rebases frame-local features to the map using the frame pose and
    /// appends them. Returns the new frame index.
    pub fn add_frame(
        &mut self,
        image_center: DVec2,
        features: FrameFeatures,
        pose: &FramePose,
    ) -> Result<usize> {
        let FrameFeatures {
            mut keypoints,
            descriptors,
        } = features;
        self.cloud.check_frame(&keypoints, &descriptors)?;
        rebase_to_map(&mut keypoints, image_center, pose)?;
        self.matcher.add(&descriptors)?;
        self.cloud.add_frame(&keypoints, &descriptors)
    }

    /// Extracts the strongest `max_keypoints_per_frame` features of `image`
    /// and appends them at `pose`.
    pub fn add_frame_image<E: FeatureExtractor + ?Sized>(
        &mut self,
        extractor: &E,
        image: &DynamicImage,
        pose: &FramePose,
    ) -> Result<usize> {
        let features = extract_ranked(extractor, image, self.config.max_keypoints_per_frame)?;
        self.add_frame(image_center(image), features, pose)
    }

    /// Recovers the pose of a query frame.
    ///
    /// `reference_point` is the query pixel whose map position is reported,
    /// normally the image center. An empty query or a failed estimation gives
    /// a zero result with confidence 0 rather than an error.
    pub fn recover(&self, query: &FrameFeatures, reference_point: DVec2) -> Result<RecoveryResult> {
        check_pairing(&query.keypoints, &query.descriptors)?;
        if query.keypoints.is_empty() {
            return Ok(RecoveryResult::default());
        }

        let rough_matches = self.matcher.match_descriptors(&query.descriptors)?;
        let (query_pts, cloud_pts) = self.correspondences(query, &rough_matches)?;
        let estimate = estimate_homography(
            &query_pts,
            &cloud_pts,
            self.config.reprojection_threshold_px,
            &self.config.ransac,
        )?;

        let matches: Vec<Match> = rough_matches
            .iter()
            .zip(&estimate.inliers)
            .filter(|&(_, &inlier)| inlier)
            .map(|(m, _)| *m)
            .collect();

        let Some(homography) = estimate.into_homography() else {
            debug!("recover: no consensus among {} matches", rough_matches.len());
            return Ok(RecoveryResult {
                rough_matches,
                ..Default::default()
            });
        };

        let similarity = decompose(&homography);
        let position = transform_point(reference_point, &homography)?;
        let confidence = confidence(matches.len(), rough_matches.len());
        debug!(
            "recover: {}/{} inliers, pos ({:.3}, {:.3}) angle {:.2} scale {:.4}",
            matches.len(),
            rough_matches.len(),
            position.x,
            position.y,
            similarity.angle,
            similarity.scale
        );
        Ok(RecoveryResult {
            position,
            angle: similarity.angle,
            scale: similarity.scale,
            confidence,
            homography: Some(homography),
            rough_matches,
            matches,
        })
    }

    /// Extracts every feature of `image` and recovers its center.
    pub fn recover_image<E: FeatureExtractor + ?Sized>(
        &self,
        extractor: &E,
        image: &DynamicImage,
    ) -> Result<RecoveryResult> {
        let query = extractor.extract(image)?;
        self.recover(&query, image_center(image))
    }

    /// Recovers independent queries in parallel against the current cloud.
    pub fn recover_many(&self, queries: &[(FrameFeatures, DVec2)]) -> Vec<Result<RecoveryResult>>
    where
        M: Sync,
    {
        queries
            .par_iter()
            .map(|(query, reference_point)| self.recover(query, *reference_point))
            .collect()
    }

    fn correspondences(
        &self,
        query: &FrameFeatures,
        matches: &[Match],
    ) -> Result<(Vec<DVec2>, Vec<DVec2>)> {
        matches
            .iter()
            .map(|m| {
                let q = query.keypoints.get(m.query_idx).ok_or(Error::IndexOutOfRange {
                    index: m.query_idx,
                    len: query.keypoints.len(),
                })?;
                let c = self.cloud.keypoint(m.cloud_idx)?;
                Ok((q.pt.as_dvec2(), c.pt.as_dvec2()))
            })
            .collect::<Result<Vec<_>>>()
            .map(|pairs| pairs.into_iter().unzip())
    }
}
