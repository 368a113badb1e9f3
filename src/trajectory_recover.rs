//! Incremental recovery while walking a trajectory frame by frame.

use glam::DVec2;
use image::DynamicImage;
use log::{debug, info};

use crate::cloud::KeypointCloud;
use crate::config::RecoveryConfig;
use crate::detected_points::{DistanceMetric, FrameFeatures};
use crate::error::Result;
use crate::features::{FeatureExtractor, extract_ranked, image_center};
use crate::matcher::{BruteForceMatcher, DescriptorMatcher};
use crate::restorer::CloudRestorer;
use crate::types::{FramePose, RecoveryResult};

/// Recovery session over one growing keypoint cloud.
///
/// Appending and querying both take `&mut self`; a session is not reentrant.
pub struct TrajectoryRecover<M = BruteForceMatcher> {
    restorer: CloudRestorer<M>,
    last: Option<RecoveryResult>,
}

impl TrajectoryRecover<BruteForceMatcher> {
    pub fn with_metric(config: RecoveryConfig, metric: DistanceMetric) -> Self {
        Self::new(CloudRestorer::with_metric(config, metric))
    }
}

impl<M: DescriptorMatcher> TrajectoryRecover<M> {
    pub fn new(restorer: CloudRestorer<M>) -> Self {
        TrajectoryRecover {
            restorer,
            last: None,
        }
    }

    pub fn restorer(&self) -> &CloudRestorer<M> {
        &self.restorer
    }

    pub fn cloud(&self) -> &KeypointCloud {
        self.restorer.cloud()
    }

    pub fn frames_count(&self) -> usize {
        self.restorer.frames_count()
    }

    /// Most recent recovery, if any query ran.
    pub fn last_result(&self) -> Option<&RecoveryResult> {
        self.last.as_ref()
    }

    /// Appends a frame whose pose is known.
    pub fn add_frame(
        &mut self,
        image_center: DVec2,
        features: FrameFeatures,
        pose: &FramePose,
    ) -> Result<usize> {
        self.restorer.add_frame(image_center, features, pose)
    }

    pub fn add_frame_image<E: FeatureExtractor + ?Sized>(
        &mut self,
        extractor: &E,
        image: &DynamicImage,
        pose: &FramePose,
    ) -> Result<usize> {
        self.restorer.add_frame_image(extractor, image, pose)
    }

    /// Recovers a query against everything appended so far.
    pub fn recover(
        &mut self,
        query: &FrameFeatures,
        reference_point: DVec2,
    ) -> Result<&RecoveryResult> {
        let result = self.restorer.recover(query, reference_point)?;
        Ok(&*self.last.insert(result))
    }

    pub fn recover_image<E: FeatureExtractor + ?Sized>(
        &mut self,
        extractor: &E,
        image: &DynamicImage,
    ) -> Result<&RecoveryResult> {
        let result = self.restorer.recover_image(extractor, image)?;
        Ok(&*self.last.insert(result))
    }

    /// Recovers a query and, when the result clears the quality threshold,
    /// appends the query itself at its recovered pose so later frames can
    /// match against it.
    ///
    /// `reference_point` must be the pixel center of the query frame, since
    /// the recovered position is used as the frame pose.
    pub fn recover_and_append(
        &mut self,
        query: FrameFeatures,
        reference_point: DVec2,
    ) -> Result<&RecoveryResult> {
        let result = self.restorer.recover(&query, reference_point)?;
        let threshold = self.restorer.config().confidence_threshold;
        if result.is_trusted(threshold) {
            let frame_idx = self.restorer.add_frame(reference_point, query, &result.pose())?;
            info!(
                "appended frame {} at ({:.3}, {:.3}), confidence {:.3}",
                frame_idx, result.position.x, result.position.y, result.confidence
            );
        } else {
            debug!(
                "frame not appended, confidence {:.3} below {:.3}",
                result.confidence, threshold
            );
        }
        Ok(&*self.last.insert(result))
    }

    pub fn recover_and_append_image<E: FeatureExtractor + ?Sized>(
        &mut self,
        extractor: &E,
        image: &DynamicImage,
    ) -> Result<&RecoveryResult> {
        let max_count = self.restorer.config().max_keypoints_per_frame;
        let query = extract_ranked(extractor, image, max_count)?;
        self.recover_and_append(query, image_center(image))
    }
}
