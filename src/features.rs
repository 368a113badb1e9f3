use glam::DVec2;
use image::DynamicImage;
use log::debug;

use crate::detected_points::{
    DescriptorMatrix, DistanceMetric, FrameFeatures, KeyPoint, check_pairing,
};
use crate::error::Result;
use crate::transform::{Transformation, compose, transform_point};
use crate::types::FramePose;

/// A detector/descriptor family.
///
/// Implementors wrap an external feature extraction library. Families are
/// selected by value, so adding one means implementing this trait.
pub trait FeatureExtractor {
    /// Family name used to key persisted feature blocks.
    fn name(&self) -> &str;

    fn distance_metric(&self) -> DistanceMetric;

    fn detect(&self, image: &DynamicImage) -> Vec<KeyPoint>;

    /// Describes `keypoints`. Must return exactly one row per keypoint.
    fn compute(&self, image: &DynamicImage, keypoints: &[KeyPoint]) -> Result<DescriptorMatrix>;

    fn extract(&self, image: &DynamicImage) -> Result<FrameFeatures> {
        let keypoints = self.detect(image);
        let descriptors = self.compute(image, &keypoints)?;
        FrameFeatures::new(keypoints, descriptors)
    }
}

/// Sorts keypoints by descending response and keeps the strongest `max_count`
/// (`0` keeps all). Descriptor rows follow their keypoints.
pub fn rank_and_truncate(
    keypoints: Vec<KeyPoint>,
    descriptors: &DescriptorMatrix,
    max_count: usize,
) -> Result<FrameFeatures> {
    check_pairing(&keypoints, descriptors)?;
    let mut order = ranked_order(&keypoints);
    if max_count > 0 && max_count < order.len() {
        order.truncate(max_count);
    }
    let ranked = order.iter().map(|&i| keypoints[i]).collect();
    Ok(FrameFeatures {
        keypoints: ranked,
        descriptors: descriptors.select_rows(&order),
    })
}

/// Detects, keeps the strongest `max_count` keypoints and describes only those.
pub fn extract_ranked<E: FeatureExtractor + ?Sized>(
    extractor: &E,
    image: &DynamicImage,
    max_count: usize,
) -> Result<FrameFeatures> {
    let detected = extractor.detect(image);
    let found = detected.len();
    let mut keypoints: Vec<KeyPoint> = ranked_order(&detected)
        .into_iter()
        .map(|i| detected[i])
        .collect();
    if max_count > 0 && max_count < keypoints.len() {
        keypoints.truncate(max_count);
    }
    debug!(
        "{}: kept {} of {} keypoints",
        extractor.name(),
        keypoints.len(),
        found
    );
    let descriptors = extractor.compute(image, &keypoints)?;
    FrameFeatures::new(keypoints, descriptors)
}

fn ranked_order(keypoints: &[KeyPoint]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..keypoints.len()).collect();
    // stable, so equal responses keep detection order
    order.sort_by(|&a, &b| keypoints[b].response.total_cmp(&keypoints[a].response));
    order
}

/// Local to map transform of a frame whose pixel center is `image_center`.
pub fn frame_to_map(image_center: DVec2, pose: &FramePose) -> nalgebra::Matrix3<f64> {
    compose(&[
        Transformation::Translate(-image_center),
        Transformation::Rotate(pose.angle),
        Transformation::Scale(pose.meters_per_pixel),
        Transformation::Translate(pose.position),
    ])
}

/// Moves frame-local keypoints into map coordinates, turning and scaling each
/// keypoint's own orientation and size with the frame.
pub fn rebase_to_map(
    keypoints: &mut [KeyPoint],
    image_center: DVec2,
    pose: &FramePose,
) -> Result<()> {
    let m = frame_to_map(image_center, pose);
    let moved = keypoints
        .iter()
        .map(|kp| transform_point(kp.pt.as_dvec2(), &m))
        .collect::<Result<Vec<_>>>()?;
    for (kp, p) in keypoints.iter_mut().zip(moved) {
        kp.pt = p.as_vec2();
        kp.angle += pose.angle as f32;
        kp.size *= pose.meters_per_pixel as f32;
    }
    Ok(())
}

/// Pixel center of an image, the reference point of its pose.
pub fn image_center(image: &DynamicImage) -> DVec2 {
    DVec2::new(image.width() as f64 / 2.0, image.height() as f64 / 2.0)
}
