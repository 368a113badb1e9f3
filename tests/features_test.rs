use std::sync::atomic::Ordering;

use approx::assert_relative_eq;
use glam::DVec2;
use trajectory_recovery::features::{extract_ranked, image_center, rank_and_truncate, rebase_to_map};
use trajectory_recovery::{DescriptorMatrix, Error, FeatureExtractor, FramePose, KeyPoint};

mod common;
use common::{ColorDotExtractor, assert_vec_near, dot_image};

fn keypoints_with_responses(responses: &[f32]) -> Vec<KeyPoint> {
    responses
        .iter()
        .enumerate()
        .map(|(i, &r)| KeyPoint::new(i as f32, 0.0, 1.0, 0.0, r))
        .collect()
}

fn tagged_rows(n: usize) -> DescriptorMatrix {
    let rows: Vec<Vec<f32>> = (0..n).map(|i| vec![i as f32, -(i as f32)]).collect();
    DescriptorMatrix::from_rows(&rows).unwrap()
}

#[test]
fn test_rank_keeps_strongest_with_their_rows() {
    let kps = keypoints_with_responses(&[0.5, 3.0, 1.0, 3.0, 2.0]);
    let ranked = rank_and_truncate(kps, &tagged_rows(5), 3).unwrap();
    assert_eq!(ranked.len(), 3);
    // equal responses keep detection order
    let xs: Vec<f32> = ranked.keypoints.iter().map(|kp| kp.pt.x).collect();
    assert_eq!(xs, vec![1.0, 3.0, 4.0]);
    for (kp, row) in ranked.keypoints.iter().zip(ranked.descriptors.iter_rows()) {
        assert_eq!(row[0], kp.pt.x);
    }
}

#[test]
fn test_rank_zero_keeps_all() {
    let kps = keypoints_with_responses(&[1.0, 2.0, 3.0]);
    let ranked = rank_and_truncate(kps, &tagged_rows(3), 0).unwrap();
    assert_eq!(ranked.len(), 3);
    assert_eq!(ranked.descriptors.row(0), &[2.0, -2.0]);

    let kps = keypoints_with_responses(&[1.0, 2.0]);
    assert_eq!(rank_and_truncate(kps, &tagged_rows(2), 10).unwrap().len(), 2);
}

#[test]
fn test_rank_rejects_unpaired_rows() {
    let kps = keypoints_with_responses(&[1.0, 2.0]);
    assert!(matches!(
        rank_and_truncate(kps, &tagged_rows(3), 1),
        Err(Error::DimensionMismatch { expected: 2, actual: 3, .. })
    ));
}

#[test]
fn test_rebase_moves_points_angles_and_sizes() {
    let mut kps = vec![
        KeyPoint::new(50.0, 40.0, 10.0, 5.0, 1.0),
        KeyPoint::new(60.0, 40.0, 4.0, 0.0, 1.0),
    ];
    let pose = FramePose::new(DVec2::new(100.0, 200.0), 90.0, 0.5);
    rebase_to_map(&mut kps, DVec2::new(50.0, 40.0), &pose).unwrap();

    assert_vec_near(kps[0].pt.as_dvec2(), DVec2::new(100.0, 200.0), 1e-4);
    assert_vec_near(kps[1].pt.as_dvec2(), DVec2::new(100.0, 205.0), 1e-4);
    assert_relative_eq!(kps[0].angle, 95.0);
    assert_relative_eq!(kps[0].size, 5.0);
    assert_relative_eq!(kps[1].size, 2.0);
}

#[test]
fn test_extract_ranked_describes_only_kept() {
    let extractor = ColorDotExtractor::default();
    let img = dot_image(200, 160, 12, (0, 0));
    assert_eq!(image_center(&img), DVec2::new(100.0, 80.0));

    let all = extractor.extract(&img).unwrap();
    assert_eq!(all.len(), 12);

    let top = extract_ranked(&extractor, &img, 5).unwrap();
    assert_eq!(top.len(), 5);
    assert_eq!(top.descriptors.rows(), 5);
    assert_eq!(top.descriptors.cols(), 3);
    assert!(top.keypoints.windows(2).all(|w| w[0].response >= w[1].response));
    assert_eq!(extractor.compute_calls.load(Ordering::SeqCst), 2);

    let everything = extract_ranked(&extractor, &img, 0).unwrap();
    assert_eq!(everything.len(), 12);
}
