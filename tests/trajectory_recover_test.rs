use glam::DVec2;
use trajectory_recovery::{DistanceMetric, FramePose, RecoveryConfig, TrajectoryRecover};

mod common;
use common::{ColorDotExtractor, assert_vec_near, dot_image, random_features};

const CENTER: DVec2 = DVec2::new(320.0, 240.0);

fn session() -> TrajectoryRecover {
    let mut session =
        TrajectoryRecover::with_metric(RecoveryConfig::default(), DistanceMetric::L2Squared);
    let pose = FramePose::new(DVec2::new(10.0, 10.0), 0.0, 1.0);
    session.add_frame(CENTER, random_features(40, 1), &pose).unwrap();
    session
}

#[test]
fn test_trusted_result_is_appended() {
    let mut session = session();
    assert!(session.last_result().is_none());

    let result = session.recover_and_append(random_features(40, 1), CENTER).unwrap();
    assert!(result.confidence >= 0.5);
    assert_vec_near(result.position, DVec2::new(10.0, 10.0), 1e-2);
    let pose = result.pose();

    assert_eq!(session.frames_count(), 2);
    assert_eq!(session.cloud().len(), 80);
    // the appended frame sits at its recovered pose
    let appended = session.restorer().frame_keypoints(1).unwrap();
    let first = session.restorer().frame_keypoints(0).unwrap();
    assert_vec_near(appended[0].pt.as_dvec2(), first[0].pt.as_dvec2(), 1e-2);
    assert_eq!(session.last_result().unwrap().pose(), pose);
}

#[test]
fn test_untrusted_result_is_not_appended() {
    let mut session = session();
    let result = session.recover_and_append(random_features(40, 50), CENTER).unwrap();
    assert!(result.confidence < 0.5, "confidence {}", result.confidence);
    assert_eq!(session.frames_count(), 1);
    assert!(session.last_result().is_some());

    // too few keypoints for any homography
    let result = session.recover_and_append(random_features(3, 1), CENTER).unwrap();
    assert!(result.homography.is_none());
    assert_eq!(result.confidence, 0.0);
    assert_eq!(session.frames_count(), 1);
}

#[test]
fn test_recover_does_not_append() {
    let mut session = session();
    let confidence = session.recover(&random_features(40, 1), CENTER).unwrap().confidence;
    assert_eq!(confidence, 1.0);
    assert_eq!(session.frames_count(), 1);
    assert_eq!(session.last_result().unwrap().confidence, 1.0);
}

#[test]
fn test_walk_along_dot_images() {
    let extractor = ColorDotExtractor::default();
    let mut session =
        TrajectoryRecover::with_metric(RecoveryConfig::default(), DistanceMetric::L2Squared);
    session
        .add_frame_image(
            &extractor,
            &dot_image(240, 200, 30, (0, 0)),
            &FramePose::new(DVec2::new(0.0, 0.0), 0.0, 1.0),
        )
        .unwrap();

    for step in 1..=3u32 {
        let img = dot_image(240, 200, 30, (2 * step, step));
        let result = session.recover_and_append_image(&extractor, &img).unwrap();
        assert_vec_near(
            result.position,
            DVec2::new(-2.0 * step as f64, -(step as f64)),
            1e-3,
        );
    }
    assert_eq!(session.frames_count(), 4);

    let last = dot_image(240, 200, 30, (1, 1));
    let result = session.recover_image(&extractor, &last).unwrap();
    assert_vec_near(result.position, DVec2::new(-1.0, -1.0), 1e-3);
    assert_eq!(session.frames_count(), 4);
}
