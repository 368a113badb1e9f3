use std::path::Path;

use tempfile::TempDir;
use trajectory_recovery::io::{
    self, EVALUATION_HEADER, EvaluationRow, KEYPOINT_RECORD_SIZE, load_descriptors,
    load_keypoints, save_descriptors, save_keypoints,
};
use trajectory_recovery::{DescriptorMatrix, Error, KeyPoint, RecoveryConfig};

mod common;
use common::{random_descriptors, spread_keypoints};

fn assert_corrupt<T: std::fmt::Debug>(result: Result<T, Error>, path: &Path) {
    match result {
        Err(Error::ResourceCorrupt { path: p, .. }) => assert_eq!(p, path),
        other => panic!("expected corrupt {}, got {:?}", path.display(), other),
    }
}

#[test]
fn test_keypoint_block_layout() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("frames_FAST.kp.bin");
    let mut kp = KeyPoint::new(1.5, -2.0, 7.0, 90.0, 0.25);
    kp.octave = 3;
    let frames = vec![vec![kp, KeyPoint::new(0.0, 0.0, 1.0, 0.0, 1.0)], vec![]];
    save_keypoints(&path, &frames).unwrap();

    let bytes = std::fs::read(&path).unwrap();
    assert_eq!(bytes.len(), 8 + 8 + 2 * KEYPOINT_RECORD_SIZE + 8);
    assert_eq!(&bytes[0..8], &2u64.to_le_bytes());
    assert_eq!(&bytes[16..20], &1.5f32.to_le_bytes());
    assert_eq!(&bytes[36..40], &3i32.to_le_bytes());
    assert_eq!(&bytes[40..44], &(-1i32).to_le_bytes());

    assert_eq!(load_keypoints(&path).unwrap(), frames);
}

#[test]
fn test_descriptor_block_layout() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("frames_FAST_ORB.dscr.bin");
    let frames = vec![
        random_descriptors(3, 4, 1),
        DescriptorMatrix::new(4),
        random_descriptors(1, 4, 2),
    ];
    save_descriptors(&path, &frames).unwrap();

    let bytes = std::fs::read(&path).unwrap();
    assert_eq!(bytes.len(), 8 + 3 * 8 + 4 * 4 * 4);
    assert_eq!(&bytes[8..12], &3i32.to_le_bytes());
    assert_eq!(&bytes[12..16], &4i32.to_le_bytes());

    let loaded = load_descriptors(&path).unwrap();
    assert_eq!(loaded.len(), 3);
    assert_eq!(loaded[0], frames[0]);
    assert!(loaded[1].is_empty());
    assert_eq!(loaded[2], frames[2]);
}

#[test]
fn test_missing_block() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("absent.kp.bin");
    assert!(matches!(load_keypoints(&path), Err(Error::ResourceMissing(p)) if p == path));
    assert!(matches!(load_descriptors(&path), Err(Error::ResourceMissing(_))));
}

#[test]
fn test_corrupt_blocks() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("block.bin");

    std::fs::write(&path, b"").unwrap();
    assert_corrupt(load_keypoints(&path), &path);
    assert_corrupt(load_descriptors(&path), &path);

    // truncated inside the first record
    save_keypoints(&path, &[spread_keypoints(4, 10.0, 10.0, 1)]).unwrap();
    let bytes = std::fs::read(&path).unwrap();
    std::fs::write(&path, &bytes[..bytes.len() - 5]).unwrap();
    assert_corrupt(load_keypoints(&path), &path);

    // trailing garbage after the last frame
    let mut padded = bytes.clone();
    padded.push(0);
    std::fs::write(&path, &padded).unwrap();
    assert_corrupt(load_keypoints(&path), &path);

    // negative row count
    let mut negative = 1u64.to_le_bytes().to_vec();
    negative.extend_from_slice(&(-2i32).to_le_bytes());
    negative.extend_from_slice(&4i32.to_le_bytes());
    std::fs::write(&path, &negative).unwrap();
    assert_corrupt(load_descriptors(&path), &path);

    // huge frame count with no frames behind it
    std::fs::write(&path, u64::MAX.to_le_bytes()).unwrap();
    assert_corrupt(load_keypoints(&path), &path);
}

#[test]
fn test_in_memory_codec() {
    let frames = vec![random_descriptors(2, 3, 9)];
    let mut buf = Vec::new();
    io::write_descriptors(&mut buf, &frames).unwrap();
    let decoded = io::read_descriptors(&mut buf.as_slice(), Path::new("memory")).unwrap();
    assert_eq!(decoded, frames);
}

fn read_report(path: &Path) -> Vec<Vec<String>> {
    csv::ReaderBuilder::new()
        .has_headers(false)
        .from_path(path)
        .unwrap()
        .records()
        .map(|r| r.unwrap().iter().map(str::to_string).collect())
        .collect()
}

#[test]
fn test_evaluation_report_append() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("eval.csv");
    let row = |c: f64| EvaluationRow {
        quality: 0.75,
        position_error: 1.5,
        angle_error: 2.0,
        confidence: c,
    };

    io::write_evaluation(&path, &[row(0.5), row(1.0)], false).unwrap();
    io::write_evaluation(&path, &[row(0.25)], true).unwrap();
    let records = read_report(&path);
    assert_eq!(records.len(), 4);
    assert_eq!(records[0], EVALUATION_HEADER);
    assert_eq!(records[0][0], "Quality");
    for (record, confidence) in records[1..].iter().zip([0.5, 1.0, 0.25]) {
        let values: Vec<f64> = record.iter().map(|v| v.parse().unwrap()).collect();
        assert_eq!(values, vec![0.75, 1.5, 2.0, confidence]);
    }

    let mut reader = csv::ReaderBuilder::new().from_path(&path).unwrap();
    let rows: Vec<EvaluationRow> = reader.deserialize().map(|r| r.unwrap()).collect();
    assert_eq!(rows, vec![row(0.5), row(1.0), row(0.25)]);

    // a fresh write replaces the report
    io::write_evaluation(&path, &[], false).unwrap();
    assert_eq!(read_report(&path).len(), 1);
}

#[test]
fn test_config_json() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.json");

    let mut config = RecoveryConfig::default();
    config.ransac.seed = 7;
    config.max_keypoints_per_frame = 500;
    io::object_to_json(&path, &config).unwrap();
    let loaded: RecoveryConfig = io::object_from_json(&path).unwrap();
    assert_eq!(loaded, config);

    let partial_json = r#"{
        "confidence_threshold": 0.8,
        "ransac": {"max_iterations": 10},
        "quality": {"quality_threshold": 0.3}
    }"#;
    std::fs::write(&path, partial_json).unwrap();
    let partial: RecoveryConfig = io::object_from_json(&path).unwrap();
    assert_eq!(partial.confidence_threshold, 0.8);
    assert_eq!(partial.quality.quality_threshold, 0.3);
    assert_eq!(partial.quality.gradient_meters_per_pixel, 0.5);
    assert_eq!(partial.ransac.max_iterations, 10);
    assert_eq!(partial.ransac.confidence, 0.995);
    assert_eq!(partial.reprojection_threshold_px, 3.0);

    std::fs::write(&path, "{ not json").unwrap();
    assert_corrupt(io::object_from_json::<RecoveryConfig>(&path), &path);
    let missing = temp_dir.path().join("none.json");
    assert!(matches!(
        io::object_from_json::<RecoveryConfig>(&missing),
        Err(Error::ResourceMissing(_))
    ));
}
