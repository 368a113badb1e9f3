use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, Trim};
use glam::DVec2;
use image::ImageReader;
use indicatif::ParallelProgressIterator;
use log::{info, trace, warn};
use rayon::prelude::*;

use crate::detected_points::FrameFeatures;
use crate::error::{Error, Result};
use crate::features::{FeatureExtractor, extract_ranked};
use crate::io;
use crate::quality::FrameQualityEstimator;
use crate::types::{FramePose, TrajectoryFrame};

const HEADER_FIRST_CELL: &str = "Path";

/// Parses trajectory rows `path,x_m,y_m,angle_deg,m_per_px`.
///
/// Image paths are resolved against `folder`. Fields may be quoted, a
/// leading byte order mark and a header row starting with `Path` are skipped.
/// `source` only labels errors.
pub fn parse_trajectory(
    contents: &str,
    folder: &Path,
    source: &Path,
) -> Result<Vec<TrajectoryFrame>> {
    let contents = contents.strip_prefix('\u{feff}').unwrap_or(contents);
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(contents.as_bytes());

    let mut frames = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| Error::corrupt(source, e.to_string()))?;
        let line = record.position().map_or(0, |p| p.line());
        if record.get(0) == Some(HEADER_FIRST_CELL) {
            continue;
        }
        if record.len() < 5 {
            return Err(Error::corrupt(
                source,
                format!("line {}: expected 5 columns, got {}", line, record.len()),
            ));
        }
        let number = |i: usize| -> Result<f64> {
            record[i].parse::<f64>().map_err(|e| {
                Error::corrupt(source, format!("line {} column {}: {}", line, i + 1, e))
            })
        };
        frames.push(TrajectoryFrame {
            image_path: folder.join(&record[0]),
            pose: FramePose::new(
                DVec2::new(number(1)?, number(2)?),
                number(3)?,
                number(4)?,
            ),
        });
    }
    Ok(frames)
}

pub fn load_trajectory(csv_path: impl AsRef<Path>) -> Result<Vec<TrajectoryFrame>> {
    let csv_path = csv_path.as_ref();
    let contents = std::fs::read_to_string(csv_path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::ResourceMissing(csv_path.to_path_buf())
        } else {
            Error::Io(e)
        }
    })?;
    let folder = csv_path.parent().unwrap_or_else(|| Path::new(""));
    let frames = parse_trajectory(&contents, folder, csv_path)?;
    trace!("loaded {} frames from {}", frames.len(), csv_path.display());
    Ok(frames)
}

/// Pixel center of a frame image, read from its header only.
pub fn frame_center(image_path: impl AsRef<Path>) -> Result<DVec2> {
    let (w, h) = image::image_dimensions(image_path)?;
    Ok(DVec2::new(w as f64 / 2.0, h as f64 / 2.0))
}

/// Cached feature blocks of one trajectory.
#[derive(Debug, Clone, PartialEq)]
pub struct FeaturePaths {
    pub keypoints: PathBuf,
    pub descriptors: PathBuf,
}

/// Cache files beside the trajectory CSV, keyed by detector and descriptor.
pub fn feature_paths(csv_path: impl AsRef<Path>, detector: &str, descriptor: &str) -> FeaturePaths {
    let csv_path = csv_path.as_ref();
    let stem = csv_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let folder = csv_path.parent().unwrap_or_else(|| Path::new(""));
    FeaturePaths {
        keypoints: folder.join(format!("{}_{}.kp.bin", stem, detector)),
        descriptors: folder.join(format!("{}_{}_{}.dscr.bin", stem, detector, descriptor)),
    }
}

/// Loads both blocks and pairs them per frame.
pub fn load_features(paths: &FeaturePaths) -> Result<Vec<FrameFeatures>> {
    let keypoints = io::load_keypoints(&paths.keypoints)?;
    let descriptors = io::load_descriptors(&paths.descriptors)?;
    if keypoints.len() != descriptors.len() {
        return Err(Error::corrupt(
            &paths.descriptors,
            format!(
                "{} descriptor frames for {} keypoint frames",
                descriptors.len(),
                keypoints.len()
            ),
        ));
    }
    keypoints
        .into_iter()
        .zip(descriptors)
        .enumerate()
        .map(|(i, (kps, dscr))| {
            FrameFeatures::new(kps, dscr)
                .map_err(|e| Error::corrupt(&paths.descriptors, format!("frame {}: {}", i, e)))
        })
        .collect()
}

pub fn save_features(paths: &FeaturePaths, features: &[FrameFeatures]) -> Result<()> {
    let keypoints: Vec<_> = features.iter().map(|f| f.keypoints.clone()).collect();
    let descriptors: Vec<_> = features.iter().map(|f| f.descriptors.clone()).collect();
    io::save_keypoints(&paths.keypoints, &keypoints)?;
    io::save_descriptors(&paths.descriptors, &descriptors)
}

/// Decodes every frame image and extracts its strongest `max_count` features,
/// frames in parallel.
pub fn extract_trajectory_features<E: FeatureExtractor + Sync + ?Sized>(
    frames: &[TrajectoryFrame],
    extractor: &E,
    max_count: usize,
) -> Result<Vec<FrameFeatures>> {
    frames
        .par_iter()
        .progress_count(frames.len() as u64)
        .map(|frame| {
            let img = ImageReader::open(&frame.image_path)?.decode()?;
            extract_ranked(extractor, &img, max_count)
        })
        .collect()
}

/// Image quality of every frame at its own ground resolution, frames in parallel.
pub fn estimate_trajectory_quality(
    frames: &[TrajectoryFrame],
    estimator: &FrameQualityEstimator,
) -> Result<Vec<f64>> {
    frames
        .par_iter()
        .progress_count(frames.len() as u64)
        .map(|frame| {
            let img = ImageReader::open(&frame.image_path)?.decode()?;
            Ok(estimator.estimate(&img, frame.pose.meters_per_pixel))
        })
        .collect()
}

/// Loads cached features, or extracts and caches them when the cache is absent.
///
/// A cache that exists but cannot be decoded, or that holds a different
/// number of frames than the trajectory, is an error and is left untouched.
pub fn load_or_extract_features<E: FeatureExtractor + Sync + ?Sized>(
    frames: &[TrajectoryFrame],
    extractor: &E,
    paths: &FeaturePaths,
    max_count: usize,
) -> Result<Vec<FrameFeatures>> {
    match load_features(paths) {
        Ok(features) if features.len() == frames.len() => Ok(features),
        Ok(features) => Err(Error::corrupt(
            &paths.keypoints,
            format!(
                "cache holds {} frames, trajectory has {}",
                features.len(),
                frames.len()
            ),
        )),
        Err(Error::ResourceMissing(missing)) => {
            warn!("{} does not exist", missing.display());
            info!("extracting {} features of {} frames", extractor.name(), frames.len());
            let features = extract_trajectory_features(frames, extractor, max_count)?;
            save_features(paths, &features)?;
            info!("saved features to {}", paths.keypoints.display());
            Ok(features)
        }
        Err(e) => Err(e),
    }
}
