use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::{Parser, Subcommand};
use glam::DVec2;
use log::{error, info};
use trajectory_recovery::data_loader::{
    estimate_trajectory_quality, feature_paths, frame_center, load_features, load_trajectory,
};
use trajectory_recovery::io::{self, EvaluationRow};
use trajectory_recovery::transform::{local_angle, normalize_angle};
use trajectory_recovery::{
    CloudRestorer, DistanceMetric, Error, FramePose, FrameFeatures, FrameQualityEstimator,
    RecoveryConfig, RecoveryResult, TrajectoryFrame, TrajectoryRecover,
};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Recover every frame of a query trajectory against a train trajectory
    Recover {
        /// Train trajectory CSV
        train: PathBuf,

        /// Query trajectory CSV
        query: PathBuf,

        /// Detector name the cached keypoints were computed with
        detector: String,

        /// Descriptor name: SIFT SURF KAZE AKAZE BRISK ORB FREAK
        descriptor: String,

        /// Evaluation CSV to write
        output: PathBuf,

        /// Append rows to an existing evaluation CSV
        #[arg(short, long)]
        append: bool,

        /// Add confidently recovered query frames to the cloud as they are processed
        #[arg(short, long)]
        incremental: bool,

        /// Recovery configuration JSON
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Print per-frame counts of cached feature blocks
    Inspect {
        /// Keypoint block
        keypoints: PathBuf,

        /// Descriptor block
        descriptors: Option<PathBuf>,
    },
    /// Write the default recovery configuration
    DefaultConfig {
        /// Output JSON path
        output: PathBuf,
    },
}

/// Trajectory headings turn opposite to image rotation.
fn map_pose(frame: &TrajectoryFrame) -> FramePose {
    FramePose {
        angle: -frame.pose.angle,
        ..frame.pose
    }
}

/// Heading is measured around the frame center, where the position is taken.
fn evaluate(
    frame: &TrajectoryFrame,
    result: &RecoveryResult,
    center: DVec2,
    quality: f64,
) -> EvaluationRow {
    let angle = result
        .homography
        .and_then(|h| local_angle(&h, center).ok())
        .unwrap_or(result.angle);
    EvaluationRow {
        quality,
        position_error: result.position.distance(frame.pose.position),
        angle_error: normalize_angle(-angle - frame.pose.angle).abs(),
        confidence: result.confidence,
    }
}

fn load_trajectory_features(
    csv: &Path,
    detector: &str,
    descriptor: &str,
) -> Result<(Vec<TrajectoryFrame>, Vec<FrameFeatures>), Error> {
    let frames = load_trajectory(csv)?;
    let paths = feature_paths(csv, detector, descriptor);
    let features = load_features(&paths).inspect_err(|e| {
        if let Error::ResourceMissing(_) = e {
            error!(
                "no cached features for {}, extract them into {} and {}",
                csv.display(),
                paths.keypoints.display(),
                paths.descriptors.display()
            );
        }
    })?;
    if features.len() != frames.len() {
        return Err(Error::DimensionMismatch {
            context: "cached feature frames vs trajectory",
            expected: frames.len(),
            actual: features.len(),
        });
    }
    Ok((frames, features))
}

#[allow(clippy::too_many_arguments)]
fn recover(
    train: &Path,
    query: &Path,
    detector: &str,
    descriptor: &str,
    output: &Path,
    append: bool,
    incremental: bool,
    config: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config: RecoveryConfig = match config {
        Some(p) => io::object_from_json(p)?,
        None => RecoveryConfig::default(),
    };
    let metric = DistanceMetric::for_family(descriptor)
        .ok_or_else(|| format!("descriptor {} not found", descriptor))?;

    let now = Instant::now();
    let (train_frames, train_features) = load_trajectory_features(train, detector, descriptor)?;
    let (query_frames, query_features) = load_trajectory_features(query, detector, descriptor)?;

    let estimator = FrameQualityEstimator::new(config.quality.clone());
    let qualities = estimate_trajectory_quality(&query_frames, &estimator)?;

    let mut restorer = CloudRestorer::with_metric(config, metric);
    for (frame, features) in train_frames.iter().zip(train_features) {
        let center = frame_center(&frame.image_path)?;
        restorer.add_frame(center, features, &map_pose(frame))?;
    }
    info!(
        "cloud of {} frames, {} keypoints built in {:.3} sec",
        restorer.frames_count(),
        restorer.cloud().len(),
        now.elapsed().as_secs_f64()
    );

    let queries = query_frames
        .iter()
        .zip(query_features)
        .map(|(frame, features)| Ok((features, frame_center(&frame.image_path)?)))
        .collect::<Result<Vec<(FrameFeatures, DVec2)>, Error>>()?;
    let centers: Vec<DVec2> = queries.iter().map(|(_, center)| *center).collect();

    let now = Instant::now();
    let results: Vec<RecoveryResult> = if incremental {
        let mut session = TrajectoryRecover::new(restorer);
        let mut results = Vec::with_capacity(queries.len());
        for (features, center) in queries {
            results.push(session.recover_and_append(features, center)?.clone());
        }
        results
    } else {
        restorer
            .recover_many(&queries)
            .into_iter()
            .collect::<Result<_, _>>()?
    };
    let duration_sec = now.elapsed().as_secs_f64();
    info!(
        "recovered {} frames in {:.3} sec, avg {:.4} sec",
        results.len(),
        duration_sec,
        duration_sec / results.len().max(1) as f64
    );

    let rows: Vec<EvaluationRow> = query_frames
        .iter()
        .zip(&results)
        .zip(centers.iter().zip(&qualities))
        .map(|((frame, result), (center, quality))| evaluate(frame, result, *center, *quality))
        .collect();
    io::write_evaluation(output, &rows, append)?;
    info!("wrote {}", output.display());
    Ok(())
}

fn inspect(keypoints: &Path, descriptors: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let kps = io::load_keypoints(keypoints)?;
    let dscr = descriptors.map(|p| io::load_descriptors(p)).transpose()?;
    println!("{} frames", kps.len());
    for (i, frame_kps) in kps.iter().enumerate() {
        match dscr.as_ref().and_then(|d| d.get(i)) {
            Some(m) => println!(
                "frame {}: {} keypoints, {}x{} descriptors",
                i,
                frame_kps.len(),
                m.rows(),
                m.cols()
            ),
            None => println!("frame {}: {} keypoints", i, frame_kps.len()),
        }
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    match args.command {
        Commands::Recover {
            train,
            query,
            detector,
            descriptor,
            output,
            append,
            incremental,
            config,
        } => recover(
            &train,
            &query,
            &detector,
            &descriptor,
            &output,
            append,
            incremental,
            config.as_deref(),
        ),
        Commands::Inspect {
            keypoints,
            descriptors,
        } => inspect(&keypoints, descriptors.as_deref()),
        Commands::DefaultConfig { output } => {
            io::object_to_json(&output, &RecoveryConfig::default())?;
            Ok(())
        }
    }
}
