//! Feature based recovery of frame poses against a geo-registered keypoint cloud.
//!
//! Reference frames are rebased into map coordinates and aggregated into a
//! [`cloud::KeypointCloud`]. A query frame is matched against the cloud, a
//! homography is fitted by RANSAC and its similarity part gives the query's
//! map position, heading and scale together with a consensus confidence.
//! Frames are also scored for image quality by [`quality::FrameQualityEstimator`].

pub mod cloud;
pub mod config;
pub mod data_loader;
pub mod detected_points;
pub mod error;
pub mod features;
pub mod io;
pub mod matcher;
pub mod optimization;
pub mod quality;
pub mod restorer;
pub mod trajectory_recover;
pub mod transform;
pub mod types;

pub use cloud::KeypointCloud;
pub use config::{QualityConfig, RansacConfig, RecoveryConfig};
pub use detected_points::{DescriptorMatrix, DistanceMetric, FrameFeatures, KeyPoint, Match};
pub use error::{Error, Result};
pub use features::FeatureExtractor;
pub use matcher::{BruteForceMatcher, DescriptorMatcher};
pub use quality::FrameQualityEstimator;
pub use restorer::CloudRestorer;
pub use trajectory_recover::TrajectoryRecover;
pub use types::{FramePose, RecoveryResult, TrajectoryFrame};
