//! Error types for trajectory recovery

use std::path::PathBuf;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Trajectory recovery error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Two collections that must be paired by index disagree in size
    #[error("Dimension mismatch in {context}: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// What was being paired
        context: &'static str,
        /// Expected size
        expected: usize,
        /// Actual size
        actual: usize,
    },

    /// Frame, keypoint or cloud index outside known bounds
    #[error("Index {index} out of range (len {len})")]
    IndexOutOfRange {
        /// Requested index
        index: usize,
        /// Number of valid entries
        len: usize,
    },

    /// Homogeneous division by (near) zero
    #[error("Invalid transform: {0}")]
    InvalidTransform(String),

    /// RANSAC could not reach a consensus of at least four correspondences
    #[error("Homography estimation failed: {correspondences} correspondences, {inliers} inliers")]
    EstimationFailed {
        /// Correspondences supplied to the estimator
        correspondences: usize,
        /// Best consensus found
        inliers: usize,
    },

    /// A persisted resource does not exist
    #[error("Resource missing: {}", .0.display())]
    ResourceMissing(PathBuf),

    /// A persisted resource exists but cannot be decoded
    #[error("Resource corrupt: {}: {reason}", .path.display())]
    ResourceCorrupt {
        /// Offending file
        path: PathBuf,
        /// What was wrong with it
        reason: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV writing error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Image decoding error
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

impl Error {
    pub(crate) fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Error::ResourceCorrupt {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
