use std::ops::Range;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A point of interest in a frame, following OpenCV conventions.
///
/// `pt` is in frame-local pixels until the keypoint is rebased into map space,
/// after which it holds map coordinates and `angle`/`size` follow the frame pose.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KeyPoint {
    pub pt: Vec2,
    /// Diameter of the meaningful neighbourhood
    pub size: f32,
    /// Orientation in degrees
    pub angle: f32,
    /// Detector response, larger is stronger
    pub response: f32,
    pub octave: i32,
    pub class_id: i32,
}

impl KeyPoint {
    pub fn new(x: f32, y: f32, size: f32, angle: f32, response: f32) -> KeyPoint {
        KeyPoint {
            pt: Vec2::new(x, y),
            size,
            angle,
            response,
            octave: 0,
            class_id: -1,
        }
    }
}

/// How two descriptor rows are compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DistanceMetric {
    L2,
    L2Squared,
    /// Bitwise distance over rows whose values are bytes (0..=255).
    Hamming,
}

impl DistanceMetric {
    /// Norm used by a detector/descriptor family, by name.
    pub fn for_family(name: &str) -> Option<DistanceMetric> {
        match name.to_ascii_uppercase().as_str() {
            "SIFT" | "SURF" | "KAZE" | "AKAZE" => Some(DistanceMetric::L2Squared),
            "BRISK" | "ORB" | "FREAK" => Some(DistanceMetric::Hamming),
            _ => None,
        }
    }

    pub fn distance(&self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            DistanceMetric::L2 => DistanceMetric::L2Squared.distance(a, b).sqrt(),
            DistanceMetric::L2Squared => a
                .iter()
                .zip(b)
                .map(|(x, y)| (x - y) * (x - y))
                .sum(),
            DistanceMetric::Hamming => a
                .iter()
                .zip(b)
                .map(|(x, y)| ((*x as u8) ^ (*y as u8)).count_ones())
                .sum::<u32>() as f32,
        }
    }
}

/// Row-major descriptor block, row `i` describes keypoint `i`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DescriptorMatrix {
    cols: usize,
    data: Vec<f32>,
}

impl DescriptorMatrix {
    pub fn new(cols: usize) -> DescriptorMatrix {
        DescriptorMatrix {
            cols,
            data: Vec::new(),
        }
    }

    pub fn from_vec(rows: usize, cols: usize, data: Vec<f32>) -> Result<DescriptorMatrix> {
        if data.len() != rows * cols {
            return Err(Error::DimensionMismatch {
                context: "descriptor data length",
                expected: rows * cols,
                actual: data.len(),
            });
        }
        Ok(DescriptorMatrix { cols, data })
    }

    pub fn from_rows(rows: &[Vec<f32>]) -> Result<DescriptorMatrix> {
        let cols = rows.first().map_or(0, |r| r.len());
        let mut m = DescriptorMatrix::new(cols);
        for r in rows {
            m.push_row(r)?;
        }
        Ok(m)
    }

    pub fn rows(&self) -> usize {
        if self.cols == 0 {
            0
        } else {
            self.data.len() / self.cols
        }
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub fn row(&self, i: usize) -> &[f32] {
        &self.data[i * self.cols..(i + 1) * self.cols]
    }

    pub fn iter_rows(&self) -> impl Iterator<Item = &[f32]> {
        // chunks_exact panics on zero width
        self.data.chunks_exact(self.cols.max(1))
    }

    pub fn push_row(&mut self, row: &[f32]) -> Result<()> {
        if self.data.is_empty() && self.cols == 0 {
            self.cols = row.len();
        }
        if row.len() != self.cols {
            return Err(Error::DimensionMismatch {
                context: "descriptor row width",
                expected: self.cols,
                actual: row.len(),
            });
        }
        self.data.extend_from_slice(row);
        Ok(())
    }

    /// Appends every row of `other`. An empty matrix adopts `other`'s width.
    pub fn append(&mut self, other: &DescriptorMatrix) -> Result<()> {
        if other.is_empty() {
            return Ok(());
        }
        if self.data.is_empty() {
            self.cols = other.cols;
        } else if other.cols != self.cols {
            return Err(Error::DimensionMismatch {
                context: "descriptor row width",
                expected: self.cols,
                actual: other.cols,
            });
        }
        self.data.extend_from_slice(&other.data);
        Ok(())
    }

    pub fn slice_rows(&self, rows: Range<usize>) -> DescriptorMatrix {
        DescriptorMatrix {
            cols: self.cols,
            data: self.data[rows.start * self.cols..rows.end * self.cols].to_vec(),
        }
    }

    /// New matrix made of the given rows, in the given order.
    pub fn select_rows(&self, indices: &[usize]) -> DescriptorMatrix {
        let mut data = Vec::with_capacity(indices.len() * self.cols);
        for &i in indices {
            data.extend_from_slice(self.row(i));
        }
        DescriptorMatrix {
            cols: self.cols,
            data,
        }
    }
}

/// Nearest-descriptor correspondence between a query keypoint and a cloud keypoint.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Match {
    pub query_idx: usize,
    /// Global index into the keypoint cloud
    pub cloud_idx: usize,
    pub distance: f32,
}

/// Keypoints of one frame with their paired descriptors.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameFeatures {
    pub keypoints: Vec<KeyPoint>,
    pub descriptors: DescriptorMatrix,
}

impl FrameFeatures {
    pub fn new(keypoints: Vec<KeyPoint>, descriptors: DescriptorMatrix) -> Result<FrameFeatures> {
        check_pairing(&keypoints, &descriptors)?;
        Ok(FrameFeatures {
            keypoints,
            descriptors,
        })
    }

    pub fn len(&self) -> usize {
        self.keypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keypoints.is_empty()
    }
}

pub(crate) fn check_pairing(keypoints: &[KeyPoint], descriptors: &DescriptorMatrix) -> Result<()> {
    if descriptors.rows() != keypoints.len() {
        return Err(Error::DimensionMismatch {
            context: "descriptor rows vs keypoints",
            expected: keypoints.len(),
            actual: descriptors.rows(),
        });
    }
    Ok(())
}
