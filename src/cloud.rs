//! Concatenated keypoints and descriptors of many frames.
//!
//! Insertion order defines the global index of every keypoint; the boundary
//! index maps a global index back to the frame that contributed it.

use log::trace;

use crate::detected_points::{DescriptorMatrix, KeyPoint, check_pairing};
use crate::error::{Error, Result};

#[derive(Debug, Clone)]
pub struct KeypointCloud {
    keypoints: Vec<KeyPoint>,
    descriptors: DescriptorMatrix,
    /// `boundaries[i]..boundaries[i + 1]` are the global indices of frame `i`
    boundaries: Vec<usize>,
}

impl Default for KeypointCloud {
    fn default() -> Self {
        KeypointCloud {
            keypoints: Vec::new(),
            descriptors: DescriptorMatrix::default(),
            boundaries: vec![0],
        }
    }
}

impl KeypointCloud {
    pub fn new() -> KeypointCloud {
        KeypointCloud::default()
    }

    /// Appends one frame. The cloud is left untouched on error.
    pub fn add_frame(
        &mut self,
        keypoints: &[KeyPoint],
        descriptors: &DescriptorMatrix,
    ) -> Result<usize> {
        self.check_frame(keypoints, descriptors)?;
        self.descriptors.append(descriptors)?;
        self.keypoints.extend_from_slice(keypoints);
        self.boundaries.push(self.keypoints.len());
        let frame_idx = self.frame_count() - 1;
        trace!("cloud: frame {} adds {} keypoints", frame_idx, keypoints.len());
        Ok(frame_idx)
    }

    /// Validates a frame without appending it.
    pub fn check_frame(
        &self,
        keypoints: &[KeyPoint],
        descriptors: &DescriptorMatrix,
    ) -> Result<()> {
        check_pairing(keypoints, descriptors)?;
        if !self.descriptors.is_empty()
            && !descriptors.is_empty()
            && descriptors.cols() != self.descriptors.cols()
        {
            return Err(Error::DimensionMismatch {
                context: "descriptor width vs cloud",
                expected: self.descriptors.cols(),
                actual: descriptors.cols(),
            });
        }
        Ok(())
    }

    /// `(frame index, local index)` of a global keypoint index.
    pub fn resolve(&self, global_idx: usize) -> Result<(usize, usize)> {
        if global_idx >= self.keypoints.len() {
            return Err(Error::IndexOutOfRange {
                index: global_idx,
                len: self.keypoints.len(),
            });
        }
        // first boundary strictly greater than the index closes its frame;
        // frames without keypoints share a boundary and are skipped
        let frame_idx = self.boundaries.partition_point(|&b| b <= global_idx) - 1;
        Ok((frame_idx, global_idx - self.boundaries[frame_idx]))
    }

    pub fn frame_count(&self) -> usize {
        self.boundaries.len() - 1
    }

    pub fn len(&self) -> usize {
        self.keypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keypoints.is_empty()
    }

    pub fn boundaries(&self) -> &[usize] {
        &self.boundaries
    }

    pub fn keypoints(&self) -> &[KeyPoint] {
        &self.keypoints
    }

    pub fn descriptors(&self) -> &DescriptorMatrix {
        &self.descriptors
    }

    pub fn keypoint(&self, global_idx: usize) -> Result<&KeyPoint> {
        self.keypoints.get(global_idx).ok_or(Error::IndexOutOfRange {
            index: global_idx,
            len: self.keypoints.len(),
        })
    }

    pub fn keypoints_of(&self, frame_idx: usize) -> Result<&[KeyPoint]> {
        let range = self.frame_range(frame_idx)?;
        Ok(&self.keypoints[range])
    }

    pub fn descriptors_of(&self, frame_idx: usize) -> Result<DescriptorMatrix> {
        let range = self.frame_range(frame_idx)?;
        Ok(self.descriptors.slice_rows(range))
    }

    fn frame_range(&self, frame_idx: usize) -> Result<std::ops::Range<usize>> {
        if frame_idx >= self.frame_count() {
            return Err(Error::IndexOutOfRange {
                index: frame_idx,
                len: self.frame_count(),
            });
        }
        Ok(self.boundaries[frame_idx]..self.boundaries[frame_idx + 1])
    }
}
