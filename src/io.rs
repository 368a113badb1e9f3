//! Persistence of feature blocks, configuration and evaluation reports.
//!
//! Keypoint block (little-endian):
//! - frame count: u64
//! - per frame: keypoint count u64, then per keypoint
//!   x f32, y f32, size f32, angle f32, response f32, octave i32, class_id i32
//!
//! Descriptor block (little-endian):
//! - frame count: u64
//! - per frame: rows i32, cols i32, then rows * cols f32, row-major
//!
//! The evaluation report is a CSV with one row per query frame.
//!
//! A file that does not exist loads as [`Error::ResourceMissing`]; anything
//! that cannot be decoded loads as [`Error::ResourceCorrupt`].

use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::Path;

use glam::Vec2;
use log::trace;
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::detected_points::{DescriptorMatrix, KeyPoint};
use crate::error::{Error, Result};

/// Bytes of one keypoint record
pub const KEYPOINT_RECORD_SIZE: usize = 28;

/// Serializes an object to a JSON file.
pub fn object_to_json<T: Serialize>(output_path: impl AsRef<Path>, object: &T) -> Result<()> {
    let j = serde_json::to_string_pretty(object)?;
    std::fs::write(output_path, j)?;
    Ok(())
}

/// Deserializes an object from a JSON file.
pub fn object_from_json<T: DeserializeOwned>(file_path: impl AsRef<Path>) -> Result<T> {
    let file_path = file_path.as_ref();
    let contents = std::fs::read_to_string(file_path).map_err(|e| open_error(file_path, e))?;
    serde_json::from_str(&contents).map_err(|e| Error::corrupt(file_path, e.to_string()))
}

fn open_error(path: &Path, e: std::io::Error) -> Error {
    if e.kind() == ErrorKind::NotFound {
        Error::ResourceMissing(path.to_path_buf())
    } else {
        Error::corrupt(path, e.to_string())
    }
}

fn open_block(path: &Path) -> Result<BufReader<File>> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|e| open_error(path, e))
}

/// Reads exactly `N` bytes, a short read means the block is corrupt.
fn read_array<const N: usize, R: Read>(reader: &mut R, path: &Path) -> Result<[u8; N]> {
    let mut buf = [0u8; N];
    reader
        .read_exact(&mut buf)
        .map_err(|e| Error::corrupt(path, format!("truncated block: {}", e)))?;
    Ok(buf)
}

fn read_u64<R: Read>(reader: &mut R, path: &Path) -> Result<u64> {
    Ok(u64::from_le_bytes(read_array(reader, path)?))
}

fn read_i32<R: Read>(reader: &mut R, path: &Path) -> Result<i32> {
    Ok(i32::from_le_bytes(read_array(reader, path)?))
}

fn expect_end<R: Read>(reader: &mut R, path: &Path) -> Result<()> {
    let mut trailing = [0u8; 1];
    match reader.read(&mut trailing) {
        Ok(0) => Ok(()),
        Ok(_) => Err(Error::corrupt(path, "trailing bytes after last frame")),
        Err(e) => Err(Error::corrupt(path, e.to_string())),
    }
}

/// Keeps a corrupt count from reserving absurd amounts of memory up front.
fn capacity_hint(count: u64) -> usize {
    count.min(1 << 16) as usize
}

pub fn write_keypoints<W: Write>(writer: &mut W, frames: &[Vec<KeyPoint>]) -> std::io::Result<()> {
    writer.write_all(&(frames.len() as u64).to_le_bytes())?;
    for kps in frames {
        writer.write_all(&(kps.len() as u64).to_le_bytes())?;
        for kp in kps {
            let mut record = [0u8; KEYPOINT_RECORD_SIZE];
            record[0..4].copy_from_slice(&kp.pt.x.to_le_bytes());
            record[4..8].copy_from_slice(&kp.pt.y.to_le_bytes());
            record[8..12].copy_from_slice(&kp.size.to_le_bytes());
            record[12..16].copy_from_slice(&kp.angle.to_le_bytes());
            record[16..20].copy_from_slice(&kp.response.to_le_bytes());
            record[20..24].copy_from_slice(&kp.octave.to_le_bytes());
            record[24..28].copy_from_slice(&kp.class_id.to_le_bytes());
            writer.write_all(&record)?;
        }
    }
    Ok(())
}

/// `path` only labels errors.
pub fn read_keypoints<R: Read>(reader: &mut R, path: &Path) -> Result<Vec<Vec<KeyPoint>>> {
    let frame_count = read_u64(reader, path)?;
    let mut frames = Vec::with_capacity(capacity_hint(frame_count));
    for _ in 0..frame_count {
        let count = read_u64(reader, path)?;
        let mut kps = Vec::with_capacity(capacity_hint(count));
        for _ in 0..count {
            let r: [u8; KEYPOINT_RECORD_SIZE] = read_array(reader, path)?;
            let f = |i: usize| f32::from_le_bytes([r[i], r[i + 1], r[i + 2], r[i + 3]]);
            let d = |i: usize| i32::from_le_bytes([r[i], r[i + 1], r[i + 2], r[i + 3]]);
            kps.push(KeyPoint {
                pt: Vec2::new(f(0), f(4)),
                size: f(8),
                angle: f(12),
                response: f(16),
                octave: d(20),
                class_id: d(24),
            });
        }
        frames.push(kps);
    }
    expect_end(reader, path)?;
    Ok(frames)
}

pub fn save_keypoints(path: impl AsRef<Path>, frames: &[Vec<KeyPoint>]) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path.as_ref())?);
    write_keypoints(&mut writer, frames)?;
    writer.flush()?;
    trace!("saved keypoints of {} frames to {}", frames.len(), path.as_ref().display());
    Ok(())
}

pub fn load_keypoints(path: impl AsRef<Path>) -> Result<Vec<Vec<KeyPoint>>> {
    let path = path.as_ref();
    read_keypoints(&mut open_block(path)?, path)
}

pub fn write_descriptors<W: Write>(
    writer: &mut W,
    frames: &[DescriptorMatrix],
) -> std::io::Result<()> {
    writer.write_all(&(frames.len() as u64).to_le_bytes())?;
    for m in frames {
        writer.write_all(&(m.rows() as i32).to_le_bytes())?;
        writer.write_all(&(m.cols() as i32).to_le_bytes())?;
        for v in m.as_slice() {
            writer.write_all(&v.to_le_bytes())?;
        }
    }
    Ok(())
}

/// `path` only labels errors.
pub fn read_descriptors<R: Read>(reader: &mut R, path: &Path) -> Result<Vec<DescriptorMatrix>> {
    let frame_count = read_u64(reader, path)?;
    let mut frames = Vec::with_capacity(capacity_hint(frame_count));
    for frame_idx in 0..frame_count {
        let rows = read_i32(reader, path)?;
        let cols = read_i32(reader, path)?;
        if rows < 0 || cols < 0 {
            return Err(Error::corrupt(
                path,
                format!("frame {} has negative size {}x{}", frame_idx, rows, cols),
            ));
        }
        let len = rows as u64 * cols as u64;
        let mut data = Vec::with_capacity(capacity_hint(len));
        for _ in 0..len {
            data.push(f32::from_le_bytes(read_array(reader, path)?));
        }
        let m = DescriptorMatrix::from_vec(rows as usize, cols as usize, data)
            .map_err(|e| Error::corrupt(path, e.to_string()))?;
        frames.push(m);
    }
    expect_end(reader, path)?;
    Ok(frames)
}

pub fn save_descriptors(path: impl AsRef<Path>, frames: &[DescriptorMatrix]) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path.as_ref())?);
    write_descriptors(&mut writer, frames)?;
    writer.flush()?;
    trace!("saved descriptors of {} frames to {}", frames.len(), path.as_ref().display());
    Ok(())
}

pub fn load_descriptors(path: impl AsRef<Path>) -> Result<Vec<DescriptorMatrix>> {
    let path = path.as_ref();
    read_descriptors(&mut open_block(path)?, path)
}

/// One row of the evaluation report, named after the [`EVALUATION_HEADER`] columns.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRow {
    /// Image quality of the query frame, in [0, 1]
    #[serde(rename = "Quality")]
    pub quality: f64,
    /// Map distance between recovered and ground truth frame centers
    #[serde(rename = "euclid_distance_btw_centers")]
    pub position_error: f64,
    /// Absolute heading difference, degrees
    #[serde(rename = "angle_difference_degree")]
    pub angle_error: f64,
    /// Share of rough matches kept by RANSAC
    pub confidence: f64,
}

pub const EVALUATION_HEADER: [&str; 4] = [
    "Quality",
    "euclid_distance_btw_centers",
    "angle_difference_degree",
    "confidence",
];

/// Writes the evaluation report; with `append` the rows go after an existing
/// report and no header is written.
pub fn write_evaluation(
    output_path: impl AsRef<Path>,
    rows: &[EvaluationRow],
    append: bool,
) -> Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .append(append)
        .truncate(!append)
        .open(output_path)?;
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(file);
    if !append {
        writer.write_record(EVALUATION_HEADER)?;
    }
    for r in rows {
        writer.serialize(r)?;
    }
    writer.flush()?;
    Ok(())
}
