//! 2-D homogeneous transforms between frame pixels and map coordinates.
//!
//! A chain of [`Transformation`]s is read in application order: the first
//! element is applied to a point first. Building the local to map transform of
//! a frame is therefore
//! `[Translate(-center), Rotate(angle), Scale(m_per_px), Translate(position)]`.

use glam::DVec2;
use log::trace;
use nalgebra as na;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

const W_EPSILON: f64 = 1e-12;

/// Offset of the second reference point used by [`decompose`].
const DECOMPOSE_OFFSET: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Transformation {
    Translate(DVec2),
    /// Rotation in degrees
    Rotate(f64),
    Scale(f64),
}

impl Transformation {
    pub fn matrix(&self) -> na::Matrix3<f64> {
        match *self {
            Transformation::Translate(v) => {
                na::Matrix3::new(1.0, 0.0, v.x, 0.0, 1.0, v.y, 0.0, 0.0, 1.0)
            }
            Transformation::Rotate(deg) => {
                let (s, c) = deg.to_radians().sin_cos();
                na::Matrix3::new(c, -s, 0.0, s, c, 0.0, 0.0, 0.0, 1.0)
            }
            Transformation::Scale(k) => {
                na::Matrix3::new(k, 0.0, 0.0, 0.0, k, 0.0, 0.0, 0.0, 1.0)
            }
        }
    }
}

/// Product of the chain, first element applied first.
pub fn compose(chain: &[Transformation]) -> na::Matrix3<f64> {
    chain
        .iter()
        .fold(na::Matrix3::identity(), |acc, t| t.matrix() * acc)
}

pub fn transform_point(point: DVec2, m: &na::Matrix3<f64>) -> Result<DVec2> {
    let p = m * na::Vector3::new(point.x, point.y, 1.0);
    if p.z.abs() < W_EPSILON {
        return Err(Error::InvalidTransform(format!(
            "point ({}, {}) maps to infinity",
            point.x, point.y
        )));
    }
    Ok(DVec2::new(p.x / p.z, p.y / p.z))
}

pub fn transform_points(points: &[DVec2], m: &na::Matrix3<f64>) -> Result<Vec<DVec2>> {
    points.iter().map(|p| transform_point(*p, m)).collect()
}

/// Approximate similarity parameters of a projective transform.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Similarity {
    pub translation: DVec2,
    /// Degrees
    pub angle: f64,
    pub scale: f64,
}

/// Extracts translation, rotation and scale by mapping the origin and a point
/// offset along x, then measuring the image of that offset vector.
///
/// Exact for similarities only; under real perspective distortion the angle
/// and scale are those of the local displacement near the origin. When either
/// reference point maps to infinity the "no displacement" sentinel
/// (`Similarity::default()`) is returned.
pub fn decompose(m: &na::Matrix3<f64>) -> Similarity {
    let origin = DVec2::ZERO;
    let offset = DVec2::new(DECOMPOSE_OFFSET, 0.0);
    let (Ok(o), Ok(p)) = (transform_point(origin, m), transform_point(offset, m)) else {
        trace!("decompose: reference point at infinity");
        return Similarity::default();
    };
    let moved = p - o;
    Similarity {
        translation: o,
        angle: angle_between(offset - origin, moved),
        scale: moved.length() / (offset - origin).length(),
    }
}

/// Rotation of `m` around `point`: the angle by which the offset along x from
/// `point` is turned. Equals [`decompose`]'s angle for similarities, and
/// differs from it under perspective unless `point` is the origin.
pub fn local_angle(m: &na::Matrix3<f64>, point: DVec2) -> Result<f64> {
    let offset = DVec2::new(DECOMPOSE_OFFSET, 0.0);
    let moved = transform_point(point + offset, m)? - transform_point(point, m)?;
    Ok(angle_between(offset, moved))
}

/// Signed angle in degrees rotating `from` onto `to`, in (-180, 180].
pub fn angle_between(from: DVec2, to: DVec2) -> f64 {
    let a = to.y.atan2(to.x) - from.y.atan2(from.x);
    normalize_angle(a.to_degrees())
}

/// Wraps degrees into (-180, 180].
pub fn normalize_angle(deg: f64) -> f64 {
    let mut a = deg % 360.0;
    if a <= -180.0 {
        a += 360.0;
    } else if a > 180.0 {
        a -= 360.0;
    }
    a
}
