use glam::DVec2;
use log::debug;
use nalgebra as na;

/// Similarity that moves the centroid to the origin and the mean distance to
/// sqrt(2), and the normalized points. `None` when all points coincide.
fn normalize_points(points: &[DVec2]) -> Option<(Vec<DVec2>, na::Matrix3<f64>)> {
    let n = points.len() as f64;
    let centroid = points.iter().fold(DVec2::ZERO, |acc, p| acc + *p) / n;
    let mean_dist = points.iter().map(|p| (*p - centroid).length()).sum::<f64>() / n;
    if mean_dist < f64::EPSILON {
        return None;
    }
    let s = std::f64::consts::SQRT_2 / mean_dist;
    let t = na::Matrix3::new(
        s,
        0.0,
        -s * centroid.x,
        0.0,
        s,
        -s * centroid.y,
        0.0,
        0.0,
        1.0,
    );
    let normalized = points.iter().map(|p| (*p - centroid) * s).collect();
    Some((normalized, t))
}

/// Normalized direct linear transform: `H` with `dst ~ H * src`, scaled so
/// that `H[(2, 2)] == 1` when possible.
pub fn dlt_homography(src: &[DVec2], dst: &[DVec2]) -> Option<na::Matrix3<f64>> {
    let n = src.len();
    if n < 4 || dst.len() != n {
        return None;
    }
    let (src_n, t_src) = normalize_points(src)?;
    let (dst_n, t_dst) = normalize_points(dst)?;

    // padded to square so the null vector is among the right singular vectors
    let mut a = na::DMatrix::<f64>::zeros((2 * n).max(9), 9);
    for (i, (p, q)) in src_n.iter().zip(&dst_n).enumerate() {
        let (x, y, u, v) = (p.x, p.y, q.x, q.y);
        let r0 = 2 * i;
        let r1 = r0 + 1;
        a[(r0, 0)] = -x;
        a[(r0, 1)] = -y;
        a[(r0, 2)] = -1.0;
        a[(r0, 6)] = u * x;
        a[(r0, 7)] = u * y;
        a[(r0, 8)] = u;

        a[(r1, 3)] = -x;
        a[(r1, 4)] = -y;
        a[(r1, 5)] = -1.0;
        a[(r1, 6)] = v * x;
        a[(r1, 7)] = v * y;
        a[(r1, 8)] = v;
    }

    let svd = a.svd(false, true);
    let v_t = svd.v_t?;
    let (min_idx, _) = svd.singular_values.argmin();
    let h = v_t.row(min_idx);
    let h_mat = na::Matrix3::new(h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], h[8]);

    let Some(t_dst_inv) = t_dst.try_inverse() else {
        debug!("dlt: normalization not invertible");
        return None;
    };
    let mut h_mat = t_dst_inv * h_mat * t_src;
    let w = h_mat[(2, 2)];
    if w.abs() > f64::EPSILON {
        h_mat /= w;
    }
    if !h_mat.iter().all(|v| v.is_finite()) {
        return None;
    }
    Some(h_mat)
}

/// Distance between `H * src` and `dst`, infinite when `src` maps to infinity.
pub fn reprojection_error(h_mat: &na::Matrix3<f64>, src: DVec2, dst: DVec2) -> f64 {
    let p = h_mat * na::Vector3::new(src.x, src.y, 1.0);
    if p.z.abs() < f64::EPSILON {
        return f64::INFINITY;
    }
    DVec2::new(p.x / p.z, p.y / p.z).distance(dst)
}

/// Whether three of the four points are (nearly) collinear.
pub(crate) fn has_collinear_triplet(pts: &[DVec2; 4]) -> bool {
    const TRIPLETS: [[usize; 3]; 4] = [[0, 1, 2], [0, 1, 3], [0, 2, 3], [1, 2, 3]];
    let scale = pts
        .iter()
        .flat_map(|p| [p.x.abs(), p.y.abs()])
        .fold(1.0, f64::max);
    TRIPLETS.iter().any(|&[i, j, k]| {
        let area = (pts[j] - pts[i]).perp_dot(pts[k] - pts[i]);
        area.abs() <= f64::EPSILON * scale * scale * 16.0
    })
}
