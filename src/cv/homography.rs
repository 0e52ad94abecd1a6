// src/cv/homography.rs

use nalgebra::{Matrix3, SMatrix, SVector, Vector2, Vector3};

use crate::Point2f;

/// Planar projective mapping `dst ~ H * src`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Homography {
    pub h: Matrix3<f64>,
}

impl Homography {
    pub fn new(h: Matrix3<f64>) -> Self {
        Self { h }
    }

    /// Maps a point, returning `None` when it lands on the line at infinity.
    #[inline]
    pub fn apply(&self, x: f64, y: f64) -> Option<Vector2<f64>> {
        let v = self.h * Vector3::new(x, y, 1.0);
        if v.z.abs() < 1e-12 {
            return None;
        }
        Some(Vector2::new(v.x / v.z, v.y / v.z))
    }

    /// Homography taking the `size` x `size` canonical square (corners at
    /// `0` and `size - 1`) onto `quad`.
    pub fn square_to_quad(quad: &[Point2f; 4], size: usize) -> Option<Self> {
        let s = size.saturating_sub(1) as f64;
        let square = [
            Vector2::new(0.0, 0.0),
            Vector2::new(s, 0.0),
            Vector2::new(s, s),
            Vector2::new(0.0, s),
        ];
        let dst = quad.map(|p| Vector2::new(p.x as f64, p.y as f64));
        homography_from_4pt(&square, &dst)
    }
}

fn hartley_normalization(pts: &[Vector2<f64>; 4]) -> ([Vector2<f64>; 4], Matrix3<f64>) {
    let centroid = pts.iter().fold(Vector2::zeros(), |acc, p| acc + p) / 4.0;
    let mean_dist = pts.iter().map(|p| (p - centroid).norm()).sum::<f64>() / 4.0;
    let s = if mean_dist > 1e-12 {
        std::f64::consts::SQRT_2 / mean_dist
    } else {
        1.0
    };

    let t = Matrix3::new(
        s, 0.0, -s * centroid.x, //
        0.0, s, -s * centroid.y, //
        0.0, 0.0, 1.0,
    );
    (pts.map(|p| (p - centroid) * s), t)
}

/// True when some three of the four points are (nearly) collinear.
fn has_collinear_triplet(pts: &[Vector2<f64>; 4]) -> bool {
    const TRIPLETS: [[usize; 3]; 4] = [[0, 1, 2], [0, 1, 3], [0, 2, 3], [1, 2, 3]];
    TRIPLETS.iter().any(|&[a, b, c]| {
        let u = pts[b] - pts[a];
        let v = pts[c] - pts[a];
        (u.x * v.y - u.y * v.x).abs() < 1e-9
    })
}

/// Compute H such that `dst ~ H * src` from exactly four correspondences.
///
/// Returns `None` for degenerate configurations (three collinear points,
/// repeated points).
pub fn homography_from_4pt(src: &[Vector2<f64>; 4], dst: &[Vector2<f64>; 4]) -> Option<Homography> {
    let (src_n, t_src) = hartley_normalization(src);
    let (dst_n, t_dst) = hartley_normalization(dst);
    if has_collinear_triplet(&src_n) || has_collinear_triplet(&dst_n) {
        return None;
    }

    // Unknowns [h11 h12 h13 h21 h22 h23 h31 h32], h33 = 1.
    let mut a = SMatrix::<f64, 8, 8>::zeros();
    let mut b = SVector::<f64, 8>::zeros();

    for k in 0..4 {
        let (x, y) = (src_n[k].x, src_n[k].y);
        let (u, v) = (dst_n[k].x, dst_n[k].y);

        let r0 = 2 * k;
        a[(r0, 0)] = x;
        a[(r0, 1)] = y;
        a[(r0, 2)] = 1.0;
        a[(r0, 6)] = -u * x;
        a[(r0, 7)] = -u * y;
        b[r0] = u;

        let r1 = 2 * k + 1;
        a[(r1, 3)] = x;
        a[(r1, 4)] = y;
        a[(r1, 5)] = 1.0;
        a[(r1, 6)] = -v * x;
        a[(r1, 7)] = -v * y;
        b[r1] = v;
    }

    let x = a.lu().solve(&b)?;
    if x.iter().any(|v| !v.is_finite()) {
        return None;
    }

    let hn = Matrix3::new(
        x[0], x[1], x[2], //
        x[3], x[4], x[5], //
        x[6], x[7], 1.0,
    );

    let h = t_dst.try_inverse()? * hn * t_src;
    let scale = h[(2, 2)];
    if scale.abs() < 1e-12 {
        return None;
    }
    Some(Homography::new(h / scale))
}
