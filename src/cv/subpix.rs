// src/cv/subpix.rs
//
// Gradient based sub-pixel corner refinement. For a true corner q every
// image gradient g_i sampled at p_i in its neighbourhood is orthogonal to
// (p_i - q), so q solves the weighted normal equations
//   sum(g g^T) q = sum(g g^T p).

use crate::cv::TermCriteria;
use crate::{ImageBuffer, Point2f};

/// Bilinear sample with border replication.
#[inline]
fn sample(src: &ImageBuffer, x: f64, y: f64) -> f64 {
    let w = src.width as usize;
    let h = src.height as usize;
    let xc = x.clamp(0.0, (w - 1) as f64);
    let yc = y.clamp(0.0, (h - 1) as f64);
    let x0 = xc.floor() as usize;
    let y0 = yc.floor() as usize;
    let x1 = (x0 + 1).min(w - 1);
    let y1 = (y0 + 1).min(h - 1);
    let fx = xc - x0 as f64;
    let fy = yc - y0 as f64;

    let p = |xx: usize, yy: usize| src.data[yy * w + xx] as f64;
    let top = p(x0, y0) * (1.0 - fx) + p(x1, y0) * fx;
    let bottom = p(x0, y1) * (1.0 - fx) + p(x1, y1) * fx;
    top * (1.0 - fy) + bottom * fy
}

/// Gaussian weights over the `(2 * window + 1)^2` search window, zeroed
/// inside the dead zone.
fn window_mask(window: usize, zero_zone: i32) -> Vec<f64> {
    let win = window as i32;
    let side = (2 * win + 1) as usize;
    let coeff = 1.0 / (window * window) as f64;
    let weights: Vec<f64> = (-win..=win)
        .map(|i| (-(i * i) as f64 * coeff).exp())
        .collect();

    let mut mask = vec![0.0; side * side];
    for (r, wy) in weights.iter().enumerate() {
        for (c, wx) in weights.iter().enumerate() {
            mask[r * side + c] = wx * wy;
        }
    }

    if zero_zone >= 0 && zero_zone < win {
        for r in (win - zero_zone)..=(win + zero_zone) {
            for c in (win - zero_zone)..=(win + zero_zone) {
                mask[r as usize * side + c as usize] = 0.0;
            }
        }
    }
    mask
}

/// Refines `corners` in place.
///
/// A corner whose refinement wanders more than `window` pixels from its
/// starting point is reset to that starting point.
pub fn corner_sub_pix(
    src: &ImageBuffer,
    corners: &mut [Point2f],
    window: usize,
    zero_zone: i32,
    criteria: TermCriteria,
) {
    if src.width < 2 || src.height < 2 || window == 0 {
        return;
    }

    let win = window as i32;
    let side = (2 * win + 1) as usize;
    let mask = window_mask(window, zero_zone);
    let eps_sq = criteria.epsilon * criteria.epsilon;
    let max_iter = criteria.max_iter.max(1);

    // Window plus a one pixel apron for central differences.
    let patch_side = side + 2;
    let mut patch = vec![0.0f64; patch_side * patch_side];

    for corner in corners.iter_mut() {
        let start = (corner.x as f64, corner.y as f64);
        let (mut cx, mut cy) = start;

        for _ in 0..max_iter {
            for r in 0..patch_side {
                let py = cy + (r as i32 - win - 1) as f64;
                for c in 0..patch_side {
                    let px = cx + (c as i32 - win - 1) as f64;
                    patch[r * patch_side + c] = sample(src, px, py);
                }
            }

            let (mut a, mut b, mut c) = (0.0, 0.0, 0.0);
            let (mut bb1, mut bb2) = (0.0, 0.0);
            for i in 0..side {
                let py = i as f64 - win as f64;
                for j in 0..side {
                    let m = mask[i * side + j];
                    let at = |rr: usize, cc: usize| patch[rr * patch_side + cc];
                    let gx = at(i + 1, j + 2) - at(i + 1, j);
                    let gy = at(i + 2, j + 1) - at(i, j + 1);
                    let gxx = gx * gx * m;
                    let gxy = gx * gy * m;
                    let gyy = gy * gy * m;
                    let px = j as f64 - win as f64;

                    a += gxx;
                    b += gxy;
                    c += gyy;
                    bb1 += gxx * px + gxy * py;
                    bb2 += gxy * px + gyy * py;
                }
            }

            let det = a * c - b * b;
            if det.abs() <= f64::EPSILON * f64::EPSILON {
                break;
            }

            let scale = 1.0 / det;
            let nx = cx + c * scale * bb1 - b * scale * bb2;
            let ny = cy - b * scale * bb1 + a * scale * bb2;
            let step_sq = (nx - cx).powi(2) + (ny - cy).powi(2);
            cx = nx;
            cy = ny;

            if cx < 0.0
                || cx >= src.width as f64
                || cy < 0.0
                || cy >= src.height as f64
                || step_sq <= eps_sq
            {
                break;
            }
        }

        if (cx - start.0).abs() > window as f64 || (cy - start.1).abs() > window as f64 {
            cx = start.0;
            cy = start.1;
        }

        *corner = Point2f::new(cx as f32, cy as f32);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// White canvas with a black square covering `[x0, x1) x [y0, y1)`.
    fn black_square(w: u32, h: u32, x0: u32, y0: u32, x1: u32, y1: u32) -> Vec<u8> {
        let mut data = vec![255u8; (w * h) as usize];
        for y in y0..y1 {
            for x in x0..x1 {
                data[(y * w + x) as usize] = 0;
            }
        }
        data
    }

    const CRITERIA: TermCriteria = TermCriteria {
        max_iter: 30,
        epsilon: 0.1,
    };

    #[test]
    fn converges_towards_square_corner() {
        let data = black_square(60, 60, 20, 20, 45, 45);
        let img = ImageBuffer {
            data: &data,
            width: 60,
            height: 60,
        };

        // The intensity edge sits between pixel 19 and 20.
        let truth = Point2f::new(19.5, 19.5);
        let mut corners = [Point2f::new(21.0, 18.5)];
        let before = (corners[0] - truth).norm();
        corner_sub_pix(&img, &mut corners, 5, -1, CRITERIA);
        let after = (corners[0] - truth).norm();

        assert!(after < before, "before {before}, after {after}");
        assert!(after < 0.6, "after {after}");
    }

    #[test]
    fn flat_region_leaves_corner_untouched() {
        let data = vec![128u8; 40 * 40];
        let img = ImageBuffer {
            data: &data,
            width: 40,
            height: 40,
        };
        let mut corners = [Point2f::new(20.0, 20.0)];
        corner_sub_pix(&img, &mut corners, 5, -1, CRITERIA);
        assert_eq!(corners[0], Point2f::new(20.0, 20.0));
    }

    #[test]
    fn mask_zeroes_dead_zone() {
        let mask = window_mask(3, 1);
        let side = 7;
        assert_eq!(mask[3 * side + 3], 0.0);
        assert_eq!(mask[2 * side + 4], 0.0);
        assert!(mask[0] > 0.0);
        assert!((window_mask(3, -1)[3 * side + 3] - 1.0).abs() < 1e-12);
    }
}
