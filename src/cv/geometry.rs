// src/cv/geometry.rs

use crate::{Point2f, Point2i, Quad};

/// Closed-curve Douglas-Peucker simplification.
///
/// The farthest-point search seeds the split, so the first returned vertex
/// is not necessarily the first contour point.
///
/// # Arguments
/// * `contour` - The input boundary points.
/// * `epsilon` - Maximum allowed distance between the curve and its approximation.
///
/// # Returns
/// The approximating polygon vertices, in contour traversal order.
pub fn approx_poly_dp(contour: &[Point2i], epsilon: f64) -> Vec<Point2i> {
    let len = contour.len();
    if len == 0 {
        return Vec::new();
    }

    #[derive(Clone, Copy)]
    struct Slice {
        start_index: usize,
        end_index: usize,
    }

    let mut slice = Slice {
        start_index: 0,
        end_index: 0,
    };
    let mut right_slice = Slice {
        start_index: 0,
        end_index: 0,
    };
    let mut poly = Vec::new();
    let mut stack = Vec::new();

    let epsilon_sq = epsilon * epsilon;

    let mut k = 0;
    let mut start_pt = contour[0];
    let mut max_dist = 0.0;

    // Three rounds of "farthest from the current start" pick a stable split.
    for _ in 0..3 {
        max_dist = 0.0;
        k = (k + right_slice.start_index) % len;
        start_pt = contour[k];
        k += 1;
        if k == len {
            k = 0;
        }

        for j in 1..len {
            let pt = contour[k];
            k += 1;
            if k == len {
                k = 0;
            }

            let dx = (pt.x - start_pt.x) as f64;
            let dy = (pt.y - start_pt.y) as f64;
            let dist = dx * dx + dy * dy;

            if dist > max_dist {
                max_dist = dist;
                right_slice.start_index = j;
            }
        }
    }

    if max_dist <= epsilon_sq {
        poly.push(start_pt);
    } else {
        slice.start_index = k;
        right_slice.start_index += slice.start_index;
        slice.end_index = right_slice.start_index;

        right_slice.start_index -= if right_slice.start_index >= len {
            len
        } else {
            0
        };
        right_slice.end_index = slice.start_index;
        if right_slice.end_index < right_slice.start_index {
            right_slice.end_index += len;
        }

        stack.push(right_slice);
        stack.push(slice);
    }

    while let Some(mut current_slice) = stack.pop() {
        let end_pt = contour[current_slice.end_index % len];
        k = current_slice.start_index % len;
        start_pt = contour[k];
        k += 1;
        if k == len {
            k = 0;
        }

        let le_eps = if current_slice.end_index <= current_slice.start_index + 1 {
            true
        } else {
            max_dist = 0.0;
            let dx = (end_pt.x - start_pt.x) as f64;
            let dy = (end_pt.y - start_pt.y) as f64;

            for i in (current_slice.start_index + 1)..current_slice.end_index {
                let pt = contour[k];
                k += 1;
                if k == len {
                    k = 0;
                }

                let dist = (((pt.y - start_pt.y) as f64) * dx - ((pt.x - start_pt.x) as f64) * dy)
                    .abs();

                if dist > max_dist {
                    max_dist = dist;
                    right_slice.start_index = i;
                }
            }

            max_dist * max_dist <= epsilon_sq * (dx * dx + dy * dy)
        };

        if le_eps {
            poly.push(start_pt);
        } else {
            right_slice.end_index = current_slice.end_index;
            current_slice.end_index = right_slice.start_index;

            stack.push(right_slice);
            stack.push(current_slice);
        }
    }

    poly
}

/// Closed perimeter of a polygon, summing Euclidean edge lengths.
pub fn perimeter(poly: &[Point2f]) -> f32 {
    let n = poly.len();
    (0..n).map(|i| (poly[(i + 1) % n] - poly[i]).norm()).sum()
}

/// Smallest squared edge length of a closed integer polygon.
pub fn min_edge_length_sq(poly: &[Point2i]) -> i64 {
    let len = poly.len();
    if len <= 1 {
        return 0;
    }

    let mut min_d = i64::MAX;
    let mut j = len - 1;
    for i in 0..len {
        let dx = (poly[i].x - poly[j].x) as i64;
        let dy = (poly[i].y - poly[j].y) as i64;
        min_d = min_d.min(dx * dx + dy * dy);
        j = i;
    }
    min_d
}

/// Tests whether a closed polygon is convex.
///
/// Every turn must have the same direction; a zero turn (collinear or
/// repeated vertex) counts as non-convex.
pub fn is_contour_convex(contour: &[Point2i]) -> bool {
    let len = contour.len();
    if len < 3 {
        return false;
    }

    let mut orientation = 0;

    let mut prev_pt = contour[len - 1];
    let mut cur_pt = contour[0];

    let mut dx0 = cur_pt.x - prev_pt.x;
    let mut dy0 = cur_pt.y - prev_pt.y;

    let mut j = 0;
    for _ in 0..len {
        j += 1;
        if j == len {
            j = 0;
        }

        prev_pt = cur_pt;
        cur_pt = contour[j];

        let dx = cur_pt.x - prev_pt.x;
        let dy = cur_pt.y - prev_pt.y;

        // i64 prevents cross-product overflow on large coordinates
        let dxdy0 = (dx as i64) * (dy0 as i64);
        let dydx0 = (dy as i64) * (dx0 as i64);

        orientation |= if dydx0 > dxdy0 {
            1
        } else if dydx0 < dxdy0 {
            2
        } else {
            3
        };

        if orientation == 3 {
            return false;
        }

        dx0 = dx;
        dy0 = dy;
    }

    true
}

/// The one place integer contour vertices become floating point corners.
pub fn to_quad(poly: &[Point2i; 4]) -> Quad {
    poly.map(|p| Point2f::new(p.x as f32, p.y as f32))
}

/// Cross product of `p1 - p0` and `p2 - p0`. Non-negative means corners
/// 0, 1, 2 turn clockwise on screen (counter-clockwise with y pointing up).
pub fn winding_cross(quad: &Quad) -> f32 {
    let v1 = quad[1] - quad[0];
    let v2 = quad[2] - quad[0];
    v1.x * v2.y - v1.y * v2.x
}

/// Mean squared distance between corresponding corners of two quads.
pub fn mean_corner_dist_sq(a: &Quad, b: &Quad) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(p, q)| (p - q).norm_squared())
        .sum::<f32>()
        / 4.0
}
