// src/cv/contours.rs

use crate::{ImageBuffer, Point2i};

/// 8-neighbourhood offsets (x, y), counter-clockwise starting east.
pub const NEIGHBORHOOD: [[i32; 2]; 8] = [
    [1, 0],
    [1, -1],
    [0, -1],
    [-1, -1],
    [-1, 0],
    [-1, 1],
    [0, 1],
    [1, 1],
];

/// A closed boundary traced in a binary image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contour {
    /// Every boundary pixel, in tracing order.
    pub points: Vec<Point2i>,
    /// Whether this contour bounds a hole inside another region.
    pub hole: bool,
}

impl Contour {
    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Label buffer with a one pixel zero frame around the binary image, so the
/// tracer never needs bounds checks. Foreground pixels start as label 1.
struct PaddedLabels {
    labels: Vec<i32>,
    stride: usize,
}

impl PaddedLabels {
    fn from_binary(src: &ImageBuffer) -> Self {
        let width = src.width as usize;
        let height = src.height as usize;
        let stride = width + 2;
        let mut labels = vec![0i32; stride * (height + 2)];

        for (y, row) in src.data.chunks_exact(width.max(1)).take(height).enumerate() {
            let base = (y + 1) * stride + 1;
            for (x, &px) in row.iter().enumerate() {
                labels[base + x] = i32::from(px != 0);
            }
        }

        Self { labels, stride }
    }

    /// Flat offsets of the 8 neighbours, repeated so a scan may run past 7.
    fn deltas(&self) -> [isize; 16] {
        let mut deltas = [0isize; 16];
        for (i, [dx, dy]) in NEIGHBORHOOD.iter().enumerate() {
            let delta = *dx as isize + *dy as isize * self.stride as isize;
            deltas[i] = delta;
            deltas[i + 8] = delta;
        }
        deltas
    }

    /// Suzuki-Abe border following from `pos`, relabelling the traced border
    /// with `nbd` (or `-nbd` where the border touches the right-hand
    /// background) so it is not traced twice.
    fn follow_border(
        &mut self,
        pos: usize,
        nbd: i32,
        mut point: Point2i,
        hole: bool,
        deltas: &[isize; 16],
    ) -> Contour {
        let src = &mut self.labels;
        let mut points = Vec::new();

        let step = |from: usize, dir: usize| (from as isize + deltas[dir]) as usize;

        let mut s: usize = if hole { 0 } else { 4 };
        let mut s_end = s;
        let mut pos1;

        // Clockwise search for the first non-zero neighbour.
        loop {
            s = s.wrapping_sub(1) & 7;
            pos1 = step(pos, s);
            if src[pos1] != 0 || s == s_end {
                break;
            }
        }

        if src[pos1] == 0 {
            // Isolated pixel.
            src[pos] = -nbd;
            points.push(point);
            return Contour { points, hole };
        }

        let mut pos3 = pos;
        loop {
            s_end = s;

            let mut pos4;
            loop {
                s = (s + 1) & 15;
                pos4 = step(pos3, s);
                if src[pos4] != 0 {
                    break;
                }
            }
            s &= 7;

            // The examined neighbour set wrapped past east: pos3 borders
            // background on the right.
            if (s.wrapping_sub(1) as u32) < s_end as u32 {
                src[pos3] = -nbd;
            } else if src[pos3] == 1 {
                src[pos3] = nbd;
            }

            points.push(point);
            point.x += NEIGHBORHOOD[s][0];
            point.y += NEIGHBORHOOD[s][1];

            if pos4 == pos && pos3 == pos1 {
                break;
            }

            pos3 = pos4;
            s = (s + 4) & 7;
        }

        Contour { points, hole }
    }
}

/// Traces every outer border and hole border of a binary image.
///
/// Retrieval is flat (no hierarchy) and keeps every traced pixel. Contours
/// come out in raster order of their starting pixel.
pub fn find_contours(src: &ImageBuffer) -> Vec<Contour> {
    let width = src.width as usize;
    let height = src.height as usize;
    let mut contours = Vec::new();
    if width == 0 || height == 0 {
        return contours;
    }

    let mut padded = PaddedLabels::from_binary(src);
    let deltas = padded.deltas();
    let stride = padded.stride;

    let mut nbd = 1;
    for y in 0..height {
        let mut pos = (y + 1) * stride + 1;
        for x in 0..width {
            let pix = padded.labels[pos];
            if pix != 0 {
                let outer = pix == 1 && padded.labels[pos - 1] == 0;
                let hole = !outer && pix >= 1 && padded.labels[pos + 1] == 0;

                if outer || hole {
                    nbd += 1;
                    let start = Point2i::new(x as i32, y as i32);
                    contours.push(padded.follow_border(pos, nbd, start, hole, &deltas));
                }
            }
            pos += 1;
        }
    }

    contours
}

/// Keeps contours with strictly more than `min_points` points.
pub fn filter_by_length(contours: Vec<Contour>, min_points: usize) -> Vec<Contour> {
    contours
        .into_iter()
        .filter(|c| c.len() > min_points)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(data: &[u8], width: u32, height: u32) -> ImageBuffer<'_> {
        ImageBuffer {
            data,
            width,
            height,
        }
    }

    #[test]
    fn ring_yields_outer_and_hole() {
        let src_data = [
            0, 0, 0, 0, 0, //
            0, 255, 255, 255, 0, //
            0, 255, 0, 255, 0, //
            0, 255, 255, 255, 0, //
            0, 0, 0, 0, 0,
        ];
        let contours = find_contours(&image(&src_data, 5, 5));

        assert_eq!(contours.len(), 2);
        assert!(!contours[0].hole);
        assert!(contours[1].hole);
        assert_eq!(contours[0].points[0], Point2i::new(1, 1));
        // 3x3 ring: 8 border pixels
        assert_eq!(contours[0].len(), 8);
    }

    #[test]
    fn isolated_pixel_is_single_point_contour() {
        let src_data = [
            0, 0, 0, //
            0, 255, 0, //
            0, 0, 0,
        ];
        let contours = find_contours(&image(&src_data, 3, 3));
        assert_eq!(contours.len(), 1);
        assert_eq!(contours[0].points, vec![Point2i::new(1, 1)]);
    }

    #[test]
    fn blank_image_has_no_contours() {
        let src_data = [0u8; 64];
        assert!(find_contours(&image(&src_data, 8, 8)).is_empty());
    }

    #[test]
    fn filled_square_touching_border_is_traced() {
        let src_data = [255u8; 16];
        let contours = find_contours(&image(&src_data, 4, 4));
        assert_eq!(contours.len(), 1);
        assert_eq!(contours[0].len(), 12);
    }

    #[test]
    fn length_filter_is_strict() {
        let c = |n: usize| Contour {
            points: vec![Point2i::new(0, 0); n],
            hole: false,
        };
        let kept = filter_by_length(vec![c(3), c(4), c(5)], 4);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].len(), 5);
    }
}
