// src/cv/scalar.rs
#![allow(clippy::needless_range_loop)]

use crate::cv::homography::Homography;
use crate::cv::{subpix, ComputerVision, Square, TermCriteria};
use crate::{Frame, ImageBuffer, PixelFormat, Point2f, Quad};

/// Scalar (non-SIMD) implementation of Computer Vision operations.
pub struct ScalarCV;

#[inline]
fn luma(r: u8, g: u8, b: u8) -> u8 {
    // Weighted average: 0.299R + 0.587G + 0.114B
    (r as f32 * 0.299 + g as f32 * 0.587 + b as f32 * 0.114 + 0.5) as u8
}

impl ComputerVision for ScalarCV {
    /// Converts a frame of any supported layout to grayscale.
    fn grayscale(src: &Frame, dst: &mut [u8]) {
        let bpp = src.format.bytes_per_pixel();
        let pixels = src.data.chunks_exact(bpp).zip(dst.iter_mut());

        match src.format {
            PixelFormat::Gray8 => {
                for (px, out) in pixels {
                    *out = px[0];
                }
            }
            PixelFormat::Rgb8 | PixelFormat::Rgba8 => {
                for (px, out) in pixels {
                    *out = luma(px[0], px[1], px[2]);
                }
            }
            PixelFormat::Bgr8 => {
                for (px, out) in pixels {
                    *out = luma(px[2], px[1], px[0]);
                }
            }
        }
    }

    fn threshold(src: &[u8], dst: &mut [u8], threshold: u8) {
        let mut tab = [0u8; 256];

        // Build lookup table
        for i in 0..256 {
            tab[i] = if (i as u8) <= threshold { 0 } else { 255 };
        }

        for (out, &px) in dst.iter_mut().zip(src.iter()) {
            *out = tab[px as usize];
        }
    }

    fn otsu(src: &[u8]) -> u8 {
        let len = src.len();
        let mut hist = [0u32; 256];
        let mut threshold = 0;
        let mut sum = 0.0;
        let mut sum_b = 0.0;
        let mut w_b = 0.0;
        let mut max = 0.0;

        for &pixel in src.iter() {
            hist[pixel as usize] += 1;
        }

        for i in 0..256 {
            sum += (hist[i] as f64) * (i as f64);
        }

        for i in 0..256 {
            w_b += hist[i] as f64;
            if w_b != 0.0 {
                let w_f = (len as f64) - w_b;
                if w_f == 0.0 {
                    break;
                }

                sum_b += (hist[i] as f64) * (i as f64);

                let mu = sum_b / w_b - (sum - sum_b) / w_f;
                let between = w_b * w_f * mu * mu;

                if between > max {
                    max = between;
                    threshold = i as u8;
                }
            }
        }

        threshold
    }

    /// Two separable running-sum passes over a `(2k + 1)` window with edge
    /// replication; the division is a fixed-point multiply and shift.
    fn stack_box_blur(src: &ImageBuffer, dst: &mut [u8], kernel_size: usize) {
        const STACK_BOX_BLUR_MULT: [u32; 16] = [
            1, 171, 205, 293, 57, 373, 79, 137, 241, 27, 391, 357, 41, 19, 283, 265,
        ];
        const STACK_BOX_BLUR_SHIFT: [u32; 16] =
            [0, 9, 10, 11, 9, 12, 10, 11, 12, 9, 13, 13, 10, 9, 13, 13];

        let src_data = src.data;
        let height = src.height as usize;
        let width = src.width as usize;
        if width == 0 || height == 0 {
            return;
        }

        let kernel_size = kernel_size.min(15);
        let width_minus_1 = width - 1;
        let height_minus_1 = height - 1;
        let size = kernel_size * 2 + 1;
        let radius = kernel_size + 1;
        let mult = STACK_BOX_BLUR_MULT[kernel_size];
        let shift = STACK_BOX_BLUR_SHIFT[kernel_size];

        let mut stack = [0u8; 31];

        // Horizontal pass
        let mut pos = 0;
        for _y in 0..height {
            let start = pos;

            let color = src_data[pos] as u32;
            let mut sum = (radius as u32) * color;

            let mut sp = 0;
            for _ in 0..radius {
                stack[sp] = color as u8;
                sp = (sp + 1) % size;
            }
            for i in 1..radius {
                let c = src_data[start + i.min(width_minus_1)];
                stack[sp] = c;
                sum += c as u32;
                sp = (sp + 1) % size;
            }

            let mut stack_start = 0;
            for x in 0..width {
                dst[pos] = ((sum * mult) >> shift) as u8;
                pos += 1;

                let p = start + (x + radius).min(width_minus_1);

                sum -= stack[stack_start] as u32;
                let c = src_data[p];
                sum += c as u32;

                stack[stack_start] = c;
                stack_start = (stack_start + 1) % size;
            }
        }

        // Vertical pass, in place over the horizontal result.
        for x in 0..width {
            let mut pos = x;

            let color = dst[pos] as u32;
            let mut sum = (radius as u32) * color;

            let mut sp = 0;
            for _ in 0..radius {
                stack[sp] = color as u8;
                sp = (sp + 1) % size;
            }
            for i in 1..radius {
                let c = dst[x + i.min(height_minus_1) * width];
                stack[sp] = c;
                sum += c as u32;
                sp = (sp + 1) % size;
            }

            let mut stack_start = 0;
            for y in 0..height {
                dst[pos] = ((sum * mult) >> shift) as u8;

                let p = x + (y + radius).min(height_minus_1) * width;

                sum -= stack[stack_start] as u32;
                let c = dst[p];
                sum += c as u32;

                stack[stack_start] = c;
                stack_start = (stack_start + 1) % size;

                pos += width;
            }
        }
    }

    fn adaptive_threshold(src: &ImageBuffer, dst: &mut [u8], kernel_size: usize, threshold: u8) {
        let mut tab = [0u8; 768];

        Self::stack_box_blur(src, dst, kernel_size);

        // Index is src - mean shifted by 255 so the table covers -255..=510.
        for i in 0..768 {
            let val = i as i32 - 255;
            tab[i] = if val <= -(threshold as i32) { 255 } else { 0 };
        }

        for (out, &px) in dst.iter_mut().zip(src.data.iter()) {
            let idx = (px as i32) - (*out as i32) + 255;
            *out = tab[idx as usize];
        }
    }

    fn warp(src: &ImageBuffer, dst: &mut [u8], contour: &Quad, warp_size: usize) -> bool {
        let width = src.width as usize;
        let height = src.height as usize;
        if width == 0 || height == 0 || warp_size == 0 {
            return false;
        }

        let h = match Homography::square_to_quad(contour, warp_size) {
            Some(h) => h,
            None => return false,
        };

        let src_data = src.data;
        let max_x = (width - 1) as f64;
        let max_y = (height - 1) as f64;

        for (i, row) in dst.chunks_exact_mut(warp_size).take(warp_size).enumerate() {
            for (j, out) in row.iter_mut().enumerate() {
                let Some(p) = h.apply(j as f64, i as f64) else {
                    *out = 0;
                    continue;
                };

                let x = p.x.clamp(0.0, max_x);
                let y = p.y.clamp(0.0, max_y);

                let sx1 = x as usize;
                let sx2 = (sx1 + 1).min(width - 1);
                let dx1 = x - sx1 as f64;
                let dx2 = 1.0 - dx1;

                let sy1 = y as usize;
                let sy2 = (sy1 + 1).min(height - 1);
                let dy1 = y - sy1 as f64;
                let dy2 = 1.0 - dy1;

                let p1 = sy1 * width;
                let p3 = sy2 * width;

                let val = dy2
                    * (dx2 * (src_data[p1 + sx1] as f64) + dx1 * (src_data[p1 + sx2] as f64))
                    + dy1 * (dx2 * (src_data[p3 + sx1] as f64) + dx1 * (src_data[p3 + sx2] as f64));

                *out = val.round().clamp(0.0, 255.0) as u8;
            }
        }

        true
    }

    /// Counts non-zero pixels within `square`, clipped to the image.
    fn count_non_zero(src: &ImageBuffer, square: &Square) -> usize {
        let width = src.width as usize;
        let x0 = (square.x as usize).min(width);
        let x1 = (square.x as usize + square.width as usize).min(width);
        let y0 = (square.y as usize).min(src.height as usize);
        let y1 = (square.y as usize + square.height as usize).min(src.height as usize);

        (y0..y1)
            .map(|y| {
                src.data[y * width + x0..y * width + x1]
                    .iter()
                    .filter(|&&px| px != 0)
                    .count()
            })
            .sum()
    }

    fn refine_corners(
        src: &ImageBuffer,
        corners: &mut [Point2f],
        window: usize,
        zero_zone: i32,
        criteria: TermCriteria,
    ) {
        subpix::corner_sub_pix(src, corners, window, zero_zone, criteria);
    }
}
