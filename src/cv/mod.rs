// src/cv/mod.rs

use crate::{Frame, ImageBuffer, Point2f, Quad};

/// Stop criteria for iterative corner refinement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TermCriteria {
    pub max_iter: usize,
    pub epsilon: f64,
}

/// Common trait for the image primitives the marker pipeline is built on.
/// Implementations may trade precision for speed but must keep the
/// semantics documented on each method.
pub trait ComputerVision {
    /// Converts a color frame to grayscale.
    ///
    /// # Arguments
    /// * `src` - The source `Frame` in any supported `PixelFormat`.
    /// * `dst` - The destination buffer where grayscale pixels will be written. Must be pre-allocated.
    fn grayscale(src: &Frame, dst: &mut [u8]);

    /// Applies a simple threshold to a grayscale image.
    ///
    /// # Arguments
    /// * `src` - The source slice of grayscale pixels.
    /// * `dst` - The destination slice where thresholded binary pixels will be written.
    /// * `threshold` - Pixels strictly above this value become 255, the rest 0.
    fn threshold(src: &[u8], dst: &mut [u8], threshold: u8);

    /// Computes the Otsu threshold for a grayscale image.
    ///
    /// # Returns
    /// The threshold maximizing the between-class variance (0-255).
    fn otsu(src: &[u8]) -> u8;

    /// Computes a fast box blur using a stack algorithm.
    ///
    /// # Arguments
    /// * `src` - The source `ImageBuffer` containing pixels to blur.
    /// * `dst` - The destination buffer where the blurred image is placed.
    /// * `kernel_size` - Radius of the blur window, must be < 16.
    fn stack_box_blur(src: &ImageBuffer, dst: &mut [u8], kernel_size: usize);

    /// Computes an inverted adaptive threshold: pixels darker than their
    /// local mean by at least `threshold` become 255.
    ///
    /// # Arguments
    /// * `src` - The source `ImageBuffer` used for computations.
    /// * `dst` - The destination buffer array.
    /// * `kernel_size` - Radius of the internal stack box blur kernel.
    /// * `threshold` - The constant subtracted from the local mean.
    fn adaptive_threshold(src: &ImageBuffer, dst: &mut [u8], kernel_size: usize, threshold: u8);

    /// Resamples the quadrilateral `contour` into a `warp_size` x `warp_size`
    /// canonical square using bilinear interpolation. Corner 0 lands on the
    /// canonical origin, corners 1..3 follow clockwise on screen.
    ///
    /// Returns `false`, leaving `dst` untouched, when the quad is degenerate.
    fn warp(src: &ImageBuffer, dst: &mut [u8], contour: &Quad, warp_size: usize) -> bool;

    /// Counts non-zero pixels within a specified square area.
    fn count_non_zero(src: &ImageBuffer, square: &Square) -> usize;

    /// Refines corner locations in place to sub-pixel accuracy.
    ///
    /// # Arguments
    /// * `src` - The grayscale image the corners were found in.
    /// * `corners` - Approximate corners, overwritten with refined positions.
    /// * `window` - Half size of the search window.
    /// * `zero_zone` - Half size of the central dead zone, negative for none.
    /// * `criteria` - Iteration and convergence limits.
    fn refine_corners(
        src: &ImageBuffer,
        corners: &mut [Point2f],
        window: usize,
        zero_zone: i32,
        criteria: TermCriteria,
    );
}

/// Defines a rectangular region of interest
#[derive(Debug, Clone, Copy)]
pub struct Square {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

// Submodules for specific CV algorithms
pub mod contours;
pub mod geometry;
pub mod homography;
pub mod scalar;
pub mod subpix;
