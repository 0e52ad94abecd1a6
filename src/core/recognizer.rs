// src/core/recognizer.rs

use log::{debug, trace};
use serde::Serialize;

use crate::core::params::DetectorParams;
use crate::core::symbol::{decode, rotate_corners, SymbolGrid, SYMBOL_DIM, TEMPLATE_CODEWORD};
use crate::cv::{ComputerVision, Square};
use crate::{ImageBuffer, Quad};

/// A candidate whose symbol matched the template.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Marker {
    /// Refined image corners, starting at the corner the symbol places first.
    pub corners: Quad,
    /// Quarter turns that were needed to decode the symbol.
    pub rotation: usize,
    pub distance: u32,
}

/// Samples the inner cells of a binarized canonical marker image. A cell
/// reads 1 when more than half of its pixels are set.
pub fn read_symbol_grid<CV: ComputerVision>(canonical: &ImageBuffer, cell_size: usize) -> SymbolGrid {
    let mut grid = [[0u8; SYMBOL_DIM]; SYMBOL_DIM];
    let half = cell_size * cell_size / 2;

    for (y, row) in grid.iter_mut().enumerate() {
        for (x, bit) in row.iter_mut().enumerate() {
            let cell = Square {
                x: ((x + 1) * cell_size) as u32,
                y: ((y + 1) * cell_size) as u32,
                width: cell_size as u32,
                height: cell_size as u32,
            };
            if CV::count_non_zero(canonical, &cell) > half {
                *bit = 1;
            }
        }
    }
    grid
}

/// Rectifies, binarizes and decodes every candidate, keeps the exact matches
/// with their corners reordered by the decoded rotation, then refines all
/// kept corners in one batch.
pub fn recognize_markers<CV: ComputerVision>(
    gray: &ImageBuffer,
    candidates: &[Quad],
    params: &DetectorParams,
) -> Vec<Marker> {
    let size = params.marker_size;
    let cell_size = params.cell_size();
    let mut warped = vec![0u8; size * size];
    let mut binary = vec![0u8; size * size];
    let mut markers = Vec::new();

    for candidate in candidates {
        if !CV::warp(gray, &mut warped, candidate, size) {
            trace!("skipping degenerate candidate {candidate:?}");
            continue;
        }

        let t = CV::otsu(&warped);
        CV::threshold(&warped, &mut binary, t);

        let canonical = ImageBuffer {
            data: &binary,
            width: size as u32,
            height: size as u32,
        };
        let grid = read_symbol_grid::<CV>(&canonical, cell_size);
        let decoding = decode(&grid, &TEMPLATE_CODEWORD);

        if !decoding.is_exact() {
            trace!(
                "symbol rejected: distance {} at rotation {}",
                decoding.distance,
                decoding.rotation
            );
            continue;
        }

        markers.push(Marker {
            corners: rotate_corners(candidate, decoding.rotation),
            rotation: decoding.rotation,
            distance: decoding.distance,
        });
    }

    if !markers.is_empty() {
        let mut corners: Vec<_> = markers.iter().flat_map(|m| m.corners).collect();
        CV::refine_corners(
            gray,
            &mut corners,
            params.refine.window,
            params.refine.zero_zone,
            params.refine.criteria(),
        );
        for (marker, refined) in markers.iter_mut().zip(corners.chunks_exact(4)) {
            marker.corners.copy_from_slice(refined);
        }
    }

    debug!(
        "{} candidates -> {} markers",
        candidates.len(),
        markers.len()
    );
    markers
}
