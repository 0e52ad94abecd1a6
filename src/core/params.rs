// src/core/params.rs

use serde::{Deserialize, Serialize};

use crate::core::symbol::SYMBOL_DIM;
use crate::cv::TermCriteria;
use crate::{Error, Result};

/// Sub-pixel corner refinement settings.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CornerRefineParams {
    /// Half size of the search window in pixels.
    pub window: usize,
    /// Half size of the ignored central zone, negative to disable.
    pub zero_zone: i32,
    pub max_iter: usize,
    /// Stop once a step moves the corner by less than this many pixels.
    pub epsilon: f64,
}

impl Default for CornerRefineParams {
    fn default() -> Self {
        Self {
            window: 5,
            zero_zone: -1,
            max_iter: 30,
            epsilon: 0.1,
        }
    }
}

impl CornerRefineParams {
    pub fn criteria(&self) -> TermCriteria {
        TermCriteria {
            max_iter: self.max_iter,
            epsilon: self.epsilon,
        }
    }
}

/// Tunables of the marker detection pipeline.
///
/// Every field has a default matching the classic single-symbol detector;
/// partial JSON documents fill the rest from [`Default`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorParams {
    /// Odd neighbourhood size of the adaptive threshold.
    pub adaptive_block_size: usize,
    /// How much darker than the local mean a pixel must be to count as foreground.
    pub adaptive_constant: u8,
    /// Contours need strictly more than `width * fraction` points.
    pub min_contour_length_fraction: f32,
    /// Polygon approximation tolerance per contour point.
    pub poly_epsilon_fraction: f64,
    /// Minimum squared side length of a candidate, in px².
    pub min_edge_length_sq: i64,
    /// Mean squared corner distance below which two candidates are duplicates, in px².
    pub near_candidate_dist_sq: f32,
    /// Side of the rectified canonical marker image.
    pub marker_size: usize,
    /// Cells per side of the canonical grid, border ring included.
    pub grid_cells: usize,
    pub refine: CornerRefineParams,
}

impl Default for DetectorParams {
    fn default() -> Self {
        Self {
            adaptive_block_size: 7,
            adaptive_constant: 7,
            min_contour_length_fraction: 0.2,
            poly_epsilon_fraction: 0.05,
            min_edge_length_sq: 100,
            near_candidate_dist_sq: 100.0,
            marker_size: 100,
            grid_cells: SYMBOL_DIM + 2,
            refine: CornerRefineParams::default(),
        }
    }
}

impl DetectorParams {
    /// Parses parameters from JSON, then validates them.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let params: Self = serde_json::from_str(json)?;
        params.validate()?;
        Ok(params)
    }

    /// Radius of the box blur that approximates the adaptive block.
    pub fn blur_radius(&self) -> usize {
        (self.adaptive_block_size - 1) / 2
    }

    /// Integer side of one grid cell in the canonical image.
    pub fn cell_size(&self) -> usize {
        self.marker_size / self.grid_cells
    }

    pub fn validate(&self) -> Result<()> {
        let bad = |msg: String| Err(Error::InvalidParams(msg));

        if self.adaptive_block_size % 2 == 0 || !(3..=31).contains(&self.adaptive_block_size) {
            return bad(format!(
                "adaptive_block_size must be odd and in 3..=31, got {}",
                self.adaptive_block_size
            ));
        }
        if !(self.min_contour_length_fraction > 0.0 && self.min_contour_length_fraction <= 1.0) {
            return bad(format!(
                "min_contour_length_fraction must be in (0, 1], got {}",
                self.min_contour_length_fraction
            ));
        }
        if !(self.poly_epsilon_fraction > 0.0 && self.poly_epsilon_fraction.is_finite()) {
            return bad(format!(
                "poly_epsilon_fraction must be positive, got {}",
                self.poly_epsilon_fraction
            ));
        }
        if self.min_edge_length_sq < 0 {
            return bad(format!(
                "min_edge_length_sq must be non-negative, got {}",
                self.min_edge_length_sq
            ));
        }
        if !(self.near_candidate_dist_sq >= 0.0) {
            return bad(format!(
                "near_candidate_dist_sq must be non-negative, got {}",
                self.near_candidate_dist_sq
            ));
        }
        if self.grid_cells != SYMBOL_DIM + 2 {
            return bad(format!(
                "grid_cells must be {} to frame a {SYMBOL_DIM}x{SYMBOL_DIM} symbol, got {}",
                SYMBOL_DIM + 2,
                self.grid_cells
            ));
        }
        if self.marker_size < self.grid_cells {
            return bad(format!(
                "marker_size {} is smaller than the {} cell grid",
                self.marker_size, self.grid_cells
            ));
        }
        if self.refine.window == 0 || self.refine.max_iter == 0 {
            return bad("corner refinement needs a non-empty window and at least one iteration".into());
        }
        if !(self.refine.epsilon >= 0.0) {
            return bad(format!(
                "refine.epsilon must be non-negative, got {}",
                self.refine.epsilon
            ));
        }
        Ok(())
    }
}
