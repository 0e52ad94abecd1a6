// src/test_utils.rs
//
// Synthetic marker frames for unit tests.

use nalgebra::{Vector2, Vector3};

use crate::core::camera::CameraCalibration;
use crate::core::pose::Transformation;
use crate::core::symbol::{SymbolGrid, SYMBOL_DIM, TEMPLATE_CODEWORD};
use crate::cv::homography::homography_from_4pt;
use crate::{Point2f, Quad};

const GRID: usize = SYMBOL_DIM + 2;

/// Intensity of marker cell `(cx, cy)`: black border, white for set bits.
fn cell_value(symbol: &SymbolGrid, cx: usize, cy: usize) -> u8 {
    if cx == 0 || cy == 0 || cx == GRID - 1 || cy == GRID - 1 {
        0
    } else if symbol[cy - 1][cx - 1] == 1 {
        255
    } else {
        0
    }
}

/// A `size` x `size` binary image of `symbol` laid out on the same cell grid
/// the recognizer samples.
pub(crate) fn render_symbol_canonical(symbol: &SymbolGrid, size: usize) -> Vec<u8> {
    let cell = size / GRID;
    let mut out = vec![0u8; size * size];
    for y in 0..size {
        for x in 0..size {
            let cx = (x / cell).min(GRID - 1);
            let cy = (y / cell).min(GRID - 1);
            out[y * size + x] = cell_value(symbol, cx, cy);
        }
    }
    out
}

/// One marker on a white background.
#[derive(Debug, Clone)]
pub(crate) struct MarkerScene {
    pub width: u32,
    pub height: u32,
    /// Outer marker outline in pixel-centre coordinates, starting at the
    /// symbol's top-left corner and running clockwise on screen.
    pub corners: Quad,
    pub symbol: SymbolGrid,
}

impl MarkerScene {
    pub fn new(width: u32, height: u32, corners: Quad) -> Self {
        Self {
            width,
            height,
            corners,
            symbol: TEMPLATE_CODEWORD,
        }
    }

    /// Upright marker whose first black pixel is `(x0, y0)`, `cell` pixels per cell.
    pub fn axis_aligned(width: u32, height: u32, x0: f32, y0: f32, cell: f32) -> Self {
        let side = cell * GRID as f32;
        let (l, t) = (x0 - 0.5, y0 - 0.5);
        Self::new(
            width,
            height,
            [
                Point2f::new(l, t),
                Point2f::new(l + side, t),
                Point2f::new(l + side, t + side),
                Point2f::new(l, t + side),
            ],
        )
    }

    /// The same outline with the symbol turned a quarter turn
    /// counter-clockwise on screen `turns` times.
    pub fn rotated_ccw(mut self, turns: usize) -> Self {
        self.corners.rotate_right(turns % 4);
        self
    }

    /// Marker of unit side seen by `camera` at `pose` (marker relative to camera).
    pub fn from_pose(
        width: u32,
        height: u32,
        camera: &CameraCalibration,
        pose: &Transformation,
    ) -> Self {
        let corners = [(-0.5, -0.5), (0.5, -0.5), (0.5, 0.5), (-0.5, 0.5)].map(|(x, y)| {
            let pc = pose.transform_point(&Vector3::new(x, y, 0.0));
            let p = camera.project(&pc);
            Point2f::new(p.x as f32, p.y as f32)
        });
        Self::new(width, height, corners)
    }

    pub fn with_symbol(mut self, symbol: SymbolGrid) -> Self {
        self.symbol = symbol;
        self
    }

    pub fn render_gray(&self) -> Vec<u8> {
        let g = GRID as f64;
        let grid = [
            Vector2::new(0.0, 0.0),
            Vector2::new(g, 0.0),
            Vector2::new(g, g),
            Vector2::new(0.0, g),
        ];
        let quad = self.corners.map(|p| Vector2::new(p.x as f64, p.y as f64));
        let to_grid = homography_from_4pt(&quad, &grid).expect("scene outline is a proper quad");

        let (w, h) = (self.width as usize, self.height as usize);
        let mut out = vec![255u8; w * h];
        for y in 0..h {
            for x in 0..w {
                let Some(uv) = to_grid.apply(x as f64, y as f64) else {
                    continue;
                };
                if uv.x >= 0.0 && uv.y >= 0.0 && uv.x < g && uv.y < g {
                    out[y * w + x] = cell_value(&self.symbol, uv.x as usize, uv.y as usize);
                }
            }
        }
        out
    }

    pub fn render_rgba(&self) -> Vec<u8> {
        self.render_gray()
            .into_iter()
            .flat_map(|v| [v, v, v, 255])
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn axis_aligned_scene_is_pixel_exact() {
        let scene = MarkerScene::axis_aligned(64, 64, 10.0, 20.0, 4.0);
        let gray = scene.render_gray();
        let at = |x: usize, y: usize| gray[y * 64 + x];
        assert_eq!(at(9, 20), 255);
        assert_eq!(at(10, 20), 0);
        assert_eq!(at(37, 47), 0);
        assert_eq!(at(38, 47), 255);
        assert_eq!(at(37, 48), 255);
        // Symbol cell (0, 0) is set.
        assert_eq!(at(15, 25), 255);
    }
}
