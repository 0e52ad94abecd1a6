// src/core/symbol.rs

use crate::Quad;

/// Cells per side of the inner symbol.
pub const SYMBOL_DIM: usize = 5;

/// A decoded symbol, one bit per cell (1 = white).
pub type SymbolGrid = [[u8; SYMBOL_DIM]; SYMBOL_DIM];

/// The single pattern every candidate is matched against.
pub const TEMPLATE_CODEWORD: SymbolGrid = [
    [1, 1, 1, 0, 1],
    [0, 0, 0, 1, 0],
    [1, 1, 1, 1, 0],
    [1, 1, 1, 1, 0],
    [1, 1, 1, 0, 0],
];

/// Best match of a grid against the template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decoding {
    /// Row-wise distance at the best rotation.
    pub distance: u32,
    /// Number of quarter turns applied to the grid to reach that distance.
    pub rotation: usize,
}

impl Decoding {
    #[inline]
    pub fn is_exact(&self) -> bool {
        self.distance == 0
    }
}

/// Quarter turn: `out[i][j] = in[n - 1 - j][i]`.
pub fn rotate_grid(grid: &SymbolGrid) -> SymbolGrid {
    let mut out = [[0u8; SYMBOL_DIM]; SYMBOL_DIM];
    for i in 0..SYMBOL_DIM {
        for j in 0..SYMBOL_DIM {
            out[i][j] = grid[SYMBOL_DIM - 1 - j][i];
        }
    }
    out
}

/// Sums, over the rows of `grid`, the smallest bit mismatch between that
/// row and any row of `template`. Rows are matched independently, so this
/// is looser than a whole-grid Hamming distance.
pub fn row_hamming_distance(grid: &SymbolGrid, template: &SymbolGrid) -> u32 {
    grid.iter()
        .map(|row| {
            template
                .iter()
                .map(|t| row.iter().zip(t.iter()).filter(|(a, b)| a != b).count() as u32)
                .min()
                .unwrap_or(0)
        })
        .sum()
}

/// Tries the four quarter turns of `grid` and keeps the first one with the
/// lowest distance to `template`.
pub fn decode(grid: &SymbolGrid, template: &SymbolGrid) -> Decoding {
    let mut best = Decoding {
        distance: row_hamming_distance(grid, template),
        rotation: 0,
    };

    let mut rotated = *grid;
    for rotation in 1..4 {
        rotated = rotate_grid(&rotated);
        let distance = row_hamming_distance(&rotated, template);
        if distance < best.distance {
            best = Decoding { distance, rotation };
        }
    }
    best
}

/// Reorders corners after a decode at `rotation` quarter turns: each corner
/// moves `rotation` places towards the end, wrapping around.
pub fn rotate_corners(quad: &Quad, rotation: usize) -> Quad {
    let mut out = *quad;
    out.rotate_right(rotation % 4);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Point2f;

    /// Grid that `decode` must turn `k` times to recover the template.
    fn turned_back(k: usize) -> SymbolGrid {
        let mut g = TEMPLATE_CODEWORD;
        for _ in 0..(4 - k) % 4 {
            g = rotate_grid(&g);
        }
        g
    }

    #[test]
    fn test_rotate_grid() {
        let mut grid = [[0u8; 5]; 5];
        grid[0][0] = 1;
        grid[0][4] = 1;
        let r = rotate_grid(&grid);
        // Top-left moves to top-right, top-right to bottom-right.
        assert_eq!(r[0][4], 1);
        assert_eq!(r[4][4], 1);
        assert_eq!(r.iter().flatten().filter(|&&b| b == 1).count(), 2);

        let mut g = TEMPLATE_CODEWORD;
        for _ in 0..4 {
            g = rotate_grid(&g);
        }
        assert_eq!(g, TEMPLATE_CODEWORD);
    }

    #[test]
    fn template_decodes_at_rotation_zero() {
        let d = decode(&TEMPLATE_CODEWORD, &TEMPLATE_CODEWORD);
        assert_eq!(d, Decoding { distance: 0, rotation: 0 });
        assert!(d.is_exact());
    }

    #[test]
    fn each_quarter_turn_decodes_to_its_rotation() {
        for k in 0..4 {
            let d = decode(&turned_back(k), &TEMPLATE_CODEWORD);
            assert_eq!(d, Decoding { distance: 0, rotation: k }, "k = {k}");
        }
    }

    #[test]
    fn only_the_matching_rotation_is_exact() {
        for k in 0..4 {
            let mut g = turned_back(k);
            for r in 0..4 {
                let dist = row_hamming_distance(&g, &TEMPLATE_CODEWORD);
                assert_eq!(dist == 0, r == k, "k = {k}, r = {r}, dist = {dist}");
                g = rotate_grid(&g);
            }
        }
    }

    #[test]
    fn single_bit_corruption_is_rejected() {
        for k in 0..4 {
            let mut g = TEMPLATE_CODEWORD;
            g[0][0] ^= 1;
            for _ in 0..(4 - k) % 4 {
                g = rotate_grid(&g);
            }
            let d = decode(&g, &TEMPLATE_CODEWORD);
            assert!(d.distance > 0, "k = {k}");
        }
    }

    #[test]
    fn row_wise_matching_tolerates_some_flips() {
        // Flipping (2, 3) turns row 2 into 11100, which is row 4 of the
        // template: the row-wise distance stays zero.
        let mut g = TEMPLATE_CODEWORD;
        g[2][3] ^= 1;
        assert_eq!(row_hamming_distance(&g, &TEMPLATE_CODEWORD), 0);
        assert_eq!(decode(&g, &TEMPLATE_CODEWORD).rotation, 0);
    }

    #[test]
    fn test_rotate_corners() {
        let q = [
            Point2f::new(0.0, 0.0),
            Point2f::new(1.0, 0.0),
            Point2f::new(1.0, 1.0),
            Point2f::new(0.0, 1.0),
        ];
        assert_eq!(rotate_corners(&q, 0), q);
        let r1 = rotate_corners(&q, 1);
        assert_eq!(r1, [q[3], q[0], q[1], q[2]]);
        for k in 0..4 {
            let r = rotate_corners(&q, k);
            for i in 0..4 {
                assert_eq!(r[(i + k) % 4], q[i]);
            }
        }
        assert_eq!(rotate_corners(&q, 5), r1);
    }
}
