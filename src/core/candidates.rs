// src/core/candidates.rs

use log::{debug, trace};

use crate::core::params::DetectorParams;
use crate::cv::contours::Contour;
use crate::cv::geometry::{
    approx_poly_dp, is_contour_convex, mean_corner_dist_sq, min_edge_length_sq, perimeter,
    to_quad, winding_cross,
};
use crate::{Point2i, Quad};

/// Reduces contours to convex quadrilaterals with long enough sides, wound
/// consistently and with near duplicates removed. Output keeps contour order.
pub fn find_candidates(contours: &[Contour], params: &DetectorParams) -> Vec<Quad> {
    let mut quads = Vec::new();

    for contour in contours {
        let epsilon = contour.len() as f64 * params.poly_epsilon_fraction;
        let poly = approx_poly_dp(&contour.points, epsilon);

        let Ok(poly) = <[Point2i; 4]>::try_from(poly) else {
            continue;
        };
        if !is_contour_convex(&poly) {
            continue;
        }
        let min_edge = min_edge_length_sq(&poly);
        if min_edge < params.min_edge_length_sq {
            trace!("candidate rejected: min edge {min_edge} px²");
            continue;
        }

        let mut quad = to_quad(&poly);
        canonicalize_winding(&mut quad);
        quads.push(quad);
    }

    let found = quads.len();
    let quads = remove_near_duplicates(quads, params.near_candidate_dist_sq);
    debug!(
        "{} contours -> {} quads -> {} candidates",
        contours.len(),
        found,
        quads.len()
    );
    quads
}

/// Swaps corners 1 and 3 when corners 0, 1, 2 turn the wrong way, so every
/// candidate ends up with a non-negative [`winding_cross`].
pub fn canonicalize_winding(quad: &mut Quad) {
    if winding_cross(quad) < 0.0 {
        quad.swap(1, 3);
    }
}

/// Drops the smaller-perimeter member of every pair of candidates whose mean
/// squared corner distance is below `min_dist_sq`. On equal perimeters the
/// earlier candidate goes.
pub fn remove_near_duplicates(candidates: Vec<Quad>, min_dist_sq: f32) -> Vec<Quad> {
    let len = candidates.len();
    let mut removal_mask = vec![false; len];
    let perimeters: Vec<f32> = candidates.iter().map(|c| perimeter(c)).collect();

    for i in 0..len {
        for j in (i + 1)..len {
            if mean_corner_dist_sq(&candidates[i], &candidates[j]) < min_dist_sq {
                let drop = if perimeters[i] > perimeters[j] { j } else { i };
                removal_mask[drop] = true;
            }
        }
    }

    candidates
        .into_iter()
        .zip(removal_mask)
        .filter_map(|(c, removed)| (!removed).then_some(c))
        .collect()
}
