// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Quadrilateral selection — first four-vertex candidate whose corners all
// fall inside the cosine band wins.

use quadsight_core::{DetectorConfig, Point, Working};
use tracing::{debug, trace};

use super::candidates::PolygonCandidate;
use crate::geometry::angle_cosine;

/// Picks at most one quadrilateral out of the candidate list.
///
/// The policy is first match in candidate order, not best match. When two
/// quadrilaterals qualify in the same scene the winner depends on contour
/// discovery order, so the outline may flicker between them across frames.
#[derive(Debug, Clone, Copy)]
pub struct QuadSelector {
    pub min_cosine: f64,
    pub max_cosine: f64,
}

impl Default for QuadSelector {
    fn default() -> Self {
        Self::from_config(&DetectorConfig::default())
    }
}

impl QuadSelector {
    pub fn from_config(config: &DetectorConfig) -> Self {
        Self {
            min_cosine: config.min_cosine,
            max_cosine: config.max_cosine,
        }
    }

    /// Return the first candidate that passes [`Self::accepts`], stopping at
    /// the first hit.
    pub fn select(&self, candidates: &[PolygonCandidate]) -> Option<[Point<Working>; 4]> {
        for (index, candidate) in candidates.iter().enumerate() {
            let Ok(quad) = <[Point<Working>; 4]>::try_from(candidate.vertices.as_slice()) else {
                trace!(index, vertices = candidate.vertices.len(), "not a quadrilateral");
                continue;
            };
            if self.accepts(&quad) {
                debug!(index, of = candidates.len(), "quadrilateral selected");
                return Some(quad);
            }
        }
        debug!(candidates = candidates.len(), "no qualifying quadrilateral");
        None
    }

    /// All four corner cosines inside `[min_cosine, max_cosine]`.
    pub fn accepts(&self, quad: &[Point<Working>; 4]) -> bool {
        let cosines = corner_cosines(quad);
        let min = cosines.iter().copied().fold(f64::INFINITY, f64::min);
        let max = cosines.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        trace!(min, max, "corner cosines");
        min >= self.min_cosine && max <= self.max_cosine
    }
}

/// Cosine at each vertex between its two neighbours (wrapping around).
pub fn corner_cosines(quad: &[Point<Working>; 4]) -> [f64; 4] {
    std::array::from_fn(|i| angle_cosine(quad[(i + 3) % 4], quad[(i + 1) % 4], quad[i]))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(points: &[(f64, f64)]) -> PolygonCandidate {
        PolygonCandidate {
            vertices: points.iter().map(|&(x, y)| Point::new(x, y)).collect(),
            area: 0.0,
            convex: true,
        }
    }

    fn square(x: f64, y: f64, side: f64) -> PolygonCandidate {
        candidate(&[(x, y), (x + side, y), (x + side, y + side), (x, y + side)])
    }

    #[test]
    fn perfect_square_is_accepted() {
        let sq = square(0.0, 0.0, 100.0);
        let quad = QuadSelector::default().select(std::slice::from_ref(&sq));
        assert!(quad.is_some());
        for c in corner_cosines(&quad.unwrap()) {
            assert!(c.abs() < 1e-9);
        }
    }

    #[test]
    fn very_acute_corner_is_rejected() {
        // Corner at (0,0) is ~27 degrees: cosine ~0.89 > 0.5.
        let skewed = candidate(&[(0.0, 0.0), (100.0, 0.0), (300.0, 100.0), (200.0, 100.0)]);
        assert!(QuadSelector::default().select(&[skewed]).is_none());
    }

    #[test]
    fn very_obtuse_corner_is_rejected() {
        // Kite with a ~150 degree corner: cosine ~-0.87 < -0.3.
        let kite = candidate(&[(0.0, 0.0), (100.0, -27.0), (200.0, 0.0), (100.0, 150.0)]);
        let corners: [Point<Working>; 4] = kite.vertices.as_slice().try_into().unwrap();
        let cosines = corner_cosines(&corners);
        assert!(cosines.iter().any(|&c| c < -0.3), "{cosines:?}");
        assert!(QuadSelector::default().select(&[kite]).is_none());
    }

    #[test]
    fn mild_perspective_is_tolerated() {
        // Trapezoid like a page seen slightly from below.
        let trapezoid = candidate(&[(20.0, 0.0), (180.0, 0.0), (200.0, 250.0), (0.0, 250.0)]);
        assert!(QuadSelector::default().select(&[trapezoid]).is_some());
    }

    #[test]
    fn non_four_vertex_candidates_are_skipped() {
        let triangle = candidate(&[(0.0, 0.0), (100.0, 0.0), (0.0, 100.0)]);
        let pentagon = candidate(&[
            (0.0, 0.0),
            (100.0, 0.0),
            (130.0, 80.0),
            (50.0, 130.0),
            (-30.0, 80.0),
        ]);
        assert!(QuadSelector::default().select(&[triangle, pentagon]).is_none());
    }

    #[test]
    fn first_qualifying_candidate_wins() {
        // The later square is larger and exactly rectangular; the earlier one
        // is a slightly skewed quad. First match still wins.
        let first = candidate(&[(0.0, 0.0), (50.0, 0.0), (55.0, 50.0), (5.0, 50.0)]);
        let second = square(100.0, 100.0, 200.0);
        let chosen = QuadSelector::default()
            .select(&[first.clone(), second.clone()])
            .unwrap();
        assert_eq!(chosen.to_vec(), first.vertices);

        let chosen = QuadSelector::default().select(&[second.clone(), first]).unwrap();
        assert_eq!(chosen.to_vec(), second.vertices);
    }

    #[test]
    fn rejected_candidates_before_the_winner_are_skipped() {
        let acute = candidate(&[(0.0, 0.0), (100.0, 0.0), (300.0, 100.0), (200.0, 100.0)]);
        let sq = square(10.0, 10.0, 80.0);
        let chosen = QuadSelector::default().select(&[acute, sq.clone()]).unwrap();
        assert_eq!(chosen.to_vec(), sq.vertices);
    }
}
